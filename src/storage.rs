use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::error::RegistryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl Checksums {
    /// Computes all three digests over the same byte stream, each with its
    /// own accumulator.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut md5 = Md5::new();
        let mut sha1 = Sha1::new();
        let mut sha256 = Sha256::new();
        md5.update(bytes);
        sha1.update(bytes);
        sha256.update(bytes);
        Self {
            md5: hex::encode(md5.finalize()),
            sha1: hex::encode(sha1.finalize()),
            sha256: hex::encode(sha256.finalize()),
        }
    }
}

/// An uploaded archive parked in the temp directory. The file is removed on
/// drop unless it has already been moved into the download directory, so
/// every exit path of a publish attempt cleans up after itself.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
    pub size: i64,
    pub checksums: Checksums,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove temp file {}: {e}", self.path.display());
            }
        }
    }
}

/// Filesystem half of the registry: temporary uploads and the permanent
/// download directory holding published archives.
#[derive(Debug, Clone)]
pub struct PackageStore {
    tmp_dir: PathBuf,
    download_dir: PathBuf,
}

impl PackageStore {
    pub fn new(config: &AppConfig) -> Result<Self, RegistryError> {
        let tmp_dir = PathBuf::from(&config.tmp_dir);
        let download_dir = PathBuf::from(&config.download_dir);
        fs::create_dir_all(&tmp_dir)?;
        fs::create_dir_all(&download_dir)?;
        Ok(Self {
            tmp_dir,
            download_dir,
        })
    }

    /// Writes the uploaded bytes to a uniquely named temp file preserving
    /// the original extension, computing MD5/SHA-1/SHA-256 in one pass.
    pub fn store_temporary(
        &self,
        bytes: &[u8],
        suggested_filename: &str,
    ) -> Result<TempArchive, RegistryError> {
        let source = Path::new(suggested_filename);
        let prefix = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        let suffix = source
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let mut tempfile = tempfile::Builder::new()
            .prefix(&format!("{prefix}-"))
            .suffix(&suffix)
            .tempfile_in(&self.tmp_dir)
            .map_err(|e| RegistryError::Storage(format!("Failed to create temp file: {e}")))?;

        // a failed write drops the handle and with it the half-written file
        tempfile.write_all(bytes)?;
        tempfile.as_file_mut().sync_all()?;

        let checksums = Checksums::compute(bytes);

        let (_, path) = tempfile
            .keep()
            .map_err(|e| RegistryError::Storage(format!("Failed to keep temp file: {e}")))?;

        Ok(TempArchive {
            path,
            size: bytes.len() as i64,
            checksums,
        })
    }

    /// `<packageName>-<version><original-extension>`
    pub fn archive_file_name(source_name: &str, package_name: &str, version: &str) -> String {
        let extension = Path::new(source_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        format!("{package_name}-{version}{extension}")
    }

    /// Moves a temp archive into the download directory under its final
    /// name; an already published file of the same name is overwritten.
    pub fn publish_file(&self, tmp_path: &Path, filename: &str) -> Result<PathBuf, RegistryError> {
        if !self.download_dir.is_dir() {
            return Err(RegistryError::Storage(format!(
                "Unable to store package archive: {} doesn't exist",
                self.download_dir.display()
            )));
        }
        if fs::metadata(&self.download_dir)?.permissions().readonly() {
            return Err(RegistryError::Storage(format!(
                "Unable to store package archive: {} isn't writable",
                self.download_dir.display()
            )));
        }

        let dest = self.download_dir.join(filename);
        info!(
            "Moving package file from {} to {}",
            tmp_path.display(),
            dest.display()
        );
        if dest.exists() {
            info!("Removing already published file {}", dest.display());
            fs::remove_file(&dest)?;
        }
        if fs::rename(tmp_path, &dest).is_err() {
            // temp and download dirs may sit on different filesystems
            fs::copy(tmp_path, &dest)?;
            fs::remove_file(tmp_path)?;
        }
        Ok(dest)
    }

    /// Deletes a published archive after a successful unpublish commit.
    pub fn remove_archive(&self, filename: &str) {
        let path = self.download_dir.join(filename);
        if !path.exists() {
            warn!("Published package archive {} not found", path.display());
        } else if let Err(e) = fs::remove_file(&path) {
            warn!("Failed to remove archive {}: {e}", path.display());
        } else {
            info!("Removed published package archive {}", path.display());
        }
    }

    pub fn download_path(&self, filename: &str) -> PathBuf {
        self.download_dir.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (PackageStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig {
            tmp_dir: dir.path().join("tmp").to_string_lossy().into_owned(),
            download_dir: dir.path().join("downloads").to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        let store = PackageStore::new(&config).expect("store");
        (store, dir)
    }

    #[test]
    fn test_checksums_known_vectors() {
        let checksums = Checksums::compute(b"abc");
        assert_eq!(checksums.md5, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(checksums.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            checksums.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksums_empty_input() {
        let checksums = Checksums::compute(b"");
        assert_eq!(checksums.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(checksums.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(
            checksums.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksums_are_pairwise_distinct() {
        // guards against feeding all three digests from one accumulator
        let checksums = Checksums::compute(&vec![0xa5u8; 2 * 1024 * 1024]);
        assert_ne!(checksums.md5, checksums.sha1);
        assert_ne!(checksums.sha1, checksums.sha256);
        assert_ne!(checksums.md5, checksums.sha256);
    }

    #[test]
    fn test_store_temporary_writes_file() {
        let (store, _dir) = test_store();
        let archive = store.store_temporary(b"archive bytes", "mylib-1.0.0.zip").unwrap();
        assert_eq!(archive.size, 13);
        assert!(archive.path().exists());
        assert_eq!(
            archive.path().extension().and_then(|e| e.to_str()),
            Some("zip")
        );
        assert_eq!(std::fs::read(archive.path()).unwrap(), b"archive bytes".to_vec());
        assert_eq!(archive.checksums, Checksums::compute(b"archive bytes"));
    }

    #[test]
    fn test_temp_archive_removed_on_drop() {
        let (store, _dir) = test_store();
        let archive = store.store_temporary(b"bytes", "pkg.zip").unwrap();
        let path = archive.path().to_path_buf();
        assert!(path.exists());
        drop(archive);
        assert!(!path.exists());
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            PackageStore::archive_file_name("upload-tmp123.zip", "mylib", "1.0.0"),
            "mylib-1.0.0.zip"
        );
        assert_eq!(
            PackageStore::archive_file_name("noextension", "mylib", "1.0.0"),
            "mylib-1.0.0"
        );
    }

    #[test]
    fn test_publish_file_moves_and_overwrites() {
        let (store, _dir) = test_store();

        let first = store.store_temporary(b"first", "pkg.zip").unwrap();
        let dest = store.publish_file(first.path(), "pkg-1.0.0.zip").unwrap();
        assert!(!first.path().exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"first".to_vec());

        // last publish wins for a given filename
        let second = store.store_temporary(b"second", "pkg.zip").unwrap();
        store.publish_file(second.path(), "pkg-1.0.0.zip").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"second".to_vec());
    }
}
