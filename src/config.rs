use log::info;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub host: String,
    pub database_url: String,
    pub data_dir: String,
    pub download_dir: String,
    pub tmp_dir: String,
    pub index_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "127.0.0.1".to_string(),
            database_url: "./data/depot.db".to_string(),
            data_dir: "./data".to_string(),
            download_dir: "./data/downloads".to_string(),
            tmp_dir: "./data/tmp".to_string(),
            index_dir: "./data/index".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("DEPOT_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .unwrap_or(8000);

        let host = env::var("DEPOT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let data_dir = env::var("DEPOT_DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let database_url =
            env::var("DEPOT_DATABASE_URL").unwrap_or_else(|_| format!("{data_dir}/depot.db"));

        let download_dir =
            env::var("DEPOT_DOWNLOAD_DIR").unwrap_or_else(|_| format!("{data_dir}/downloads"));

        let tmp_dir = env::var("DEPOT_TMP_DIR").unwrap_or_else(|_| format!("{data_dir}/tmp"));

        let index_dir = env::var("DEPOT_INDEX_DIR").unwrap_or_else(|_| format!("{data_dir}/index"));

        info!("Configuration loaded:");
        info!("  Host: {host}");
        info!("  Port: {port}");
        info!("  Database URL: {database_url}");
        info!("  Download Directory: {download_dir}");
        info!("  Temp Directory: {tmp_dir}");
        info!("  Index Directory: {index_dir}");

        Self {
            port,
            host,
            database_url,
            data_dir,
            download_dir,
            tmp_dir,
            index_dir,
        }
    }
}
