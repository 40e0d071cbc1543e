pub mod auth;
pub mod author;
pub mod log_entry;
pub mod package;
pub mod user;

pub use auth::AuthenticatedUser;
pub use author::{Author, NewAuthor, NewPackageAuthor, NewPackageOwner, PackageAuthor, PackageOwner};
pub use log_entry::{LogEntry, LogEntryType, NewLogEntry};
pub use package::{NewPackage, NewVersion, Package, Version};
pub use user::{NewResetToken, NewUser, ResetToken, User};
