//! Backup Pipeline Library
//!
//! Mirrors a remote tree to a dated local directory, writes an MD5 manifest,
//! packages everything into a zip archive and removes the working copy.

pub mod executor;
pub mod fs;
pub mod remote;
pub mod utils;

// Re-export commonly used types
pub use executor::{run_backup, FailurePolicy, Pipeline, RunContext, RunReport, Stage};
pub use remote::{RemoteEntry, RemoteEntryKind, RemoteSession};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
