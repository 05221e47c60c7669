//! Removal of the transient working directory once the archive is in place.

use crate::utils::errors::{BackupError, Result};
use std::path::Path;

/// Recursively delete `work_dir` and everything below it.
pub fn remove_work_dir(work_dir: &Path) -> Result<()> {
    std::fs::remove_dir_all(work_dir).map_err(|source| BackupError::Cleanup {
        path: work_dir.display().to_string(),
        source,
    })
}
