//! Zip packaging of the working directory.
//!
//! Every node below the source root becomes one deflate entry named by its
//! `/`-separated relative path; directories get a trailing `/` and no data.
//! The archive is written to `<target>.partial` and renamed onto the target
//! only once the central directory is written, so a failed run never leaves
//! a truncated archive under the final name.

use crate::fs::walker::{walk_local_tree, LocalNode};
use crate::utils::errors::{ArchiveOp, BackupError, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Suffix of the in-progress archive file.
const PARTIAL_SUFFIX: &str = ".partial";

/// Files at least this large get ZIP64 headers. Sits below the 32-bit limit
/// so deflate overhead on incompressible data cannot push an entry over it.
const LARGE_ENTRY_BYTES: u64 = u32::MAX as u64 - (u32::MAX as u64 >> 10);

/// Counters for a finished archive.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: usize,
    pub directories: usize,
    /// Uncompressed bytes written into entries
    pub bytes: u64,
}

impl ArchiveStats {
    pub fn entries(&self) -> usize {
        self.files + self.directories
    }
}

/// Package `source_root` into the zip file `target`.
///
/// Fail-fast: the first walk, entry or copy error aborts and removes the
/// partial file. `target` is only created on success.
pub fn archive_directory(source_root: &Path, target: &Path) -> Result<ArchiveStats> {
    let partial = partial_path(target);

    let result = write_archive(source_root, &partial).and_then(|stats| {
        fs::rename(&partial, target)
            .map_err(|e| BackupError::archive(ArchiveOp::Rename, target.display().to_string(), e))?;
        Ok(stats)
    });

    if result.is_err() {
        discard_partial(&partial);
    }

    result
}

/// Path the archive is written to before it is moved into place.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn write_archive(source_root: &Path, partial: &Path) -> Result<ArchiveStats> {
    let partial_display = partial.display().to_string();
    let file = File::create(partial)
        .map_err(|e| BackupError::archive(ArchiveOp::Create, &partial_display, e))?;
    let mut zip = ZipWriter::new(file);
    let mut stats = ArchiveStats::default();

    for node in walk_local_tree(source_root) {
        let node = node
            .map_err(|e| BackupError::archive(ArchiveOp::Walk, e.path.display().to_string(), e.source))?;
        let name = entry_name(&node);
        let options = entry_options(&node)
            .map_err(|e| BackupError::archive(ArchiveOp::AddEntry, &name, e))?;

        if node.is_dir {
            zip.add_directory(name.as_str(), options)
                .map_err(|e| BackupError::archive(ArchiveOp::AddEntry, &name, e.into()))?;
            stats.directories += 1;
        } else {
            zip.start_file(name.as_str(), options)
                .map_err(|e| BackupError::archive(ArchiveOp::AddEntry, &name, e.into()))?;
            let mut content = File::open(&node.path)
                .map_err(|e| BackupError::archive(ArchiveOp::Copy, &name, e))?;
            let bytes = io::copy(&mut content, &mut zip)
                .map_err(|e| BackupError::archive(ArchiveOp::Copy, &name, e))?;
            stats.files += 1;
            stats.bytes += bytes;
        }
        debug!("Archived entry {}", name);
    }

    let file = zip
        .finish()
        .map_err(|e| BackupError::archive(ArchiveOp::Finish, &partial_display, e.into()))?;
    file.sync_all()
        .map_err(|e| BackupError::archive(ArchiveOp::Finish, &partial_display, e))?;

    Ok(stats)
}

/// Entry name: relative path with `/` separators, trailing `/` for directories.
fn entry_name(node: &LocalNode) -> String {
    let mut name = node.slash_path();
    if node.is_dir {
        name.push('/');
    }
    name
}

/// Deflate for every entry, carrying the node's mtime and mode where possible.
fn entry_options(node: &LocalNode) -> io::Result<SimpleFileOptions> {
    let metadata = fs::metadata(&node.path)?;
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(!node.is_dir && needs_large_entry(metadata.len()));

    if let Some(modified) = metadata.modified().ok().and_then(zip_timestamp) {
        options = options.last_modified_time(modified);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(metadata.permissions().mode() & 0o7777);
    }

    Ok(options)
}

fn needs_large_entry(len: u64) -> bool {
    len >= LARGE_ENTRY_BYTES
}

/// Zip timestamps cover 1980-2107 at two-second resolution; anything else is dropped.
fn zip_timestamp(modified: std::time::SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = modified.into();
    let year = u16::try_from(local.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

fn discard_partial(partial: &Path) {
    if let Err(e) = fs::remove_file(partial) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove partial archive {}: {}", partial.display(), e);
        }
    }
}
