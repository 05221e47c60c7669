//! Recursive download of a remote tree into a local directory.
//!
//! The walk is depth-first and keeps the sibling order of each remote listing.
//! It is fail-fast: the first listing, open or copy error aborts the whole
//! mirror, and files already written stay on disk.

use super::{RemoteEntryKind, RemoteSession};
use crate::utils::errors::{BackupError, MirrorOp, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Deepest directory nesting the mirror will descend into.
pub const MAX_MIRROR_DEPTH: usize = 64;

/// Counters for a finished mirror.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorStats {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    /// Symlinks and special entries that were not followed
    pub skipped: usize,
}

/// Mirror `remote_root` into `local_root`.
///
/// `local_root` is created if missing. Symlinks and special files are skipped
/// with a warning rather than followed, so a self-referencing remote tree
/// cannot recurse forever.
pub fn mirror_directory<S>(session: &S, remote_root: &str, local_root: &Path) -> Result<MirrorStats>
where
    S: RemoteSession + ?Sized,
{
    let mut stats = MirrorStats::default();
    mirror_level(session, remote_root, local_root, 0, &mut stats)?;
    Ok(stats)
}

fn mirror_level<S>(
    session: &S,
    remote_dir: &str,
    local_dir: &Path,
    depth: usize,
    stats: &mut MirrorStats,
) -> Result<()>
where
    S: RemoteSession + ?Sized,
{
    if depth > MAX_MIRROR_DEPTH {
        return Err(BackupError::MirrorDepthExceeded {
            path: remote_dir.to_string(),
            max: MAX_MIRROR_DEPTH,
        });
    }

    fs::create_dir_all(local_dir)
        .map_err(|e| BackupError::mirror(MirrorOp::CreateDir, remote_dir, e))?;
    stats.directories += 1;

    let entries = session
        .list_dir(remote_dir)
        .map_err(|e| BackupError::mirror(MirrorOp::ListDir, remote_dir, e))?;
    debug!("Listed {} ({} entries)", remote_dir, entries.len());

    for entry in entries {
        let local_path = local_dir.join(&entry.name);

        match entry.kind {
            RemoteEntryKind::Directory => {
                mirror_level(session, &entry.path, &local_path, depth + 1, stats)?;
            }
            RemoteEntryKind::File => {
                let bytes = download_file(session, &entry.path, &local_path)?;
                stats.files += 1;
                stats.bytes += bytes;
                info!("Downloaded: {} -> {}", entry.path, local_path.display());
            }
            RemoteEntryKind::Symlink | RemoteEntryKind::Other => {
                stats.skipped += 1;
                warn!("Skipping {:?} entry (not followed): {}", entry.kind, entry.path);
            }
        }
    }

    Ok(())
}

/// Copy one remote file to `local_path`, truncating any existing file.
/// Both handles are dropped before returning, on success and on error.
fn download_file<S>(session: &S, remote_path: &str, local_path: &Path) -> Result<u64>
where
    S: RemoteSession + ?Sized,
{
    let mut remote = session
        .open_file(remote_path)
        .map_err(|e| BackupError::mirror(MirrorOp::OpenRemote, remote_path, e))?;

    let mut local = File::create(local_path)
        .map_err(|e| BackupError::mirror(MirrorOp::CreateLocal, remote_path, e))?;

    io::copy(&mut remote, &mut local)
        .map_err(|e| BackupError::mirror(MirrorOp::Copy, remote_path, e))
}
