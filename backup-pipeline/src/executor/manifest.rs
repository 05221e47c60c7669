//! MD5 manifest of the mirrored tree.
//!
//! The manifest lives inside the working directory so it ends up in the
//! archive. One line per successfully hashed file:
//!
//! ```text
//! logs/a.txt                               5d41402abc4b2a76b9719d911017c592
//! ```
//!
//! The path is left-justified in a 40-column field purely for reading; a path
//! longer than that simply pushes the digest right. Parse with
//! [`parse_manifest_line`], which splits on the last space.

use crate::fs::walker::walk_local_tree;
use crate::utils::errors::{BackupError, ManifestOp, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Fixed name of the manifest inside the working directory.
pub const MANIFEST_FILE_NAME: &str = "md5.txt";

/// Minimum width of the path column.
pub const PATH_COLUMN_WIDTH: usize = 40;

/// Content digest used for manifest records.
pub trait FileDigest {
    /// Hex digest of the full content of `path`.
    fn digest_file(&self, path: &Path) -> io::Result<String>;
}

/// 128-bit MD5, rendered as 32 lowercase hex characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Digest;

impl FileDigest for Md5Digest {
    fn digest_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Md5::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Counters for a finished manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManifestStats {
    /// Lines written
    pub records: usize,
    /// Files whose digest failed (left on disk, absent from the manifest)
    pub skipped: usize,
}

/// Write the manifest for `root` to `manifest_path`.
///
/// A file whose digest cannot be computed is logged and left out; the walk
/// continues. Failing to create the manifest, write a record, or read a
/// directory aborts the step.
pub fn build_manifest<D>(root: &Path, manifest_path: &Path, digest: &D) -> Result<ManifestStats>
where
    D: FileDigest + ?Sized,
{
    let manifest_display = manifest_path.display().to_string();
    let file = File::create(manifest_path)
        .map_err(|e| BackupError::manifest(ManifestOp::Create, &manifest_display, e))?;
    let mut out = BufWriter::new(file);
    let mut stats = ManifestStats::default();

    for node in walk_local_tree(root) {
        let node = node
            .map_err(|e| BackupError::manifest(ManifestOp::Walk, e.path.display().to_string(), e.source))?;

        if node.is_dir || node.path == manifest_path {
            continue;
        }

        let relative = node.slash_path();
        let hex_digest = match digest.digest_file(&node.path) {
            Ok(d) => d,
            Err(source) => {
                let err = BackupError::Digest { path: relative, source };
                warn!("{}; leaving it out of the manifest", err);
                stats.skipped += 1;
                continue;
            }
        };

        out.write_all(format_manifest_line(&relative, &hex_digest).as_bytes())
            .map_err(|e| BackupError::manifest(ManifestOp::Write, &relative, e))?;
        stats.records += 1;
        debug!("{} {}", relative, hex_digest);
    }

    out.flush()
        .map_err(|e| BackupError::manifest(ManifestOp::Write, &manifest_display, e))?;

    Ok(stats)
}

/// One manifest line, newline included.
pub fn format_manifest_line(relative_path: &str, hex_digest: &str) -> String {
    format!("{:<width$} {}\n", relative_path, hex_digest, width = PATH_COLUMN_WIDTH)
}

/// Split a manifest line into `(path, digest)`.
///
/// Returns `None` for blank or malformed lines.
pub fn parse_manifest_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (path, digest) = line.rsplit_once(' ')?;
    let path = path.trim_end_matches(' ');
    if path.is_empty() || digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some((path, digest))
}
