//! Local tree traversal shared by the manifest and archive steps.
//!
//! Both steps see the mirror the same way: depth-first, parents before
//! children, siblings in lexical file-name order, the root itself excluded.

use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A node discovered while walking the local working directory
#[derive(Debug, Clone)]
pub struct LocalNode {
    /// Full path to the node
    pub path: PathBuf,

    /// Path relative to the walked root
    pub relative_path: PathBuf,

    /// Is this a directory?
    pub is_dir: bool,

    /// Depth below the root (direct children are 1)
    pub depth: usize,
}

impl LocalNode {
    /// Relative path with `/` separators regardless of host convention.
    pub fn slash_path(&self) -> String {
        to_slash_path(&self.relative_path)
    }
}

/// A traversal failure and the node it happened at.
#[derive(Debug)]
pub struct WalkError {
    /// Path that could not be read (the root when walkdir reports none)
    pub path: PathBuf,
    pub source: io::Error,
}

impl WalkError {
    fn from_walkdir(err: walkdir::Error, root: &Path) -> Self {
        let path = err.path().unwrap_or(root).to_path_buf();
        Self {
            path,
            source: io::Error::from(err),
        }
    }
}

impl From<WalkError> for io::Error {
    fn from(err: WalkError) -> Self {
        err.source
    }
}

/// Walk every node below `root`.
///
/// Symlinks are reported as files and never followed. Errors are yielded in
/// place so each caller can apply its own failure policy.
pub fn walk_local_tree(root: &Path) -> impl Iterator<Item = Result<LocalNode, WalkError>> + '_ {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .map(move |entry| {
            let entry = entry.map_err(|e| WalkError::from_walkdir(e, root))?;
            let path = entry.path().to_path_buf();
            let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

            Ok(LocalNode {
                is_dir: entry.file_type().is_dir(),
                depth: entry.depth(),
                relative_path,
                path,
            })
        })
}

/// Render a relative path with `/` separators.
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
