//! Remote file store access.
//!
//! The pipeline only needs two things from a remote store: directory listings
//! and readable file streams. Transports implement [`RemoteSession`]; the
//! mirror walks the tree through it.

pub mod mirror;

use std::io::{self, Read};

pub use mirror::{mirror_directory, MirrorStats, MAX_MIRROR_DEPTH};

/// Kind of a remote directory entry, as reported by the listing (not followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEntryKind {
    Directory,
    File,
    Symlink,
    /// Sockets, fifos, devices and anything else the server reports.
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Final path component
    pub name: String,

    /// Entry kind
    pub kind: RemoteEntryKind,

    /// Full remote path of the entry
    pub path: String,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, kind: RemoteEntryKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
        }
    }
}

/// Authenticated handle on a remote file store.
///
/// A session is used serially for the whole run. Streams returned by
/// [`RemoteSession::open_file`] borrow the session and are closed on drop.
pub trait RemoteSession {
    /// List `path` in the order the server returns entries, without `.` and `..`.
    fn list_dir(&self, path: &str) -> io::Result<Vec<RemoteEntry>>;

    /// Open `path` for reading.
    fn open_file<'a>(&'a self, path: &str) -> io::Result<Box<dyn Read + 'a>>;
}

/// Join a child name onto a remote directory path using `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
