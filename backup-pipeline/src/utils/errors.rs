//! Error types for the backup pipeline.
//!
//! Every I/O failure is wrapped with the operation and the path it touched so a
//! failed run can be traced from the message alone.

use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection to {addr} failed to {op}: {source}")]
    Connection {
        addr: String,
        op: ConnectOp,
        #[source]
        source: io::Error,
    },

    #[error("Mirror failed to {op} {path}: {source}")]
    Mirror {
        op: MirrorOp,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Mirror refused to descend into {path}: depth limit of {max} exceeded")]
    MirrorDepthExceeded { path: String, max: usize },

    #[error("Manifest failed to {op} {path}: {source}")]
    Manifest {
        op: ManifestOp,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Digest of {path} failed: {source}")]
    Digest {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive failed to {op} {path}: {source}")]
    Archive {
        op: ArchiveOp,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Cleanup of {path} failed: {source}")]
    Cleanup {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Step of session establishment that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOp {
    Tcp,
    Session,
    Handshake,
    VerifyHostKey,
    Authenticate,
    OpenSftp,
}

impl fmt::Display for ConnectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectOp::Tcp => "open TCP connection",
            ConnectOp::Session => "create SSH session",
            ConnectOp::Handshake => "complete SSH handshake",
            ConnectOp::VerifyHostKey => "verify host key",
            ConnectOp::Authenticate => "authenticate",
            ConnectOp::OpenSftp => "open SFTP subsystem",
        };
        f.write_str(s)
    }
}

/// Step of the remote mirror that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOp {
    CreateDir,
    ListDir,
    OpenRemote,
    CreateLocal,
    Copy,
}

impl fmt::Display for MirrorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MirrorOp::CreateDir => "create local directory for",
            MirrorOp::ListDir => "list remote directory",
            MirrorOp::OpenRemote => "open remote file",
            MirrorOp::CreateLocal => "create local file for",
            MirrorOp::Copy => "copy remote file",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestOp {
    Create,
    Walk,
    Write,
}

impl fmt::Display for ManifestOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManifestOp::Create => "create",
            ManifestOp::Walk => "walk",
            ManifestOp::Write => "write record for",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOp {
    Create,
    Walk,
    AddEntry,
    Copy,
    Finish,
    Rename,
}

impl fmt::Display for ArchiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchiveOp::Create => "create",
            ArchiveOp::Walk => "walk",
            ArchiveOp::AddEntry => "add entry for",
            ArchiveOp::Copy => "copy content of",
            ArchiveOp::Finish => "finalize",
            ArchiveOp::Rename => "move into place",
        };
        f.write_str(s)
    }
}

impl BackupError {
    pub(crate) fn mirror(op: MirrorOp, path: impl Into<String>, source: io::Error) -> Self {
        BackupError::Mirror { op, path: path.into(), source }
    }

    pub(crate) fn manifest(op: ManifestOp, path: impl Into<String>, source: io::Error) -> Self {
        BackupError::Manifest { op, path: path.into(), source }
    }

    pub(crate) fn archive(op: ArchiveOp, path: impl Into<String>, source: io::Error) -> Self {
        BackupError::Archive { op, path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
