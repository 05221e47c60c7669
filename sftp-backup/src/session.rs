//! SFTP transport for the backup pipeline, backed by libssh2.

use crate::config::AppConfig;
use backup_pipeline::remote::join_remote;
use backup_pipeline::utils::errors::ConnectOp;
use backup_pipeline::{BackupError, RemoteEntry, RemoteEntryKind, RemoteSession};
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};
use std::io::{self, Read};
use std::net::TcpStream;
use std::path::Path;

/// Authenticated SFTP connection, used serially for the whole run.
pub struct SftpSession {
    // Dropped before the SSH session it runs on.
    sftp: Sftp,
    _session: Session,
}

impl SftpSession {
    /// Connect, verify the host key when a known_hosts file is configured,
    /// authenticate with the password and open the SFTP subsystem.
    pub fn connect(config: &AppConfig) -> Result<Self, BackupError> {
        let addr = config.addr();
        let fail = |op: ConnectOp| {
            let addr = addr.clone();
            move |source: io::Error| BackupError::Connection { addr, op, source }
        };

        let tcp = TcpStream::connect(&addr).map_err(fail(ConnectOp::Tcp))?;
        let mut sess = Session::new().map_err(|e| fail(ConnectOp::Session)(e.into()))?;
        sess.set_tcp_stream(tcp);
        sess.handshake().map_err(|e| fail(ConnectOp::Handshake)(e.into()))?;

        match &config.known_hosts {
            Some(path) => {
                verify_host_key(&sess, &config.host, config.port, path).map_err(fail(ConnectOp::VerifyHostKey))?
            }
            None => tracing::warn!(
                addr = %addr,
                "SFTP_KNOWN_HOSTS not set: host key is NOT verified"
            ),
        }

        sess.userauth_password(&config.user, &config.password)
            .map_err(|e| fail(ConnectOp::Authenticate)(e.into()))?;
        if !sess.authenticated() {
            let denied = io::Error::new(io::ErrorKind::PermissionDenied, "server did not accept the password");
            return Err(fail(ConnectOp::Authenticate)(denied));
        }

        let sftp = sess.sftp().map_err(|e| fail(ConnectOp::OpenSftp)(e.into()))?;
        tracing::info!(addr = %addr, user = %config.user, "SFTP session established");

        Ok(Self {
            sftp,
            _session: sess,
        })
    }
}

impl RemoteSession for SftpSession {
    fn list_dir(&self, path: &str) -> io::Result<Vec<RemoteEntry>> {
        let listing = self.sftp.readdir(Path::new(path))?;

        Ok(listing
            .into_iter()
            .filter_map(|(child, stat)| {
                let name = child.file_name()?.to_string_lossy().to_string();
                let file_type = stat.file_type();
                let kind = if file_type.is_dir() {
                    RemoteEntryKind::Directory
                } else if file_type.is_file() {
                    RemoteEntryKind::File
                } else if file_type.is_symlink() {
                    RemoteEntryKind::Symlink
                } else {
                    RemoteEntryKind::Other
                };
                let entry_path = join_remote(path, &name);
                Some(RemoteEntry::new(name, kind, entry_path))
            })
            .collect())
    }

    fn open_file<'a>(&'a self, path: &str) -> io::Result<Box<dyn Read + 'a>> {
        let file = self.sftp.open(Path::new(path))?;
        Ok(Box::new(file))
    }
}

/// Check the server's key against an OpenSSH known_hosts file.
fn verify_host_key(sess: &Session, host: &str, port: u16, known_hosts: &Path) -> io::Result<()> {
    let (key, _key_type) = sess
        .host_key()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "server presented no host key"))?;

    let mut hosts = sess.known_hosts()?;
    hosts
        .read_file(known_hosts, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            let reason = format!("reading {}: {}", known_hosts.display(), e);
            io::Error::new(io::ErrorKind::InvalidInput, reason)
        })?;

    match hosts.check_port(host, port, key) {
        CheckResult::Match => {
            tracing::debug!(host, port, "Host key verified");
            Ok(())
        }
        CheckResult::Mismatch => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("host key for {} does NOT match {}", host, known_hosts.display()),
        )),
        CheckResult::NotFound => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not listed in {}", host, known_hosts.display()),
        )),
        CheckResult::Failure => Err(io::Error::new(io::ErrorKind::Other, "host key check failed")),
    }
}
