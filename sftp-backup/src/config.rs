use backup_pipeline::executor::DEFAULT_OUTPUT_DIR;
use backup_pipeline::BackupError;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Remote directory to back up
    pub save_dir: String,
    pub output_dir: PathBuf,
    pub known_hosts: Option<PathBuf>,
    pub log_level: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("save_dir", &self.save_dir)
            .field("output_dir", &self.output_dir)
            .field("known_hosts", &self.known_hosts)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment, after merging an optional `.env`.
    pub fn from_env() -> Result<Self, BackupError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BackupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                BackupError::Config(format!("missing required environment variable {}", key))
            })
        };

        let host = require("SFTP_HOST")?;
        let port_raw = require("SFTP_PORT")?;
        let user = require("SFTP_USER")?;
        let password = require("SFTP_PASSWORD")?;
        let save_dir = require("SAVE_DIR")?;

        let port = port_raw.trim().parse::<u16>().map_err(|e| {
            BackupError::Config(format!("invalid SFTP_PORT {:?}: {}", port_raw, e))
        })?;

        Ok(Self {
            host,
            port,
            user,
            password,
            save_dir,
            output_dir: PathBuf::from(
                get("BACKUP_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.into()),
            ),
            known_hosts: get("SFTP_KNOWN_HOSTS").map(PathBuf::from),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
