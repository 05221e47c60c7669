//! Backup run executor - sequences the pipeline for one run.
//!
//! mirror -> manifest -> archive -> cleanup, all on the caller's thread.
//! Each stage carries its own failure policy: every stage but cleanup aborts
//! the run and leaves whatever local state exists; a cleanup failure is only
//! logged because the archive is already complete at that point.

pub mod archive;
pub mod manifest;

use crate::fs::cleanup::remove_work_dir;
use crate::remote::mirror::mirror_directory;
use crate::remote::RemoteSession;
use crate::utils::errors::Result;
use archive::archive_directory;
use chrono::{Local, NaiveDate};
use manifest::{build_manifest, FileDigest, Md5Digest, MANIFEST_FILE_NAME};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default parent directory for working directories and archives.
pub const DEFAULT_OUTPUT_DIR: &str = "./Save";

/// Run date format: ISO 8601 basic calendar date, e.g. `20240131`.
pub const RUN_DATE_FORMAT: &str = "%Y%m%d";

/// Names fixed once per run.
///
/// The date is captured when the context is built and every derived path uses
/// that same value, so a run that crosses midnight still writes one set of
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    date: String,
    output_dir: PathBuf,
}

impl RunContext {
    /// Context for today's local date.
    pub fn today(output_dir: impl Into<PathBuf>) -> Self {
        Self::for_date(Local::now().date_naive(), output_dir)
    }

    pub fn for_date(date: NaiveDate, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            date: date.format(RUN_DATE_FORMAT).to_string(),
            output_dir: output_dir.into(),
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output>/<date>`: transient mirror of the remote tree
    pub fn work_dir(&self) -> PathBuf {
        self.output_dir.join(&self.date)
    }

    /// `<output>/<date>/md5.txt`
    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir().join(MANIFEST_FILE_NAME)
    }

    /// `<output>/<date>.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.zip", self.date))
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mirror,
    Manifest,
    Archive,
    Cleanup,
}

/// What a stage failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run and surface the error
    Abort,
    /// Log a warning and report success
    Warn,
}

impl Stage {
    pub fn policy(self) -> FailurePolicy {
        match self {
            Stage::Mirror | Stage::Manifest | Stage::Archive => FailurePolicy::Abort,
            Stage::Cleanup => FailurePolicy::Warn,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Mirror => "mirror",
            Stage::Manifest => "manifest",
            Stage::Archive => "archive",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Apply the stage's failure policy to its outcome.
///
/// `Ok(None)` means the stage failed but the run goes on.
fn settle<T>(stage: Stage, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => match stage.policy() {
            FailurePolicy::Abort => {
                debug!("The {} stage failed; aborting the run", stage);
                Err(e)
            }
            FailurePolicy::Warn => {
                warn!("The {} stage failed, continuing: {}", stage, e);
                Ok(None)
            }
        },
    }
}

/// Backup run result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub files_mirrored: usize,
    pub bytes_mirrored: u64,
    pub entries_skipped: usize,
    pub manifest_records: usize,
    pub digests_skipped: usize,
    pub archive_entries: usize,
    pub archive_path: PathBuf,
    pub cleaned_up: bool,
    pub duration_secs: u64,
}

/// Removes the working directory once the archive is in place.
pub type CleanupFn = fn(&Path) -> Result<()>;

/// The backup pipeline with its replaceable steps.
pub struct Pipeline<'a> {
    digest: &'a dyn FileDigest,
    cleanup: CleanupFn,
}

impl Default for Pipeline<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Pipeline<'a> {
    /// MD5 manifest digests and `remove_dir_all` cleanup
    pub fn new() -> Self {
        Self {
            digest: &Md5Digest,
            cleanup: remove_work_dir,
        }
    }

    /// Use a different digest for manifest records
    pub fn with_digest(mut self, digest: &'a dyn FileDigest) -> Self {
        self.digest = digest;
        self
    }

    /// Use a different working-directory removal
    pub fn with_cleanup(mut self, cleanup: CleanupFn) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Mirror `remote_root`, write the manifest, archive, then clean up.
    pub fn run<S>(&self, session: &S, ctx: &RunContext, remote_root: &str) -> Result<RunReport>
    where
        S: RemoteSession + ?Sized,
    {
        let start_time = Instant::now();
        let work_dir = ctx.work_dir();
        let manifest_path = ctx.manifest_path();
        let archive_path = ctx.archive_path();

        if work_dir.exists() {
            debug!("Working directory {} already exists; reusing it", work_dir.display());
        }

        info!("Mirroring {} -> {}", remote_root, work_dir.display());
        let mirror = settle(Stage::Mirror, mirror_directory(session, remote_root, &work_dir))?.unwrap_or_default();
        info!(
            "Mirror complete: {} files, {} bytes, {} entries skipped",
            mirror.files, mirror.bytes, mirror.skipped
        );

        let manifest =
            settle(Stage::Manifest, build_manifest(&work_dir, &manifest_path, self.digest))?.unwrap_or_default();
        info!(
            "Manifest written: {} ({} records, {} skipped)",
            manifest_path.display(),
            manifest.records,
            manifest.skipped
        );

        let archive = settle(Stage::Archive, archive_directory(&work_dir, &archive_path))?.unwrap_or_default();
        info!(
            "Archive written: {} ({} entries, {} bytes)",
            archive_path.display(),
            archive.entries(),
            archive.bytes
        );

        let cleaned_up = settle(Stage::Cleanup, (self.cleanup)(&work_dir))?.is_some();
        if cleaned_up {
            info!("Working directory removed: {}", work_dir.display());
        }

        Ok(RunReport {
            files_mirrored: mirror.files,
            bytes_mirrored: mirror.bytes,
            entries_skipped: mirror.skipped,
            manifest_records: manifest.records,
            digests_skipped: manifest.skipped,
            archive_entries: archive.entries(),
            archive_path,
            cleaned_up,
            duration_secs: start_time.elapsed().as_secs(),
        })
    }
}

/// Run the full pipeline with MD5 manifest digests.
pub fn run_backup<S>(session: &S, ctx: &RunContext, remote_root: &str) -> Result<RunReport>
where
    S: RemoteSession + ?Sized,
{
    Pipeline::new().run(session, ctx, remote_root)
}
