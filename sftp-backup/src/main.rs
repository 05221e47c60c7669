//! sftp-backup - one-shot snapshot of a remote SFTP directory.
//!
//! Mirrors `SAVE_DIR` into `<output>/<date>/`, writes `md5.txt`, zips the
//! tree to `<output>/<date>.zip` and removes the working copy.

mod config;
mod session;

use crate::config::AppConfig;
use crate::session::SftpSession;
use backup_pipeline::{run_backup, utils, RunContext, RunReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    // Initialize logging first so a configuration error is logged too
    let log_level = config.as_ref().map(|c| c.log_level.as_str()).unwrap_or("info");
    utils::logger::init(log_level)?;

    let config = config.inspect_err(|e| tracing::error!("{}", e))?;
    let ctx = RunContext::today(config.output_dir.clone());
    tracing::info!(
        "Starting sftp-backup v{} (run date: {}, remote: sftp://{}{})",
        env!("CARGO_PKG_VERSION"),
        ctx.date(),
        config.addr(),
        config.save_dir
    );

    // ssh2 and the pipeline are blocking; run the whole job off the async workers
    let report = tokio::task::spawn_blocking(move || run(&config, &ctx)).await??;

    tracing::info!(
        "Backup completed: {} files, {} manifest records ({} skipped), {} archive entries -> {} in {}s",
        report.files_mirrored,
        report.manifest_records,
        report.digests_skipped,
        report.archive_entries,
        report.archive_path.display(),
        report.duration_secs
    );

    Ok(())
}

fn run(config: &AppConfig, ctx: &RunContext) -> anyhow::Result<RunReport> {
    let session = SftpSession::connect(config).inspect_err(|e| tracing::error!("{}", e))?;
    let report = run_backup(&session, ctx, &config.save_dir).inspect_err(|e| tracing::error!("{}", e))?;
    Ok(report)
}
