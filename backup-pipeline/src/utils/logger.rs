//! Logging configuration using tracing.
//!
//! Log lines go to stderr so the one-shot run's stdout stays free for
//! whatever wraps it (cron mail, shell redirection).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level.
///
/// `RUST_LOG` takes precedence over `level` when it is set and parses.
/// Fails if a global subscriber is already installed.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), level);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;

    Ok(())
}

/// Environment directives, then the configured level, then `info`.
fn build_filter(env_directives: Option<String>, level: &str) -> EnvFilter {
    env_directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
