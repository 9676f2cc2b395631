//! Diagnostics for the `wallet-connector` binary.
//!
//! Command output (identities, signatures) is the only thing written to
//! stdout. Every `tracing` event goes to stderr, filtered by `RUST_LOG`
//! when it is set and by `--log-level` otherwise.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact single-line events without timestamps.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Install the process-wide subscriber.
///
/// Fails if one is already installed.
pub fn init_logging(default_level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (compact, json) = match format {
        LogFormat::Pretty => (
            Some(
                fmt::layer()
                    .compact()
                    .without_time()
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(json)
        .try_init()?;
    tracing::debug!(?format, "diagnostics enabled");
    Ok(())
}
