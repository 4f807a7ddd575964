//! Process-wide `tracing` subscriber for the daemon.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt;

use courier_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Describes the subscriber that is actually receiving events.
///
/// Only the first successful initialisation installs a subscriber; later
/// daemons in the same process share it and get the same handle back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    filter: String,
    format: LogFormat,
}

impl TelemetryHandle {
    /// Filter directives of the installed subscriber.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directives do not parse.
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        /// Rejected directives.
        filter: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install telemetry subscriber: {source}")]
    Subscriber {
        /// Error from `tracing`.
        #[source]
        source: SetGlobalDefaultError,
    },
}

/// Installs the global subscriber described by `config`, once per process.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or another
/// subscriber was installed first.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let handle = INSTALLED.get_or_try_init(|| install_subscriber(config))?;
    if handle.filter != config.log_filter() || handle.format != config.log_format() {
        debug!(
            target: TELEMETRY_TARGET,
            requested_filter = config.log_filter(),
            active_filter = handle.filter(),
            "telemetry already installed; keeping the active subscriber"
        );
    }
    Ok(handle.clone())
}

fn install_subscriber(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|source| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            source,
        })?;

    // Connection threads are named after their peer, so names are worth showing.
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|source| TelemetryError::Subscriber { source })?;

    Ok(TelemetryHandle {
        filter: config.log_filter().to_owned(),
        format: config.log_format(),
    })
}
