//! Error surface for running the daemon process.

use thiserror::Error;

use courier_core::EndpointError;

use crate::bootstrap::BootstrapError;

use super::shutdown::ShutdownError;

/// Errors surfaced while running the daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// An endpoint failed to start.
    #[error("failed to start endpoints: {source}")]
    Start {
        /// Underlying endpoint error.
        #[source]
        source: EndpointError,
    },
    /// An endpoint failed to stop cleanly.
    #[error("failed to stop endpoints: {source}")]
    Stop {
        /// Underlying endpoint error.
        #[source]
        source: EndpointError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}
