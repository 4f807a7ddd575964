//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use courier_config::Config;
use courier_core::EndpointError;

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the server starts its endpoints.
    fn server_starting(&self);

    /// Invoked once every endpoint is accepting connections.
    fn server_ready(&self, endpoints: &[String]);

    /// Invoked when an endpoint fails to start.
    fn server_failed(&self, error: &EndpointError);

    /// Invoked after every endpoint has stopped.
    fn server_stopped(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn server_starting(&self) {
        (**self).server_starting();
    }

    fn server_ready(&self, endpoints: &[String]) {
        (**self).server_ready(endpoints);
    }

    fn server_failed(&self, error: &EndpointError) {
        (**self).server_failed(error);
    }

    fn server_stopped(&self) {
        (**self).server_stopped();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            console_socket = %config.console_socket(),
            framed_socket = %config.framed_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn server_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_starting",
            "starting endpoints"
        );
    }

    fn server_ready(&self, endpoints: &[String]) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_ready",
            endpoints = ?endpoints,
            "endpoints ready"
        );
    }

    fn server_failed(&self, error: &EndpointError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "server_failed",
            error = %error,
            "endpoint failed to start"
        );
    }

    fn server_stopped(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            "endpoints stopped"
        );
    }
}
