//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use courier_config::Config;
use courier_core::EndpointError;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ServerStarting,
    ServerReady(Vec<String>),
    ServerFailed(String),
    ServerStopped,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn server_starting(&self) {
        self.record(HealthEvent::ServerStarting);
    }

    fn server_ready(&self, endpoints: &[String]) {
        self.record(HealthEvent::ServerReady(endpoints.to_vec()));
    }

    fn server_failed(&self, error: &EndpointError) {
        self.record(HealthEvent::ServerFailed(error.to_string()));
    }

    fn server_stopped(&self) {
        self.record(HealthEvent::ServerStopped);
    }
}
