//! Shared collaborators for the daemon behavioural suites.

mod clients;
mod config_loader;
mod reporter;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use courier_core::{Api, ApiData, ArgumentKind, ArgumentSpec, HandlerReply, Service};

use crate::process::{ShutdownError, ShutdownSignal};

pub use clients::{ConsoleClient, FramedClient, HttpClient, HttpReply};
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};

/// Application API with a `calc` service exposing `add(a, b)`.
pub fn calculator_api() -> Api {
    let mut calc = Service::new("calc");
    calc.add_method(
        "add",
        vec![
            ArgumentSpec::required("a", ArgumentKind::Int),
            ArgumentSpec::required("b", ArgumentKind::Int),
        ],
        |args, _session, _context| {
            let total = args.int("a").unwrap_or_default() + args.int("b").unwrap_or_default();
            let mut data = ApiData::new();
            data.insert("sum".to_owned(), Value::from(total));
            HandlerReply::success(data)
        },
    )
    .expect("register add");

    let mut api = Api::new();
    api.add_service(calc).expect("register calc");
    api
}

/// Shutdown signal that returns immediately and counts how often it waited.
#[derive(Debug, Default)]
pub struct ImmediateShutdown {
    waits: AtomicUsize,
}

impl ImmediateShutdown {
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared reporter handle typed for [`crate::bootstrap_with`].
pub fn reporter_handle(reporter: &Arc<RecordingHealthReporter>) -> Arc<dyn crate::HealthReporter> {
    Arc::clone(reporter) as Arc<dyn crate::HealthReporter>
}
