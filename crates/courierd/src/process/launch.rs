//! Runs the daemon from bootstrap through shutdown.

use std::sync::Arc;

use tracing::info;

use courier_core::Api;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs a daemon exposing only the built-in services.
///
/// # Errors
///
/// See [`run_daemon_with`].
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with_api(Api::new())
}

/// Runs a daemon serving `api` with the production collaborators.
///
/// # Errors
///
/// See [`run_daemon_with`].
pub fn run_daemon_with_api(api: Api) -> Result<(), LaunchError> {
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        api,
        &SystemShutdownSignal::new(),
    )
}

/// Runs the daemon with injected collaborators.
///
/// Bootstraps, starts every endpoint, blocks on `shutdown`, then stops the
/// endpoints again. Endpoints are stopped even when waiting fails.
///
/// # Errors
///
/// Returns [`LaunchError`] for the first stage that fails.
pub fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    api: Api,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let mut daemon = bootstrap_with(loader, reporter, api)?;
    daemon
        .start()
        .map_err(|source| LaunchError::Start { source })?;

    let waited = shutdown.wait();
    let stopped = daemon.stop();
    waited.map_err(|source| LaunchError::Shutdown { source })?;
    stopped.map_err(|source| LaunchError::Stop { source })?;

    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use mockall::{Sequence, mock};

    use courier_config::Config;
    use courier_core::EndpointError;

    use crate::bootstrap::{BootstrapError, StaticConfigLoader};
    use crate::process::ShutdownError;

    use super::*;

    mock! {
        Signal {}
        impl ShutdownSignal for Signal {
            fn wait(&self) -> Result<(), ShutdownError>;
        }
    }

    mock! {
        Reporter {}
        impl HealthReporter for Reporter {
            fn bootstrap_starting(&self);
            fn bootstrap_succeeded(&self, config: &Config);
            fn bootstrap_failed(&self, error: &BootstrapError);
            fn server_starting(&self);
            fn server_ready(&self, endpoints: &[String]);
            fn server_failed(&self, error: &EndpointError);
            fn server_stopped(&self);
        }
    }

    fn loopback_config() -> StaticConfigLoader {
        StaticConfigLoader::new(Config {
            console_socket: courier_config::SocketEndpoint::tcp("127.0.0.1", 0),
            framed_socket: courier_config::SocketEndpoint::tcp("127.0.0.1", 0),
            http_socket: courier_config::SocketEndpoint::tcp("127.0.0.1", 0),
            ..Config::default()
        })
    }

    fn quiet_reporter() -> MockReporter {
        let mut reporter = MockReporter::new();
        reporter.expect_bootstrap_starting().return_const(());
        reporter.expect_bootstrap_succeeded().return_const(());
        reporter.expect_server_starting().return_const(());
        reporter.expect_server_ready().return_const(());
        reporter.expect_server_stopped().times(1).return_const(());
        reporter
    }

    #[test]
    fn endpoints_stop_even_when_waiting_fails() {
        let mut signal = MockSignal::new();
        signal.expect_wait().times(1).returning(|| {
            Err(ShutdownError::Install {
                source: io::Error::other("no signals here"),
            })
        });

        let result = run_daemon_with(
            &loopback_config(),
            Arc::new(quiet_reporter()),
            Api::new(),
            &signal,
        );

        assert!(matches!(result, Err(LaunchError::Shutdown { .. })));
    }

    #[test]
    fn lifecycle_events_follow_the_run() {
        let mut sequence = Sequence::new();
        let mut reporter = MockReporter::new();
        reporter
            .expect_bootstrap_starting()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_bootstrap_succeeded()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_server_starting()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_server_ready()
            .withf(|endpoints| endpoints.len() == 2)
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_server_stopped()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        let mut signal = MockSignal::new();
        signal.expect_wait().times(1).returning(|| Ok(()));

        run_daemon_with(&loopback_config(), Arc::new(reporter), Api::new(), &signal)
            .expect("daemon runs to completion");
    }

    #[test]
    fn start_failures_are_reported() {
        let mut occupied = crate::ListenerEndpoint::console(courier_config::SocketEndpoint::tcp(
            "127.0.0.1",
            0,
        ));
        courier_core::Endpoint::start(
            &mut occupied,
            Arc::new(courier_core::ServerContext::with_basic_sessions(Api::new())),
        )
        .expect("occupy a port");
        let port = occupied
            .bound_address()
            .get()
            .expect("bound address")
            .port();

        let loader = StaticConfigLoader::new(Config {
            console_socket: courier_config::SocketEndpoint::tcp("127.0.0.1", port),
            framed_socket: courier_config::SocketEndpoint::tcp("127.0.0.1", 0),
            http_socket: courier_config::SocketEndpoint::tcp("127.0.0.1", 0),
            ..Config::default()
        });
        let mut reporter = MockReporter::new();
        reporter.expect_bootstrap_starting().return_const(());
        reporter.expect_bootstrap_succeeded().return_const(());
        reporter.expect_server_starting().return_const(());
        reporter.expect_server_failed().times(1).return_const(());
        let signal = MockSignal::new();

        let result = run_daemon_with(&loader, Arc::new(reporter), Api::new(), &signal);

        assert!(matches!(result, Err(LaunchError::Start { .. })));
        courier_core::Endpoint::stop(&mut occupied).expect("release port");
    }
}
