//! Daemon bootstrap orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use courier_config::{Config, ConfigError, OrthoConfig, OrthoError, SocketPreparationError};
use courier_core::{Api, EndpointError, RegistrationError, Server, ServerContext};

use crate::endpoint::{BoundAddress, ListenerEndpoint};
use crate::health::HealthReporter;
use crate::http::{FreshSessionResolver, HttpEndpoint, SessionResolver};
use crate::services::system_service;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer fails.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but is not coherent.
    #[error("invalid configuration: {source}")]
    Validation {
        /// Violated constraint.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare endpoint socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// A built-in service could not be registered.
    #[error("failed to register built-in service: {source}")]
    Registration {
        /// Underlying registration error.
        #[source]
        source: RegistrationError,
    },
}

/// Result of a successful bootstrap: a configured server that has not yet
/// started its endpoints.
pub struct Daemon {
    config: Config,
    server: Server,
    console_address: BoundAddress,
    framed_address: BoundAddress,
    http_address: BoundAddress,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared server context.
    #[must_use]
    pub fn context(&self) -> Arc<ServerContext> {
        self.server.context()
    }

    /// Subscriber receiving this daemon's events.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Names of the attached endpoints in start order.
    #[must_use]
    pub fn endpoint_names(&self) -> Vec<String> {
        self.server.endpoint_names().map(str::to_owned).collect()
    }

    /// Whether the endpoints are serving.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// TCP address of the console endpoint while it runs.
    #[must_use]
    pub fn console_address(&self) -> Option<SocketAddr> {
        self.console_address.get()
    }

    /// TCP address of the framed endpoint while it runs.
    #[must_use]
    pub fn framed_address(&self) -> Option<SocketAddr> {
        self.framed_address.get()
    }

    /// TCP address of the HTTP endpoint while it runs.
    #[must_use]
    pub fn http_address(&self) -> Option<SocketAddr> {
        self.http_address.get()
    }

    /// Starts every endpoint.
    ///
    /// # Errors
    ///
    /// Returns the first [`EndpointError`]; endpoints started before it are
    /// stopped again.
    pub fn start(&mut self) -> Result<(), EndpointError> {
        self.reporter.server_starting();
        match self.server.start() {
            Ok(()) => {
                self.reporter.server_ready(&self.endpoint_names());
                Ok(())
            }
            Err(error) => {
                self.reporter.server_failed(&error);
                Err(error)
            }
        }
    }

    /// Stops every endpoint.
    ///
    /// # Errors
    ///
    /// Returns the first [`EndpointError`] raised while stopping.
    pub fn stop(&mut self) -> Result<(), EndpointError> {
        let result = self.server.stop();
        self.reporter.server_stopped();
        result
    }
}

/// Bootstraps the daemon around `api` using the supplied collaborators.
///
/// The `system` service is added to `api`, replacing any application service
/// of the same name.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry, socket
/// preparation or built-in registration fails. The reporter is told about
/// the failure before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    api: Api,
) -> Result<Daemon, BootstrapError> {
    bootstrap_with_resolver(loader, reporter, api, Arc::new(FreshSessionResolver))
}

/// Like [`bootstrap_with`], with HTTP sessions chosen by `resolver`.
///
/// # Errors
///
/// Returns [`BootstrapError`] under the same conditions as
/// [`bootstrap_with`].
pub fn bootstrap_with_resolver(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    api: Api,
    resolver: Arc<dyn SessionResolver>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match assemble(loader, &reporter, api, resolver) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(&daemon.config);
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn assemble(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    mut api: Api,
    resolver: Arc<dyn SessionResolver>,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Validation { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    for socket in [
        config.console_socket(),
        config.framed_socket(),
        config.http_socket(),
    ] {
        socket
            .prepare_filesystem()
            .map_err(|source| BootstrapError::Socket { source })?;
    }

    let system = system_service().map_err(|source| BootstrapError::Registration { source })?;
    api.add_service(system)
        .map_err(|source| BootstrapError::Registration { source })?;

    let mut server = Server::new(ServerContext::with_basic_sessions(api));
    let console = ListenerEndpoint::console(config.console_socket().clone());
    let framed = ListenerEndpoint::framed(config.framed_socket().clone(), config.max_frame_bytes());
    let http = HttpEndpoint::with_resolver(config.http_socket().clone(), resolver);
    let console_address = console.bound_address();
    let framed_address = framed.bound_address();
    let http_address = http.bound_address();
    server.add_endpoint(console);
    server.add_endpoint(framed);
    server.add_endpoint(http);

    Ok(Daemon {
        config,
        server,
        console_address,
        framed_address,
        http_address,
        telemetry,
        reporter: Arc::clone(reporter),
    })
}
