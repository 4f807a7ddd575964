//! Composition root shared by every transport.
//!
//! [`ServerContext`] owns the [`Api`], the [`SessionFactory`] and the names
//! of the endpoints currently serving it. It is built once, frozen behind an
//! [`Arc`], and handed to every endpoint and handler. [`Server`] drives the
//! lifecycle of the transport endpoints attached to a context and keeps the
//! context's view of active endpoints current.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::router::{Api, CallResponse};
use crate::session::{BasicSessionFactory, Session, SessionConnection, SessionFactory};
use crate::value::ApiData;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Boxed error raised by an endpoint implementation.
pub type BoxedEndpointError = Box<dyn Error + Send + Sync + 'static>;

/// Shared, read-only state handed to transports and handlers.
pub struct ServerContext {
    api: Api,
    sessions: Arc<dyn SessionFactory>,
    active: Mutex<Vec<String>>,
}

impl ServerContext {
    /// Builds a context from a populated API and a session factory.
    #[must_use]
    pub fn new(api: Api, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            api,
            sessions,
            active: Mutex::new(Vec::new()),
        }
    }

    /// Builds a context that creates [`crate::BasicSession`]s.
    #[must_use]
    pub fn with_basic_sessions(api: Api) -> Self {
        Self::new(api, Arc::new(BasicSessionFactory))
    }

    /// Registered services.
    #[must_use]
    pub const fn api(&self) -> &Api {
        &self.api
    }

    /// Names of the endpoints currently serving this context, in start order.
    #[must_use]
    pub fn active_endpoints(&self) -> Vec<String> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn endpoint_started(&self, name: &str) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_owned());
    }

    fn endpoint_stopped(&self, name: &str) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|active| active != name);
    }

    /// Creates the session for a newly accepted connection.
    #[must_use]
    pub fn create_session(&self, connection: Arc<dyn SessionConnection>) -> Arc<dyn Session> {
        self.sessions.create(connection)
    }

    /// Dispatches an addressed call against this context.
    #[must_use]
    pub fn handle_call(
        &self,
        service: &str,
        method: &str,
        raw: &ApiData,
        session: &dyn Session,
    ) -> CallResponse {
        self.api.handle_call(service, method, raw, session, self)
    }

    /// Dispatches positional tokens against this context.
    #[must_use]
    pub fn handle_positional<T: AsRef<str>>(
        &self,
        service: &str,
        method: &str,
        tokens: &[T],
        session: &dyn Session,
    ) -> CallResponse {
        self.api
            .handle_positional(service, method, tokens, session, self)
    }

    /// Dispatches an enveloped request against this context.
    #[must_use]
    pub fn handle_request(&self, payload: &ApiData, session: &dyn Session) -> ApiData {
        self.api.handle_request(payload, session, self)
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerContext")
            .field("api", &self.api)
            .field("active", &self.active_endpoints())
            .finish_non_exhaustive()
    }
}

/// Errors reported by endpoint lifecycle operations.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// `start` was called on an endpoint that is already serving.
    #[error("endpoint '{endpoint}' is already running")]
    AlreadyRunning {
        /// Endpoint name.
        endpoint: String,
    },
    /// The endpoint failed to begin serving.
    #[error("endpoint '{endpoint}' failed to start: {source}")]
    Start {
        /// Endpoint name.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: BoxedEndpointError,
    },
    /// The endpoint failed to shut down cleanly.
    #[error("endpoint '{endpoint}' failed to stop: {source}")]
    Stop {
        /// Endpoint name.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: BoxedEndpointError,
    },
}

impl EndpointError {
    /// Builds an [`EndpointError::AlreadyRunning`].
    #[must_use]
    pub fn already_running(endpoint: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            endpoint: endpoint.into(),
        }
    }

    /// Builds an [`EndpointError::Start`].
    #[must_use]
    pub fn start(endpoint: impl Into<String>, source: impl Into<BoxedEndpointError>) -> Self {
        Self::Start {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    /// Builds an [`EndpointError::Stop`].
    #[must_use]
    pub fn stop(endpoint: impl Into<String>, source: impl Into<BoxedEndpointError>) -> Self {
        Self::Stop {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }
}

/// A transport serving the API.
///
/// Endpoints create one session per logical connection through
/// [`ServerContext::create_session`] and funnel every call into the router.
pub trait Endpoint: Send {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Begins serving. Must return once the endpoint is accepting work.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the endpoint is already running or
    /// cannot bind its resources.
    fn start(&mut self, context: Arc<ServerContext>) -> Result<(), EndpointError>;

    /// Stops serving and releases resources. Stopping an idle endpoint is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Stop`] when shutdown did not complete cleanly.
    fn stop(&mut self) -> Result<(), EndpointError>;
}

/// Owns a context and the endpoints serving it.
pub struct Server {
    context: Arc<ServerContext>,
    endpoints: Vec<Box<dyn Endpoint>>,
    running: bool,
}

impl Server {
    /// Creates a server around a frozen context.
    #[must_use]
    pub fn new(context: ServerContext) -> Self {
        Self {
            context: Arc::new(context),
            endpoints: Vec::new(),
            running: false,
        }
    }

    /// Shared context.
    #[must_use]
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.context)
    }

    /// Attaches an endpoint. Endpoints start in attachment order.
    pub fn add_endpoint(&mut self, endpoint: impl Endpoint + 'static) {
        self.endpoints.push(Box::new(endpoint));
    }

    /// Names of the attached endpoints in attachment order.
    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|endpoint| endpoint.name())
    }

    /// Whether [`Self::start`] succeeded and [`Self::stop`] has not yet run.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Starts every endpoint.
    ///
    /// If one endpoint fails, the endpoints started before it are stopped in
    /// reverse order and the failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`EndpointError`] raised by an endpoint.
    pub fn start(&mut self) -> Result<(), EndpointError> {
        for position in 0..self.endpoints.len() {
            let Some(endpoint) = self.endpoints.get_mut(position) else {
                continue;
            };
            match endpoint.start(Arc::clone(&self.context)) {
                Ok(()) => {
                    self.context.endpoint_started(endpoint.name());
                    info!(target: SERVER_TARGET, endpoint = endpoint.name(), "endpoint started");
                }
                Err(error) => {
                    warn!(
                        target: SERVER_TARGET,
                        endpoint = endpoint.name(),
                        %error,
                        "endpoint failed to start; rolling back"
                    );
                    self.stop_range(position);
                    return Err(error);
                }
            }
        }
        self.running = true;
        Ok(())
    }

    /// Stops every endpoint in reverse order.
    ///
    /// All endpoints are asked to stop even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`EndpointError`] encountered.
    pub fn stop(&mut self) -> Result<(), EndpointError> {
        self.running = false;
        let mut first_error = None;
        for endpoint in self.endpoints.iter_mut().rev() {
            self.context.endpoint_stopped(endpoint.name());
            if let Err(error) = endpoint.stop() {
                warn!(target: SERVER_TARGET, endpoint = endpoint.name(), %error, "endpoint stop failed");
                first_error.get_or_insert(error);
            } else {
                info!(target: SERVER_TARGET, endpoint = endpoint.name(), "endpoint stopped");
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn stop_range(&mut self, end: usize) {
        for endpoint in self.endpoints.iter_mut().take(end).rev() {
            self.context.endpoint_stopped(endpoint.name());
            if let Err(error) = endpoint.stop() {
                warn!(target: SERVER_TARGET, endpoint = endpoint.name(), %error, "rollback stop failed");
            }
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Server")
            .field("context", &self.context)
            .field("endpoints", &self.endpoint_names().collect::<Vec<_>>())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use mockall::{Sequence, mock};

    use super::*;

    mock! {
        Transport {}
        impl Endpoint for Transport {
            fn name(&self) -> &str;
            fn start(&mut self, context: Arc<ServerContext>) -> Result<(), EndpointError>;
            fn stop(&mut self) -> Result<(), EndpointError>;
        }
    }

    fn context() -> ServerContext {
        ServerContext::with_basic_sessions(Api::new())
    }

    fn named(name: &'static str) -> MockTransport {
        let mut transport = MockTransport::new();
        transport.expect_name().return_const(name.to_owned());
        transport
    }

    #[test]
    fn starts_and_stops_endpoints_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut server = Server::new(context());
        for name in ["first", "second"] {
            let mut transport = named(name);
            let start_log = Arc::clone(&log);
            transport.expect_start().once().returning(move |_| {
                start_log.lock().expect("log").push(format!("start {name}"));
                Ok(())
            });
            let stop_log = Arc::clone(&log);
            transport.expect_stop().once().returning(move || {
                stop_log.lock().expect("log").push(format!("stop {name}"));
                Ok(())
            });
            server.add_endpoint(transport);
        }

        server.start().expect("start");
        assert!(server.is_running());
        assert_eq!(server.context().active_endpoints(), vec!["first", "second"]);
        server.stop().expect("stop");
        assert!(server.context().active_endpoints().is_empty());

        assert_eq!(
            *log.lock().expect("log"),
            vec!["start first", "start second", "stop second", "stop first"]
        );
    }

    #[test]
    fn failed_start_rolls_back_started_endpoints() {
        let mut sequence = Sequence::new();
        let mut first = named("first");
        first
            .expect_start()
            .once()
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));
        let mut second = named("second");
        second
            .expect_start()
            .once()
            .in_sequence(&mut sequence)
            .returning(|_| {
                Err(EndpointError::start(
                    "second",
                    io::Error::new(io::ErrorKind::AddrInUse, "busy"),
                ))
            });
        first
            .expect_stop()
            .once()
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));
        second.expect_stop().never();

        let mut server = Server::new(context());
        server.add_endpoint(first);
        server.add_endpoint(second);

        let error = server.start().expect_err("second endpoint fails");
        assert!(matches!(error, EndpointError::Start { ref endpoint, .. } if endpoint == "second"));
        assert!(!server.is_running());
        assert!(server.context().active_endpoints().is_empty());
    }

    #[test]
    fn stop_reports_first_failure_after_stopping_everything() {
        let mut failing = named("failing");
        failing
            .expect_stop()
            .once()
            .returning(|| Err(EndpointError::stop("failing", "socket busy")));
        let mut healthy = named("healthy");
        healthy.expect_stop().once().returning(|| Ok(()));

        let mut server = Server::new(context());
        server.add_endpoint(healthy);
        server.add_endpoint(failing);

        let error = server.stop().expect_err("one endpoint fails");
        assert!(matches!(error, EndpointError::Stop { .. }));
    }

    #[test]
    fn endpoint_names_follow_attachment_order() {
        let mut server = Server::new(context());
        server.add_endpoint(named("console"));
        server.add_endpoint(named("framed"));
        assert_eq!(server.endpoint_names().collect::<Vec<_>>(), vec!["console", "framed"]);
    }
}
