//! Request/response endpoint speaking HTTP.
//!
//! Any request to `/<service>/<method>` becomes one addressed call. Form
//! fields from the query string and from an
//! `application/x-www-form-urlencoded` body are the call's raw arguments.
//! The reply is the JSON form of [`CallResponse`]: status 400 when the call
//! was rejected before reaching its handler, 200 otherwise. Paths without a
//! method segment are 404.
//!
//! The server runs on a single-threaded `tokio` runtime owned by one named
//! thread; dispatch itself happens on the runtime's blocking pool since
//! handlers are synchronous.

mod form;
mod resolver;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use courier_config::SocketEndpoint;
use courier_core::{BoxedEndpointError, CallResponse, Endpoint, EndpointError, ServerContext};

use crate::endpoint::BoundAddress;
use crate::transport::{BoundSocket, ListenerError, SocketListener, release_socket_file};

pub use self::resolver::{FreshSessionResolver, SessionResolver};

const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");

/// HTTP endpoint dispatching form requests to the context's API.
pub struct HttpEndpoint {
    name: String,
    socket: SocketEndpoint,
    resolver: Arc<dyn SessionResolver>,
    running: Option<RunningServer>,
    bound: BoundAddress,
}

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<io::Result<()>>,
}

#[derive(Clone)]
struct HttpState {
    context: Arc<ServerContext>,
    resolver: Arc<dyn SessionResolver>,
}

impl HttpEndpoint {
    /// Endpoint giving every request a fresh session.
    #[must_use]
    pub fn new(socket: SocketEndpoint) -> Self {
        Self::with_resolver(socket, Arc::new(FreshSessionResolver))
    }

    /// Endpoint resolving sessions through `resolver`.
    #[must_use]
    pub fn with_resolver(socket: SocketEndpoint, resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            name: format!("http {socket}"),
            socket,
            resolver,
            running: None,
            bound: BoundAddress::default(),
        }
    }

    /// Handle reporting the bound TCP address once started.
    #[must_use]
    pub fn bound_address(&self) -> BoundAddress {
        self.bound.clone()
    }

    /// Configured socket.
    #[must_use]
    pub const fn socket(&self) -> &SocketEndpoint {
        &self.socket
    }

    fn start_error(&self, error: impl Into<BoxedEndpointError>) -> EndpointError {
        EndpointError::start(self.name.clone(), error)
    }
}

impl Endpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, context: Arc<ServerContext>) -> Result<(), EndpointError> {
        if self.running.is_some() {
            return Err(EndpointError::already_running(self.name.clone()));
        }

        let listener =
            SocketListener::bind(&self.socket).map_err(|error| self.start_error(error))?;
        let address = listener.local_addr();
        let socket = listener
            .into_nonblocking()
            .map_err(|error| self.start_error(error))?;
        let runtime = match Builder::new_current_thread().enable_io().build() {
            Ok(runtime) => runtime,
            Err(error) => {
                release_socket_file(&self.socket);
                return Err(self.start_error(error));
            }
        };

        let router = router(HttpState {
            context,
            resolver: Arc::clone(&self.resolver),
        });
        let (shutdown, signal) = oneshot::channel();
        let endpoint = self.socket.clone();
        let spawned = thread::Builder::new()
            .name(format!("http {}", self.socket))
            .spawn(move || serve(&runtime, socket, router, signal, &endpoint));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(source) => {
                release_socket_file(&self.socket);
                return Err(self.start_error(ListenerError::Spawn { source }));
            }
        };

        self.bound.set(address);
        self.running = Some(RunningServer { shutdown, thread });
        info!(
            target: HTTP_TARGET,
            endpoint = %self.name,
            address = ?address,
            "endpoint listening"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EndpointError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        if running.shutdown.send(()).is_err() {
            debug!(target: HTTP_TARGET, endpoint = %self.name, "http server already stopped");
        }
        self.bound.set(None);
        match running.thread.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(EndpointError::stop(self.name.clone(), error)),
            Err(_) => Err(EndpointError::stop(self.name.clone(), ListenerError::ThreadPanic)),
        }
    }
}

impl fmt::Debug for HttpEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpEndpoint")
            .field("name", &self.name)
            .field("running", &self.running.is_some())
            .field("bound", &self.bound.get())
            .finish_non_exhaustive()
    }
}

/// Serves `router` until `signal` fires or its sender is dropped.
fn serve(
    runtime: &Runtime,
    socket: BoundSocket,
    router: Router,
    signal: oneshot::Receiver<()>,
    endpoint: &SocketEndpoint,
) -> io::Result<()> {
    info!(target: HTTP_TARGET, endpoint = %endpoint, "http server active");
    let shutdown = async move { signal.await.unwrap_or_default() };
    let served = runtime.block_on(async move {
        match socket {
            BoundSocket::Tcp(listener) => {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
            #[cfg(unix)]
            BoundSocket::Unix(listener) => {
                let listener = tokio::net::UnixListener::from_std(listener)?;
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
        }
    });
    release_socket_file(endpoint);
    match &served {
        Ok(()) => info!(target: HTTP_TARGET, endpoint = %endpoint, "http server stopped"),
        Err(error) => warn!(
            target: HTTP_TARGET,
            endpoint = %endpoint,
            error = %error,
            "http server failed"
        ),
    }
    served
}

fn router(state: HttpState) -> Router {
    Router::new()
        .route("/{service}/{*method}", any(dispatch))
        .with_state(state)
}

async fn dispatch(
    State(state): State<HttpState>,
    Path((service, method)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = form::form_values(&headers, &body, query.as_deref());
    let session = state.resolver.resolve(&headers, &state.context);
    debug!(
        target: HTTP_TARGET,
        service = %service,
        method = %method,
        session = session.id(),
        "http call"
    );

    let context = Arc::clone(&state.context);
    let call = tokio::task::spawn_blocking(move || {
        context.handle_call(&service, &method, &raw, session.as_ref())
    });
    match call.await {
        Ok(response) => reply(response),
        Err(error) => {
            warn!(target: HTTP_TARGET, error = %error, "http handler did not complete");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn reply(response: CallResponse) -> Response {
    let status = if response.errors.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(response)).into_response()
}
