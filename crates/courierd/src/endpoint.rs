//! [`Endpoint`] implementations backed by the socket listener.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use courier_config::SocketEndpoint;
use courier_core::{Endpoint, EndpointError, ServerContext};

use crate::console::ConsoleHandler;
use crate::framed::FramedHandler;
use crate::transport::{ConnectionHandler, ListenerHandle, SocketListener};

const ENDPOINT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::endpoint");

type HandlerFactory = Box<dyn Fn(Arc<ServerContext>) -> Arc<dyn ConnectionHandler> + Send>;

/// Shared view of the TCP address an endpoint is bound to.
///
/// Useful when the configured port is `0`. Empty until the endpoint starts
/// and for Unix sockets.
#[derive(Debug, Default, Clone)]
pub struct BoundAddress(Arc<Mutex<Option<SocketAddr>>>);

impl BoundAddress {
    /// Current bound address.
    #[must_use]
    pub fn get(&self) -> Option<SocketAddr> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, address: Option<SocketAddr>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = address;
    }
}

/// Socket-listening endpoint serving either the console or framed protocol.
pub struct ListenerEndpoint {
    name: String,
    socket: SocketEndpoint,
    handler: HandlerFactory,
    listener: Option<ListenerHandle>,
    bound: BoundAddress,
}

impl ListenerEndpoint {
    /// Line-oriented console endpoint.
    #[must_use]
    pub fn console(socket: SocketEndpoint) -> Self {
        Self::new("console", socket, Box::new(console_handler))
    }

    /// Length-prefixed MessagePack endpoint.
    #[must_use]
    pub fn framed(socket: SocketEndpoint, max_frame_bytes: u32) -> Self {
        Self::new(
            "framed",
            socket,
            Box::new(move |context: Arc<ServerContext>| -> Arc<dyn ConnectionHandler> {
                Arc::new(FramedHandler::new(context, max_frame_bytes))
            }),
        )
    }

    fn new(name: &str, socket: SocketEndpoint, handler: HandlerFactory) -> Self {
        Self {
            name: format!("{name} {socket}"),
            socket,
            handler,
            listener: None,
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
}

fn console_handler(context: Arc<ServerContext>) -> Arc<dyn ConnectionHandler> {
    Arc::new(ConsoleHandler::new(context))
}

impl Endpoint for ListenerEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, context: Arc<ServerContext>) -> Result<(), EndpointError> {
        if self.listener.is_some() {
            return Err(EndpointError::already_running(self.name.clone()));
        }

        let listener = SocketListener::bind(&self.socket)
            .map_err(|error| EndpointError::start(self.name.clone(), error))?;
        let address = listener.local_addr();
        let handle = listener
            .start((self.handler)(context))
            .map_err(|error| EndpointError::start(self.name.clone(), error))?;

        self.bound.set(address);
        self.listener = Some(handle);
        info!(
            target: ENDPOINT_TARGET,
            endpoint = %self.name,
            address = ?address,
            "endpoint listening"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EndpointError> {
        let Some(handle) = self.listener.take() else {
            return Ok(());
        };
        handle.shutdown();
        self.bound.set(None);
        handle
            .join()
            .map_err(|error| EndpointError::stop(self.name.clone(), error))
    }
}

impl fmt::Debug for ListenerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ListenerEndpoint")
            .field("name", &self.name)
            .field("running", &self.listener.is_some())
            .field("bound", &self.bound.get())
            .finish_non_exhaustive()
    }
}
