//! Socket listener shared by the console, framed and HTTP endpoints.
//!
//! The transport module binds to configured socket endpoints and accepts
//! connections in a background thread, handing each one to a
//! [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream, read_chunk_with_retry};
pub(crate) use self::listener::{
    BoundSocket, ListenerHandle, SocketListener, release_socket_file,
};
#[cfg(test)]
pub(crate) use self::test_utils::AckHandler;

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
