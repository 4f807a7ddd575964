//! Connection handlers used by the listener tests.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET};

/// Writes `ack\n` to every connection and remembers who connected.
#[derive(Default)]
pub(crate) struct AckHandler {
    peers: Mutex<Vec<String>>,
}

impl AckHandler {
    pub(crate) fn peers(&self) -> Vec<String> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConnectionHandler for AckHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stream.peer());
        if let Err(error) = stream.write_all(b"ack\n").and_then(|()| stream.flush()) {
            debug!(target: LISTENER_TARGET, error = %error, "acknowledgement failed");
        }
    }
}
