//! Length-prefixed binary endpoint.
//!
//! Each frame carries one request envelope (`target`, `args`, optional `id`)
//! encoded as a MessagePack map. Replies travel back through the session's
//! send path so server-initiated pushes share the same framing.

mod codec;

use std::io::{self, BufReader};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use courier_core::{ServerContext, Session, SessionConnection};

use crate::transport::{ConnectionHandler, ConnectionStream};

use self::codec::{FrameError, decode_message, encode_message, read_frame, write_frame};

pub(crate) const FRAMED_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::framed");

/// Serves framed connections against a shared server context.
pub(crate) struct FramedHandler {
    context: Arc<ServerContext>,
    max_frame_bytes: usize,
}

impl FramedHandler {
    pub(crate) fn new(context: Arc<ServerContext>, max_frame_bytes: u32) -> Self {
        Self {
            context,
            max_frame_bytes: usize::try_from(max_frame_bytes).unwrap_or(usize::MAX),
        }
    }

    fn serve(&self, stream: ConnectionStream) -> Result<(), FrameError> {
        let peer = stream.peer();
        let connection = Arc::new(FramedConnection::new(stream.try_clone()?, peer.clone()));
        let session = self
            .context
            .create_session(Arc::clone(&connection) as Arc<dyn SessionConnection>);
        debug!(
            target: FRAMED_TARGET,
            peer = %peer,
            session = session.id(),
            "framed connection opened"
        );

        let mut reader = BufReader::new(stream);
        let result = self.serve_frames(&mut reader, session.as_ref(), &peer);
        connection.close();
        result
    }

    fn serve_frames(
        &self,
        reader: &mut BufReader<ConnectionStream>,
        session: &dyn Session,
        peer: &str,
    ) -> Result<(), FrameError> {
        while let Some(body) = read_frame(reader, self.max_frame_bytes)? {
            let request = match decode_message(&body) {
                Ok(request) => request,
                Err(error) => {
                    warn!(
                        target: FRAMED_TARGET,
                        peer = %peer,
                        error = %error,
                        "skipping undecodable frame"
                    );
                    continue;
                }
            };

            let reply = self.context.handle_request(&request, session);
            let encoded = encode_message(&reply)?;
            session.send(&encoded).map_err(io::Error::other)?;
        }
        Ok(())
    }
}

impl ConnectionHandler for FramedHandler {
    fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        match self.serve(stream) {
            Ok(()) => debug!(target: FRAMED_TARGET, peer = %peer, "connection closed"),
            Err(error) => warn!(
                target: FRAMED_TARGET,
                peer = %peer,
                error = %error,
                "framed connection closed with error"
            ),
        }
    }
}

/// Write half of a framed connection, shared with the session.
struct FramedConnection {
    writer: Mutex<ConnectionStream>,
    peer: String,
}

impl FramedConnection {
    fn new(writer: ConnectionStream, peer: String) -> Self {
        Self {
            writer: Mutex::new(writer),
            peer,
        }
    }

    fn close(&self) {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = writer.shutdown() {
            debug!(
                target: FRAMED_TARGET,
                peer = %self.peer,
                error = %error,
                "framed shutdown failed"
            );
        }
    }
}

impl SessionConnection for FramedConnection {
    fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_frame(&mut *writer, payload).map_err(|error| match error {
            FrameError::Io(source) => source,
            other => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
        })
    }

    fn describe(&self) -> String {
        format!("framed {}", self.peer)
    }
}
