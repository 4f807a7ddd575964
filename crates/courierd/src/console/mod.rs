//! Line-oriented console endpoint.
//!
//! Operators connect with a plain TCP client (`nc`, `telnet`) and type
//! `[<service>] <method> [args...]`. Each connection gets its own session and
//! runs until the peer disconnects or sends `quit`.

mod commands;

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use courier_core::{ServerContext, SessionConnection};

use crate::transport::{ConnectionHandler, ConnectionStream};

use self::commands::execute;

pub(crate) const CONSOLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::console");

const GREETING: &[u8] = b"Type 'help' for help\n";
const PROMPT: &[u8] = b"courier> ";
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Serves console connections against a shared server context.
pub(crate) struct ConsoleHandler {
    context: Arc<ServerContext>,
}

impl ConsoleHandler {
    pub(crate) const fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    fn serve(&self, stream: ConnectionStream) -> io::Result<()> {
        let peer = stream.peer();
        let connection = Arc::new(ConsoleConnection::new(stream.try_clone()?, peer.clone()));
        let session = self
            .context
            .create_session(Arc::clone(&connection) as Arc<dyn SessionConnection>);
        debug!(
            target: CONSOLE_TARGET,
            peer = %peer,
            session = session.id(),
            "console connection opened"
        );

        connection.send(GREETING)?;
        let mut reader = BufReader::new(stream);
        loop {
            connection.send(PROMPT)?;
            let Some(line) = read_line(&mut reader)? else {
                break;
            };
            let outcome = execute(&line, &self.context, session.as_ref());
            if !outcome.output.is_empty() {
                connection.send(outcome.output.as_bytes())?;
            }
            if outcome.close {
                break;
            }
        }

        connection.close();
        Ok(())
    }
}

impl ConnectionHandler for ConsoleHandler {
    fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        match self.serve(stream) {
            Ok(()) => debug!(target: CONSOLE_TARGET, peer = %peer, "connection closed"),
            Err(error) => warn!(
                target: CONSOLE_TARGET,
                peer = %peer,
                error = %error,
                "console connection failed"
            ),
        }
    }
}

/// Reads one line, stripping the terminator. Returns `None` at end of input.
///
/// The limit applies to the line content; a `\r\n` terminator does not
/// count towards it.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let limit = MAX_LINE_BYTES + 2;
    let mut buffer = Vec::new();
    let read = reader
        .by_ref()
        .take(u64::try_from(limit).unwrap_or(u64::MAX))
        .read_until(b'\n', &mut buffer)?;
    if read == 0 {
        return Ok(None);
    }
    let terminated = buffer.last() == Some(&b'\n');
    while matches!(buffer.last(), Some(b'\n' | b'\r')) {
        buffer.pop();
    }
    if buffer.len() > MAX_LINE_BYTES || (!terminated && read == limit) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("console line exceeds {MAX_LINE_BYTES} bytes"),
        ));
    }
    Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
}

/// Write half of a console connection, shared with the session.
struct ConsoleConnection {
    writer: Mutex<ConnectionStream>,
    peer: String,
}

impl ConsoleConnection {
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
                target: CONSOLE_TARGET,
                peer = %self.peer,
                error = %error,
                "console shutdown failed"
            );
        }
    }
}

impl SessionConnection for ConsoleConnection {
    fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(payload)?;
        writer.flush()
    }

    fn describe(&self) -> String {
        format!("console {}", self.peer)
    }
}
