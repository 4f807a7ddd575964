//! Accept loop shared by every socket-backed endpoint.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use courier_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

/// Sleep between polls when no connection is pending.
const IDLE_POLL: Duration = Duration::from_millis(25);
/// Sleep after a failed accept.
const FAILURE_BACKOFF: Duration = Duration::from_millis(150);

/// Socket bound to an endpoint but not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
}

/// Listening socket of either family.
#[derive(Debug)]
pub(crate) enum BoundSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl BoundSocket {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Accepts one pending connection, returning `None` when none is waiting.
    ///
    /// Accepted streams are switched back to blocking mode for the handler.
    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl SocketListener {
    /// Binds `endpoint`, reclaiming a stale Unix socket file when needed.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let socket = match endpoint {
            SocketEndpoint::Tcp { host, port } => BoundSocket::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => BoundSocket::Unix(bind_unix(path.as_std_path())?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::UnsupportedUnix {
                    endpoint: endpoint.to_string(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            BoundSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            BoundSocket::Unix(_) => None,
        }
    }

    /// Hands the bound socket over in non-blocking mode, for endpoints that
    /// drive their own accept loop.
    pub(crate) fn into_nonblocking(self) -> Result<BoundSocket, ListenerError> {
        if let Err(source) = self.socket.set_nonblocking() {
            self.release();
            return Err(ListenerError::NonBlocking { source });
        }
        Ok(self.socket)
    }

    /// Moves the listener onto a background accept thread.
    ///
    /// Every accepted connection is served by `handler` on a thread of its
    /// own, so a slow peer never holds up the accept loop.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.socket.set_nonblocking() {
            self.release();
            return Err(ListenerError::NonBlocking { source });
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name(format!("accept {}", self.endpoint))
            .spawn(move || self.serve(&flag, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            thread: Some(thread),
        })
    }

    fn serve(self, shutdown: &AtomicBool, handler: &Arc<dyn ConnectionHandler>) {
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "socket listener active");
        let mut repeated = None::<io::ErrorKind>;
        while !shutdown.load(Ordering::SeqCst) {
            match self.socket.accept() {
                Ok(Some(stream)) => {
                    repeated = None;
                    self.dispatch(stream, handler);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Only the first of a run of identical failures is logged.
                    if repeated != Some(error.kind()) {
                        warn!(
                            target: LISTENER_TARGET,
                            endpoint = %self.endpoint,
                            error = %error,
                            "socket accept failed"
                        );
                    }
                    repeated = Some(error.kind());
                    thread::sleep(FAILURE_BACKOFF);
                }
            }
        }
        self.release();
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "socket listener stopped");
    }

    fn dispatch(&self, stream: ConnectionStream, handler: &Arc<dyn ConnectionHandler>) {
        let peer = stream.peer();
        debug!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            peer = %peer,
            "connection accepted"
        );
        let handler = Arc::clone(handler);
        let spawned = thread::Builder::new()
            .name(format!("conn {peer}"))
            .spawn(move || handler.handle(stream));
        if let Err(error) = spawned {
            warn!(
                target: LISTENER_TARGET,
                peer = %peer,
                error = %error,
                "dropping connection: no thread available"
            );
        }
    }

    fn release(&self) {
        release_socket_file(&self.endpoint);
    }
}

/// Removes the socket file of a Unix endpoint; TCP endpoints are untouched.
pub(crate) fn release_socket_file(endpoint: &SocketEndpoint) {
    #[cfg(unix)]
    if let SocketEndpoint::Unix { path } = endpoint
        && let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            path = %path,
            error = %error,
            "failed to remove unix socket file"
        );
    }
    #[cfg(not(unix))]
    let _ = endpoint;
}

/// Owner of a running accept thread.
///
/// Dropping the handle asks the thread to stop without waiting for it.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop after its current poll.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept thread to finish.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        self.thread
            .take()
            .map_or(Ok(()), |thread| {
                thread.join().map_err(|_| ListenerError::ThreadPanic)
            })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        reclaim_stale_socket(path)?;
    }
    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

/// Deletes a socket file left behind by a daemon that is no longer running.
///
/// Refuses to touch anything that is not a socket, and any socket that still
/// accepts connections.
#[cfg(unix)]
fn reclaim_stale_socket(path: &Path) -> Result<(), ListenerError> {
    let display = || path.display().to_string();
    let metadata = fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
        path: display(),
        source,
    })?;
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::UnixNotSocket { path: display() });
    }

    match UnixStream::connect(path) {
        Ok(_live) => Err(ListenerError::UnixInUse { path: display() }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(target: LISTENER_TARGET, path = %path.display(), "removing stale unix socket");
            fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                path: display(),
                source,
            })
        }
        Err(source) => Err(ListenerError::UnixConnect {
            path: display(),
            source,
        }),
    }
}
