//! Transport-agnostic sessions.
//!
//! Every transport creates one [`Session`] per logical connection through the
//! [`SessionFactory`] held by the [`crate::ServerContext`]. A session carries a
//! stable identity, an optional authenticated [`User`], and a send path back
//! to the connection that created it. The user and the send path sit behind a
//! single lock because a session can be touched by an inbound request and a
//! server-initiated push at the same time.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Authenticated principal attached to a session.
pub trait User: Send + Sync {
    /// Stable identifier.
    fn id(&self) -> &str;

    /// Human-readable name for logs and replies.
    fn display_name(&self) -> &str;
}

/// Plain [`User`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicUser {
    id: String,
    display_name: String,
}

impl BasicUser {
    /// Builds a user from its identifier and display name.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl User for BasicUser {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Write path back into the transport connection owning a session.
pub trait SessionConnection: Send + Sync {
    /// Writes one transport-framed message.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the connection cannot be written.
    fn send(&self, payload: &[u8]) -> io::Result<()>;

    /// Short description of the peer, used in logs.
    fn describe(&self) -> String {
        String::from("connection")
    }
}

/// Connection for request/response transports with no push path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedConnection;

impl SessionConnection for DetachedConnection {
    fn send(&self, _payload: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "connection has no send path",
        ))
    }

    fn describe(&self) -> String {
        String::from("detached")
    }
}

/// Errors raised while using a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Writing to the owning connection failed.
    #[error("failed to send on session {session}: {source}")]
    Send {
        /// Session identifier.
        session: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Per-connection identity, user and send capability.
pub trait Session: Send + Sync {
    /// Identifier assigned at construction; never changes.
    fn id(&self) -> &str;

    /// Currently attached user, if any.
    fn user(&self) -> Option<Arc<dyn User>>;

    /// Attaches a user to the session, replacing any earlier one.
    fn set_user(&self, user: Arc<dyn User>);

    /// Attaches `user` only when the session has no user yet.
    ///
    /// Returns `false` and leaves the session untouched otherwise.
    fn claim_user(&self, user: Arc<dyn User>) -> bool {
        if self.user().is_some() {
            return false;
        }
        self.set_user(user);
        true
    }

    /// Sends a message through the owning connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] when the connection rejects the write.
    fn send(&self, payload: &[u8]) -> Result<(), SessionError>;
}

struct SessionState {
    user: Option<Arc<dyn User>>,
    connection: Arc<dyn SessionConnection>,
}

/// Default session backed by a UUID identity and a single mutex.
pub struct BasicSession {
    id: String,
    state: Mutex<SessionState>,
}

impl BasicSession {
    /// Creates a session with a fresh random identifier.
    #[must_use]
    pub fn new(connection: Arc<dyn SessionConnection>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), connection)
    }

    /// Creates a session with a caller-chosen identifier.
    #[must_use]
    pub fn with_id(id: impl Into<String>, connection: Arc<dyn SessionConnection>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(SessionState {
                user: None,
                connection,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // A panic while holding the lock cannot leave the user or connection
        // half-written, so the poisoned state is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Session for BasicSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn user(&self) -> Option<Arc<dyn User>> {
        self.state().user.clone()
    }

    fn set_user(&self, user: Arc<dyn User>) {
        info!(
            target: SESSION_TARGET,
            session = %self.id,
            user = user.display_name(),
            "session login"
        );
        self.state().user = Some(user);
    }

    fn claim_user(&self, user: Arc<dyn User>) -> bool {
        let mut state = self.state();
        if state.user.is_some() {
            return false;
        }
        info!(
            target: SESSION_TARGET,
            session = %self.id,
            user = user.display_name(),
            "session login"
        );
        state.user = Some(user);
        true
    }

    fn send(&self, payload: &[u8]) -> Result<(), SessionError> {
        let state = self.state();
        state
            .connection
            .send(payload)
            .map_err(|source| SessionError::Send {
                session: self.id.clone(),
                source,
            })
    }
}

impl fmt::Debug for BasicSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        formatter
            .debug_struct("BasicSession")
            .field("id", &self.id)
            .field("user", &state.user.as_ref().map(|user| user.id().to_owned()))
            .field("connection", &state.connection.describe())
            .finish()
    }
}

/// Creates sessions for new transport connections.
pub trait SessionFactory: Send + Sync {
    /// Builds the session for one logical connection.
    fn create(&self, connection: Arc<dyn SessionConnection>) -> Arc<dyn Session>;
}

impl<F> SessionFactory for F
where
    F: Fn(Arc<dyn SessionConnection>) -> Arc<dyn Session> + Send + Sync,
{
    fn create(&self, connection: Arc<dyn SessionConnection>) -> Arc<dyn Session> {
        self(connection)
    }
}

/// Factory producing [`BasicSession`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicSessionFactory;

impl SessionFactory for BasicSessionFactory {
    fn create(&self, connection: Arc<dyn SessionConnection>) -> Arc<dyn Session> {
        let peer = connection.describe();
        let session = BasicSession::new(connection);
        debug!(
            target: SESSION_TARGET,
            session = session.id(),
            peer = %peer,
            "session created"
        );
        Arc::new(session)
    }
}
