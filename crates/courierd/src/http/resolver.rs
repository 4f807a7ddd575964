//! Session lookup for HTTP requests.

use std::sync::Arc;

use axum::http::HeaderMap;

use courier_core::{DetachedConnection, ServerContext, Session};

/// Chooses the session an HTTP request runs under.
///
/// HTTP has no persistent connection, so sessions resolved here are backed
/// by a [`DetachedConnection`]: handlers can read and set the user but
/// cannot push messages. Implementations that track sessions across
/// requests (by cookie or bearer token) return the same session for every
/// request carrying the same credential.
pub trait SessionResolver: Send + Sync {
    /// Returns the session for a request with the given headers.
    fn resolve(&self, headers: &HeaderMap, context: &ServerContext) -> Arc<dyn Session>;
}

/// Resolver giving every request a fresh session from the context's factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreshSessionResolver;

impl SessionResolver for FreshSessionResolver {
    fn resolve(&self, _headers: &HeaderMap, context: &ServerContext) -> Arc<dyn Session> {
        context.create_session(Arc::new(DetachedConnection))
    }
}
