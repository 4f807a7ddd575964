#[cfg(unix)]
use std::env;

#[cfg(unix)]
use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port of the line-oriented console endpoint.
pub const DEFAULT_CONSOLE_PORT: u16 = 4900;

/// Default TCP port of the framed endpoint when Unix sockets are unavailable.
pub const DEFAULT_FRAMED_PORT: u16 = 4901;

/// Default TCP port of the HTTP form endpoint.
pub const DEFAULT_HTTP_PORT: u16 = 4902;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default upper bound for a single framed message.
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 1024 * 1024;

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default frame size limit.
#[must_use]
pub const fn default_max_frame_bytes() -> u32 {
    DEFAULT_MAX_FRAME_BYTES
}

/// Console endpoint, reachable with any line-oriented TCP client.
#[must_use]
pub fn default_console_socket() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_CONSOLE_PORT)
}

/// HTTP form endpoint, on loopback next to the console.
#[must_use]
pub fn default_http_socket() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_HTTP_PORT)
}

/// Framed endpoint socket, scoped to the current user.
#[must_use]
pub fn default_framed_socket() -> SocketEndpoint {
    default_framed_socket_inner()
}

#[cfg(unix)]
fn default_framed_socket_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("courier");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("courierd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_framed_socket_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_FRAMED_PORT)
}
