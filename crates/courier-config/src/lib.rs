//! Layered configuration for the courier daemon.
//!
//! [`Config`] is assembled by `ortho_config` from, in increasing precedence:
//! built-in defaults, a TOML file named by `--config-path` or
//! `COURIER_CONFIG_PATH`, `COURIER_*` environment variables, and command-line
//! flags such as `--console-socket tcp://0.0.0.0:4900` or
//! `--http-socket tcp://127.0.0.1:8080`.
//!
//! Load it through the derived [`OrthoConfig`] trait:
//!
//! ```no_run
//! use courier_config::{Config, OrthoConfig};
//!
//! let config = Config::load().expect("configuration loads");
//! config.validate().expect("configuration is coherent");
//! ```

mod defaults;
mod logging;
mod socket;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CONSOLE_PORT, DEFAULT_FRAMED_PORT, DEFAULT_HTTP_PORT, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_FRAME_BYTES, default_console_socket, default_framed_socket, default_http_socket,
    default_log_filter, default_log_filter_string, default_log_format, default_max_frame_bytes,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use ortho_config::{OrthoConfig, OrthoError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct Config {
    /// Socket of the line-oriented console endpoint.
    #[serde(default = "default_console_socket")]
    pub console_socket: SocketEndpoint,
    /// Socket of the length-prefixed binary endpoint.
    #[serde(default = "default_framed_socket")]
    pub framed_socket: SocketEndpoint,
    /// Socket of the HTTP form endpoint.
    #[serde(default = "default_http_socket")]
    pub http_socket: SocketEndpoint,
    /// `tracing` filter directive, e.g. `info` or `courier_core=debug`.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Largest framed message accepted, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            console_socket: default_console_socket(),
            framed_socket: default_framed_socket(),
            http_socket: default_http_socket(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Config {
    /// Console endpoint address.
    #[must_use]
    pub const fn console_socket(&self) -> &SocketEndpoint {
        &self.console_socket
    }

    /// Framed endpoint address.
    #[must_use]
    pub const fn framed_socket(&self) -> &SocketEndpoint {
        &self.framed_socket
    }

    /// HTTP endpoint address.
    #[must_use]
    pub const fn http_socket(&self) -> &SocketEndpoint {
        &self.http_socket
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Frame size limit.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> u32 {
        self.max_frame_bytes
    }

    /// Checks constraints the individual fields cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the frame limit is zero or two
    /// endpoints share one socket.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroFrameLimit);
        }
        let sockets = [
            ("console", &self.console_socket),
            ("framed", &self.framed_socket),
            ("http", &self.http_socket),
        ];
        for (index, &(first, socket)) in sockets.iter().enumerate() {
            // Port 0 asks the OS for a fresh port, so repeats cannot collide.
            if matches!(socket, SocketEndpoint::Tcp { port: 0, .. }) {
                continue;
            }
            if let Some(&(second, _)) = sockets[index + 1..]
                .iter()
                .find(|(_, other)| *other == socket)
            {
                return Err(ConfigError::SharedSocket {
                    first,
                    second,
                    endpoint: socket.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Semantic configuration errors detected after loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_frame_bytes` was set to zero.
    #[error("max_frame_bytes must be greater than zero")]
    ZeroFrameLimit,
    /// Two endpoints were configured on the same socket.
    #[error("{first} and {second} endpoints cannot share socket {endpoint}")]
    SharedSocket {
        /// Endpoint listed first.
        first: &'static str,
        /// Endpoint listed second.
        second: &'static str,
        /// The shared socket.
        endpoint: SocketEndpoint,
    },
}
