//! Configuration loaders for success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use courier_config::{Config, OrthoConfig, OrthoError, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader binding every endpoint to an ephemeral loopback port.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    max_frame_bytes: u32,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_bytes: courier_config::DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Lowers the framed endpoint's size limit.
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: u32) -> Self {
        Self { max_frame_bytes }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            console_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            framed_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            http_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            max_frame_bytes: self.max_frame_bytes,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid CLI socket.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("courierd"),
            OsString::from("--framed-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
