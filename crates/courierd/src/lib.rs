//! Daemon hosting a `courier_core` API over socket transports.
//!
//! Bootstrap loads [`courier_config::Config`], installs structured
//! telemetry, registers the built-in `system` service next to the
//! application's services, and attaches three endpoints:
//!
//! - a line-oriented console for operators (`[<service>] <method> [args...]`);
//! - a framed endpoint carrying length-prefixed MessagePack request envelopes;
//! - an HTTP endpoint mapping `/<service>/<method>` form requests to calls.
//!
//! Every endpoint accepts TCP or Unix domain sockets. The console and framed
//! endpoints serve each connection on its own thread with its own session;
//! HTTP sessions come from a pluggable [`SessionResolver`]. Lifecycle events flow through a
//! [`HealthReporter`], which defaults to structured `tracing` output.
//!
//! Embedding applications build an [`courier_core::Api`] and hand it to
//! [`run_daemon_with_api`], or drive [`bootstrap_with`] and [`Daemon`]
//! directly when they own the shutdown policy.

mod bootstrap;
mod console;
mod endpoint;
mod framed;
mod health;
mod http;
mod process;
pub mod services;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    bootstrap_with_resolver,
};
pub use endpoint::{BoundAddress, ListenerEndpoint};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use http::{FreshSessionResolver, HttpEndpoint, SessionResolver};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
    run_daemon_with, run_daemon_with_api,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
