//! Transport-agnostic RPC core.
//!
//! Applications register named services, each exposing named methods with a
//! declarative argument specification. Transports decode their wire format
//! into [`ApiData`], create one [`Session`] per connection, and hand every
//! call to the router through a shared [`ServerContext`]. The router resolves
//! the target, coerces the payload against the method's specification, and
//! either reports every validation failure or invokes the handler.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use courier_core::{
//!     Api, ArgumentKind, ArgumentSpec, BasicSession, DetachedConnection, HandlerReply,
//!     ServerContext, Service,
//! };
//!
//! let mut greeter = Service::new("greeter");
//! greeter
//!     .add_method(
//!         "hello",
//!         vec![ArgumentSpec::required("name", ArgumentKind::String)],
//!         |args, _session, _context| {
//!             let mut data = courier_core::ApiData::new();
//!             data.insert("greeting".into(), format!("hello {}", args.str("name").unwrap_or("?")).into());
//!             HandlerReply::success(data)
//!         },
//!     )
//!     .expect("valid method");
//!
//! let mut api = Api::new();
//! api.add_service(greeter).expect("valid service");
//! let context = ServerContext::with_basic_sessions(api);
//! let session = BasicSession::new(Arc::new(DetachedConnection));
//! let reply = context.handle_positional("greeter", "hello", &["ada"], &session);
//! assert!(reply.ok);
//! ```

pub mod args;
pub mod context;
pub mod registry;
pub mod router;
pub mod session;
pub mod value;

pub use args::{ArgumentKind, ArgumentSpec, SpecError, parse, positional_args, validate_spec};
pub use context::{BoxedEndpointError, Endpoint, EndpointError, Server, ServerContext};
pub use registry::{HandlerReply, MethodDescriptor, MethodHandler, RegistrationError, Service};
pub use router::{ARGS_KEY, Api, CallResponse, ID_KEY, TARGET_KEY};
pub use session::{
    BasicSession, BasicSessionFactory, BasicUser, DetachedConnection, Session, SessionConnection,
    SessionError, SessionFactory, User,
};
pub use value::{ApiData, ArgValue, CallArgs};

#[cfg(test)]
mod tests;
