//! Services and their method tables.
//!
//! Registration happens once during composition, before any transport starts
//! serving. After that a [`Service`] is only read, so lookups take no locks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::args::{ArgumentSpec, SpecError, validate_spec};
use crate::context::ServerContext;
use crate::session::Session;
use crate::value::{ApiData, CallArgs};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Outcome reported by a method handler.
///
/// The router forwards both fields verbatim; it never interprets `data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerReply {
    /// Whether the business operation succeeded.
    pub ok: bool,
    /// Result or error payload chosen by the handler.
    pub data: ApiData,
}

impl HandlerReply {
    /// Successful reply carrying `data`.
    #[must_use]
    pub const fn success(data: ApiData) -> Self {
        Self { ok: true, data }
    }

    /// Failed reply carrying `data`.
    #[must_use]
    pub const fn failure(data: ApiData) -> Self {
        Self { ok: false, data }
    }

    /// Failed reply with a single `error` message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let mut data = ApiData::new();
        data.insert("error".to_owned(), Value::String(message.into()));
        Self::failure(data)
    }
}

/// Business logic behind a method.
pub trait MethodHandler: Send + Sync {
    /// Runs the method with validated arguments.
    fn call(
        &self,
        args: CallArgs,
        session: &dyn Session,
        context: &ServerContext,
    ) -> HandlerReply;
}

impl<F> MethodHandler for F
where
    F: Fn(CallArgs, &dyn Session, &ServerContext) -> HandlerReply + Send + Sync,
{
    fn call(
        &self,
        args: CallArgs,
        session: &dyn Session,
        context: &ServerContext,
    ) -> HandlerReply {
        self(args, session, context)
    }
}

/// A registered method: name, argument specification and handler.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    arg_spec: Vec<ArgumentSpec>,
    handler: Arc<dyn MethodHandler>,
}

impl MethodDescriptor {
    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered argument specification.
    #[must_use]
    pub fn arg_spec(&self) -> &[ArgumentSpec] {
        &self.arg_spec
    }

    /// Invokes the handler.
    #[must_use]
    pub fn invoke(
        &self,
        args: CallArgs,
        session: &dyn Session,
        context: &ServerContext,
    ) -> HandlerReply {
        self.handler.call(args, session, context)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("arg_spec", &self.arg_spec)
            .finish_non_exhaustive()
    }
}

/// Startup-time registration failures.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Service names must be usable as the first segment of a call target.
    #[error("invalid service name '{name}': names must be non-empty without '/' or whitespace")]
    InvalidServiceName {
        /// Rejected name.
        name: String,
    },
    /// Method names must be a single console token.
    #[error("invalid method name '{name}' in service '{service}'")]
    InvalidMethodName {
        /// Owning service.
        service: String,
        /// Rejected name.
        name: String,
    },
    /// The argument specification is malformed.
    #[error("invalid argument specification for {service}/{method}: {source}")]
    InvalidSpec {
        /// Owning service.
        service: String,
        /// Method being registered.
        method: String,
        /// Underlying specification problem.
        #[source]
        source: SpecError,
    },
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.chars().any(char::is_whitespace)
}

/// Named collection of methods.
///
/// Methods keep their registration order for listings. Registering a name
/// twice replaces the earlier method in place.
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    methods: Vec<MethodDescriptor>,
    index: HashMap<String, usize>,
}

impl Service {
    /// Creates an empty service.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a closure as a method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the method name or argument
    /// specification is malformed.
    pub fn add_method<F>(
        &mut self,
        name: impl Into<String>,
        arg_spec: Vec<ArgumentSpec>,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(CallArgs, &dyn Session, &ServerContext) -> HandlerReply + Send + Sync + 'static,
    {
        self.add_handler(name, arg_spec, Arc::new(handler))
    }

    /// Registers a shared handler as a method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the method name or argument
    /// specification is malformed.
    pub fn add_handler(
        &mut self,
        name: impl Into<String>,
        arg_spec: Vec<ArgumentSpec>,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(RegistrationError::InvalidMethodName {
                service: self.name.clone(),
                name,
            });
        }
        if let Err(source) = validate_spec(&arg_spec) {
            return Err(RegistrationError::InvalidSpec {
                service: self.name.clone(),
                method: name,
                source,
            });
        }

        let descriptor = MethodDescriptor {
            name: name.clone(),
            arg_spec,
            handler,
        };
        if let Some(&position) = self.index.get(&name) {
            warn!(
                target: REGISTRY_TARGET,
                service = %self.name,
                method = %name,
                "method registered twice; replacing earlier handler"
            );
            if let Some(slot) = self.methods.get_mut(position) {
                *slot = descriptor;
            }
        } else {
            self.index.insert(name, self.methods.len());
            self.methods.push(descriptor);
        }
        Ok(())
    }

    /// Methods in registration order.
    #[must_use]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Method names in registration order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(MethodDescriptor::name)
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.index
            .get(name)
            .and_then(|&position| self.methods.get(position))
    }
}
