//! Service routing and the dispatch protocol.
//!
//! [`Api`] owns every registered [`Service`] and exposes the entry points
//! transports call into:
//!
//! - [`Api::handle_call`]: addressed call naming service, method and a
//!   payload of named arguments.
//! - [`Api::handle_request`]: one self-describing envelope, optionally
//!   carrying a correlation id that is echoed in the reply.
//! - [`Api::handle_positional`]: whitespace-tokenised arguments mapped by
//!   position, then funnelled into [`Api::handle_call`].
//!
//! All three share one resolve → coerce → invoke path, so validation behaves
//! the same regardless of transport. The router keeps no per-call state.
//!
//! ## Envelope
//!
//! ```json
//! {"id": "abc123", "target": "accounts/create", "args": {"name": "ada"}}
//! ```
//!
//! The reply mirrors [`CallResponse`] and repeats `id` when one was sent:
//!
//! ```json
//! {"ok": true, "result": {"account": 7}, "id": "abc123"}
//! ```

mod envelope;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::args::{parse, positional_args};
use crate::context::ServerContext;
use crate::registry::{HandlerReply, RegistrationError, Service, is_valid_name};
use crate::session::Session;
use crate::value::ApiData;

pub use self::envelope::{ARGS_KEY, ID_KEY, TARGET_KEY};

/// Tracing target for dispatch events.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Structured result of a dispatched call.
///
/// Validation failures set `ok = false` and fill `errors`. Otherwise the
/// handler's own `ok` and payload are forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallResponse {
    /// Overall outcome.
    pub ok: bool,
    /// Validation failures, in the order they were found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Handler payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ApiData>,
}

impl CallResponse {
    /// Response for a call rejected before reaching its handler.
    #[must_use]
    pub const fn rejected(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            errors: Some(errors),
            result: None,
        }
    }

    /// Response forwarding a handler reply.
    #[must_use]
    pub fn from_reply(reply: HandlerReply) -> Self {
        Self {
            ok: reply.ok,
            errors: None,
            result: Some(reply.data),
        }
    }

    /// Converts the response into a reply payload.
    #[must_use]
    pub fn into_api_data(self) -> ApiData {
        let mut data = ApiData::new();
        data.insert("ok".to_owned(), Value::Bool(self.ok));
        if let Some(errors) = self.errors {
            data.insert(
                "errors".to_owned(),
                Value::Array(errors.into_iter().map(Value::String).collect()),
            );
        }
        if let Some(result) = self.result {
            data.insert("result".to_owned(), Value::Object(result));
        }
        data
    }
}

/// Registry of services and dispatcher for calls into them.
#[derive(Debug, Default, Clone)]
pub struct Api {
    services: Vec<Service>,
    index: HashMap<String, usize>,
}

impl Api {
    /// Creates an empty API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service.
    ///
    /// A service registered under an existing name replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidServiceName`] when the name cannot
    /// be addressed by a call target.
    pub fn add_service(&mut self, service: Service) -> Result<(), RegistrationError> {
        if !is_valid_name(service.name()) {
            return Err(RegistrationError::InvalidServiceName {
                name: service.name().to_owned(),
            });
        }

        if let Some(&position) = self.index.get(service.name()) {
            warn!(
                target: DISPATCH_TARGET,
                service = service.name(),
                "service registered twice; replacing earlier registration"
            );
            if let Some(slot) = self.services.get_mut(position) {
                *slot = service;
            }
        } else {
            self.index
                .insert(service.name().to_owned(), self.services.len());
            self.services.push(service);
        }
        Ok(())
    }

    /// Registered services in registration order.
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Looks up a service by name.
    #[must_use]
    pub fn find_service(&self, name: &str) -> Option<&Service> {
        self.index
            .get(name)
            .and_then(|&position| self.services.get(position))
    }

    /// Dispatches an addressed call.
    #[must_use]
    pub fn handle_call(
        &self,
        service_name: &str,
        method_name: &str,
        raw: &ApiData,
        session: &dyn Session,
        context: &ServerContext,
    ) -> CallResponse {
        debug!(
            target: DISPATCH_TARGET,
            service = service_name,
            method = method_name,
            session = session.id(),
            "dispatching call"
        );

        let Some(service) = self.find_service(service_name) else {
            debug!(target: DISPATCH_TARGET, service = service_name, "unknown service");
            return CallResponse::rejected(vec![String::from("Unknown service")]);
        };
        let Some(method) = service.find_method(method_name) else {
            debug!(
                target: DISPATCH_TARGET,
                service = service_name,
                method = method_name,
                "unknown method"
            );
            return CallResponse::rejected(vec![format!("Unknown method '{method_name}'")]);
        };

        match parse(method.arg_spec(), raw) {
            Ok(args) => CallResponse::from_reply(method.invoke(args, session, context)),
            Err(errors) => {
                debug!(
                    target: DISPATCH_TARGET,
                    service = service_name,
                    method = method_name,
                    error_count = errors.len(),
                    "argument validation failed"
                );
                CallResponse::rejected(errors)
            }
        }
    }

    /// Dispatches a call whose arguments arrive as positional tokens.
    ///
    /// Tokens are mapped onto the method's argument names in declaration
    /// order before the regular addressed-call path runs. Supplying more
    /// tokens than declared arguments is rejected before coercion.
    #[must_use]
    pub fn handle_positional<T: AsRef<str>>(
        &self,
        service_name: &str,
        method_name: &str,
        tokens: &[T],
        session: &dyn Session,
        context: &ServerContext,
    ) -> CallResponse {
        let Some(method) = self
            .find_service(service_name)
            .and_then(|service| service.find_method(method_name))
        else {
            return self.handle_call(service_name, method_name, &ApiData::new(), session, context);
        };

        match positional_args(method.arg_spec(), tokens) {
            Ok(raw) => self.handle_call(service_name, method_name, &raw, session, context),
            Err(message) => CallResponse::rejected(vec![message]),
        }
    }

    /// Dispatches an enveloped request and builds the reply envelope.
    ///
    /// The correlation id under [`ID_KEY`] is copied into the reply whatever
    /// the outcome, including malformed envelopes.
    #[must_use]
    pub fn handle_request(
        &self,
        payload: &ApiData,
        session: &dyn Session,
        context: &ServerContext,
    ) -> ApiData {
        let response = match envelope::Envelope::from_payload(payload) {
            Ok(envelope) => self.handle_call(
                envelope.service,
                envelope.method,
                &envelope.args,
                session,
                context,
            ),
            Err(message) => {
                debug!(target: DISPATCH_TARGET, error = %message, "malformed envelope");
                CallResponse::rejected(vec![message])
            }
        };

        let mut reply = response.into_api_data();
        if let Some(id) = payload.get(ID_KEY) {
            reply.insert(ID_KEY.to_owned(), id.clone());
        }
        reply
    }
}
