//! Reserved keys and decoding of enveloped requests.

use std::borrow::Cow;

use serde_json::Value;

use crate::value::ApiData;

/// Key holding the `<service>/<method>` call target.
pub const TARGET_KEY: &str = "target";
/// Key holding the named-argument map.
pub const ARGS_KEY: &str = "args";
/// Key holding the optional correlation id.
pub const ID_KEY: &str = "id";

/// Borrowed view of a well-formed envelope.
pub(super) struct Envelope<'a> {
    pub(super) service: &'a str,
    pub(super) method: &'a str,
    pub(super) args: Cow<'a, ApiData>,
}

impl<'a> Envelope<'a> {
    /// Extracts target and arguments; the error is a user-facing message.
    pub(super) fn from_payload(payload: &'a ApiData) -> Result<Self, String> {
        let target = match payload.get(TARGET_KEY) {
            Some(Value::String(target)) => target,
            Some(_) => return Err(String::from("Invalid request target: expected a string")),
            None => return Err(String::from("Missing request target")),
        };
        let Some((service, method)) = target.split_once('/') else {
            return Err(format!(
                "Invalid request target '{target}': expected '<service>/<method>'"
            ));
        };

        let args = match payload.get(ARGS_KEY) {
            Some(Value::Object(args)) => Cow::Borrowed(args),
            None | Some(Value::Null) => Cow::Owned(ApiData::new()),
            Some(_) => return Err(String::from("Invalid request arguments: expected a map")),
        };

        Ok(Self {
            service,
            method,
            args,
        })
    }
}
