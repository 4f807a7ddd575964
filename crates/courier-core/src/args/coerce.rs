//! Coercion of loosely typed values into typed call arguments.

use std::fmt;

use serde_json::Value;

use super::{ArgumentKind, ArgumentSpec};
use crate::value::{ApiData, ArgValue, CallArgs};

/// Exclusive magnitude bound of `i64` as a float (2^63).
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
/// Exclusive upper bound of `u64` as a float (2^64).
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Why a single value could not be coerced.
enum Rejection {
    /// The representation does not fit the kind.
    Invalid,
    /// A nested map failed its own validation.
    Nested(Vec<String>),
}

/// Coerces `raw` against `spec`, collecting every failure.
///
/// Arguments are processed in specification order. A missing required
/// argument, a mistyped value, or a failing nested map each add to the error
/// list and validation carries on with the next argument. Nested failures are
/// reported one per failing leaf, prefixed with `In <name>: `.
///
/// # Errors
///
/// Returns the ordered error messages when any argument fails. No partial
/// arguments are returned in that case.
pub fn parse(spec: &[ArgumentSpec], raw: &ApiData) -> Result<CallArgs, Vec<String>> {
    let mut args = CallArgs::new();
    let mut errors = Vec::new();

    for arg in spec {
        let Some(given) = raw.get(arg.name()) else {
            if let Some(default) = arg.default() {
                args.insert(arg.name(), default.clone());
            } else if arg.is_required() {
                errors.push(format!("Missing argument: {} ({})", arg.name(), arg.kind()));
            }
            continue;
        };

        match coerce(arg.kind(), given) {
            Ok(value) => args.insert(arg.name(), value),
            Err(Rejection::Invalid) => errors.push(format!(
                "Invalid value for {} (expected {}): {}",
                arg.name(),
                arg.kind(),
                Shown(given)
            )),
            Err(Rejection::Nested(child_errors)) => errors.extend(
                child_errors
                    .into_iter()
                    .map(|error| format!("In {}: {error}", arg.name())),
            ),
        }
    }

    if errors.is_empty() {
        Ok(args)
    } else {
        Err(errors)
    }
}

fn coerce(kind: &ArgumentKind, value: &Value) -> Result<ArgValue, Rejection> {
    match kind {
        ArgumentKind::Int => coerce_int(value).map(ArgValue::Int).ok_or(Rejection::Invalid),
        ArgumentKind::UInt => coerce_uint(value)
            .map(ArgValue::UInt)
            .ok_or(Rejection::Invalid),
        ArgumentKind::Float => coerce_float(value)
            .map(ArgValue::Float)
            .ok_or(Rejection::Invalid),
        ArgumentKind::String => match value {
            Value::String(text) => Ok(ArgValue::String(text.clone())),
            _ => Err(Rejection::Invalid),
        },
        ArgumentKind::Nested(children) => match value {
            Value::Object(map) => parse(children, map)
                .map(ArgValue::Nested)
                .map_err(Rejection::Nested),
            _ => Err(Rejection::Invalid),
        },
        ArgumentKind::Raw => Ok(ArgValue::Raw(value.clone())),
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) if number.is_f64() => number.as_f64().and_then(truncate_to_i64),
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn coerce_uint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) if number.is_f64() => number.as_f64().and_then(truncate_to_u64),
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) if number.is_f64() => number.as_f64(),
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is finite and range-checked before the cast"
)]
fn truncate_to_i64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    (truncated.is_finite() && (-I64_BOUND..I64_BOUND).contains(&truncated))
        .then(|| truncated as i64)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is finite, non-negative and range-checked before the cast"
)]
fn truncate_to_u64(value: f64) -> Option<u64> {
    // Negative inputs are rejected even when they truncate to zero.
    if value < 0.0 {
        return None;
    }
    let truncated = value.trunc();
    (truncated.is_finite() && truncated < U64_BOUND).then(|| truncated as u64)
}

/// Renders a raw value for error messages; strings appear without quotes.
struct Shown<'a>(&'a Value);

impl fmt::Display for Shown<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(text) => formatter.write_str(text),
            other => write!(formatter, "{other}"),
        }
    }
}
