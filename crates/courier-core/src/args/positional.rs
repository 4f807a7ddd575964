//! Adapter from positional tokens to a named payload.

use serde_json::Value;

use super::ArgumentSpec;
use crate::value::ApiData;

/// Maps the Nth token to the Nth argument of `spec`.
///
/// Tokens become string values; typing is left to [`super::parse`]. Fewer
/// tokens than arguments is fine, the missing ones are handled like any absent
/// argument.
///
/// # Errors
///
/// Returns a user-facing message when more tokens than declared arguments are
/// supplied.
pub fn positional_args<T: AsRef<str>>(
    spec: &[ArgumentSpec],
    tokens: &[T],
) -> Result<ApiData, String> {
    if tokens.len() > spec.len() {
        return Err(format!(
            "Too many arguments (expected at most {}, got {})",
            spec.len(),
            tokens.len()
        ));
    }

    Ok(spec
        .iter()
        .zip(tokens)
        .map(|(arg, token)| (arg.name().to_owned(), Value::String(token.as_ref().to_owned())))
        .collect())
}
