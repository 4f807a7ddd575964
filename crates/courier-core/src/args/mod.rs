//! Declarative argument specifications and the coercion engine.
//!
//! A method declares an ordered sequence of [`ArgumentSpec`]s. At call time
//! [`parse`] coerces a loosely typed payload against that sequence and either
//! yields fully typed [`crate::CallArgs`] or every validation failure at once.
//! Transports that only carry positional tokens go through
//! [`positional_args`] first so they share the same validation path.
//!
//! Specifications are checked when a method is registered
//! ([`validate_spec`]); a malformed spec is a startup error, never a per-call
//! one.

mod coerce;
mod positional;

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::value::ArgValue;

pub use self::coerce::parse;
pub use self::positional::positional_args;

/// Expected representation of an argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentKind {
    /// Signed integer; accepts integers, truncated floats and decimal strings.
    Int,
    /// Non-negative integer; same sources as [`Self::Int`].
    UInt,
    /// Floating-point number; accepts float representations only.
    Float,
    /// String; no stringification of other values.
    String,
    /// Nested map validated against its own ordered child specification.
    Nested(Vec<ArgumentSpec>),
    /// Any value, passed through unchanged.
    Raw,
}

impl ArgumentKind {
    /// Builds a nested kind from its child specifications.
    #[must_use]
    pub fn nested(children: impl IntoIterator<Item = ArgumentSpec>) -> Self {
        Self::Nested(children.into_iter().collect())
    }

    /// Returns the name used in help output and validation messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::String => "string",
            Self::Nested(_) => "nested",
            Self::Raw => "raw",
        }
    }

    fn accepts_default(&self, value: &ArgValue) -> bool {
        matches!(
            (self, value),
            (Self::Int, ArgValue::Int(_))
                | (Self::UInt, ArgValue::UInt(_))
                | (Self::Float, ArgValue::Float(_))
                | (Self::String, ArgValue::String(_))
                | (Self::Nested(_), ArgValue::Nested(_))
                | (Self::Raw, _)
        )
    }
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Description of one expected call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    name: String,
    kind: ArgumentKind,
    required: bool,
    default: Option<ArgValue>,
}

impl ArgumentSpec {
    /// Declares an argument that must be supplied unless it has a default.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    /// Declares an argument that is simply left out when not supplied.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
        }
    }

    /// Attaches a default used when the argument is absent.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<ArgValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Argument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expected kind.
    #[must_use]
    pub const fn kind(&self) -> &ArgumentKind {
        &self.kind
    }

    /// Whether absence is an error when no default exists.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Default value, if any.
    #[must_use]
    pub const fn default(&self) -> Option<&ArgValue> {
        self.default.as_ref()
    }
}

/// Problems found in an argument specification at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// An argument was declared without a name.
    #[error("argument {position} in '{scope}' has an empty name")]
    EmptyName {
        /// Enclosing argument path, or `<root>` for top-level arguments.
        scope: String,
        /// Zero-based position within the enclosing specification.
        position: usize,
    },
    /// Two arguments at the same level share a name.
    #[error("duplicate argument '{path}'")]
    Duplicate {
        /// Dotted path of the duplicated argument.
        path: String,
    },
    /// The default value does not match the declared kind.
    #[error("default for '{path}' is {found}, expected {expected}")]
    DefaultMismatch {
        /// Dotted path of the argument.
        path: String,
        /// Declared kind.
        expected: &'static str,
        /// Kind of the supplied default.
        found: &'static str,
    },
}

impl SpecError {
    fn empty_name(scope: Option<&str>, position: usize) -> Self {
        Self::EmptyName {
            scope: scope.unwrap_or("<root>").to_owned(),
            position,
        }
    }

    fn duplicate(path: impl Into<String>) -> Self {
        Self::Duplicate { path: path.into() }
    }

    fn default_mismatch(path: impl Into<String>, kind: &ArgumentKind, value: &ArgValue) -> Self {
        Self::DefaultMismatch {
            path: path.into(),
            expected: kind.name(),
            found: value.kind_name(),
        }
    }
}

/// Checks a specification for empty or duplicate names and mistyped defaults.
///
/// Nested specifications are checked recursively.
///
/// # Errors
///
/// Returns the first [`SpecError`] found, in declaration order.
pub fn validate_spec(spec: &[ArgumentSpec]) -> Result<(), SpecError> {
    validate_level(spec, None)
}

fn validate_level(spec: &[ArgumentSpec], scope: Option<&str>) -> Result<(), SpecError> {
    let mut seen = HashSet::new();
    for (position, arg) in spec.iter().enumerate() {
        if arg.name.trim().is_empty() {
            return Err(SpecError::empty_name(scope, position));
        }
        let path = match scope {
            Some(parent) => format!("{parent}.{}", arg.name),
            None => arg.name.clone(),
        };
        if !seen.insert(arg.name.as_str()) {
            return Err(SpecError::duplicate(path));
        }
        if let Some(default) = &arg.default
            && !arg.kind.accepts_default(default)
        {
            return Err(SpecError::default_mismatch(path, &arg.kind, default));
        }
        if let ArgumentKind::Nested(children) = &arg.kind {
            validate_level(children, Some(&path))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
