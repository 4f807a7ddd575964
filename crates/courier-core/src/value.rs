//! Payload and argument value types.
//!
//! Transports hand the core loosely typed [`ApiData`] maps decoded from their
//! own wire formats. The coercion engine turns those into [`CallArgs`], whose
//! entries are strictly typed [`ArgValue`]s, before a handler ever sees them.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde_json::{Map, Value};

/// String-keyed payload exchanged between transports, the router and handlers.
///
/// Values are primitives, nested maps, or sequences thereof, which keeps the
/// shape representable by every transport encoding.
pub type ApiData = Map<String, Value>;

/// A single coerced argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Structurally validated sub-arguments.
    Nested(CallArgs),
    /// Value passed through unchanged.
    Raw(Value),
}

impl ArgValue {
    /// Returns the kind name used in validation messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Nested(_) => "nested",
            Self::Raw(_) => "raw",
        }
    }

    /// Converts the typed value back into its loosely typed form.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Int(value) => Value::from(value),
            Self::UInt(value) => Value::from(value),
            Self::Float(value) => Value::from(value),
            Self::String(value) => Value::String(value),
            Self::Nested(args) => Value::Object(args.into_api_data()),
            Self::Raw(value) => value,
        }
    }
}

impl From<ArgValue> for Value {
    fn from(value: ArgValue) -> Self {
        value.into_value()
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<CallArgs> for ArgValue {
    fn from(value: CallArgs) -> Self {
        Self::Nested(value)
    }
}

/// Typed arguments produced for one invocation.
///
/// Built fresh by [`crate::parse`] for every call and handed to the handler by
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    entries: BTreeMap<String, ArgValue>,
}

impl CallArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an argument.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the raw entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries.get(name)
    }

    /// Returns `true` when an entry exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the signed integer stored under `name`.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ArgValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the unsigned integer stored under `name`.
    #[must_use]
    pub fn uint(&self, name: &str) -> Option<u64> {
        match self.get(name) {
            Some(ArgValue::UInt(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the float stored under `name`.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(ArgValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string stored under `name`.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the nested arguments stored under `name`.
    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&Self> {
        match self.get(name) {
            Some(ArgValue::Nested(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the untouched value stored under `name`.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        match self.get(name) {
            Some(ArgValue::Raw(value)) => Some(value),
            _ => None,
        }
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no arguments are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the arguments in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, ArgValue> {
        self.entries.iter()
    }

    /// Converts the arguments into a loosely typed payload.
    #[must_use]
    pub fn into_api_data(self) -> ApiData {
        self.entries
            .into_iter()
            .map(|(name, value)| (name, value.into_value()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a CallArgs {
    type Item = (&'a String, &'a ArgValue);
    type IntoIter = btree_map::Iter<'a, String, ArgValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
