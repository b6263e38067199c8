//! Request parameters collected from the query string, the matched path and
//! the parsed body.
//!
//! Values are tagged ([`ParamValue`]) and read through accessors that fail
//! with a [`ParamError`] instead of coercing. Every entry remembers the
//! [`ParamSource`] that wrote it; a write only replaces an existing entry when
//! its source ranks at least as high, which yields the fixed precedence
//! query < path < body < handler regardless of the order stages run in.

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Where a parameter came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamSource {
    Query,
    Path,
    Body,
    Handler,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
    Structured(serde_json::Value),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Text(_) => ParamKind::Text,
            ParamValue::List(_) => ParamKind::List,
            ParamValue::Structured(_) => ParamKind::Structured,
        }
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl From<serde_json::Value> for ParamValue {
    /// JSON strings become [`ParamValue::Text`], everything else stays structured.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => ParamValue::Text(s),
            other => ParamValue::Structured(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    List,
    Structured,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamKind::Text => "text",
            ParamKind::List => "list",
            ParamKind::Structured => "structured",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing parameter '{name}'")]
    Missing { name: String },

    #[error("parameter '{name}' is {found}, expected {expected}")]
    TypeMismatch { name: String, expected: ParamKind, found: ParamKind },

    #[error("parameter '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

impl ParamError {
    pub fn missing<S: ToString>(name: S) -> Self {
        Self::Missing { name: name.to_string() }
    }

    pub fn type_mismatch<S: ToString>(name: S, expected: ParamKind, found: ParamKind) -> Self {
        Self::TypeMismatch { name: name.to_string(), expected, found }
    }

    pub fn invalid<S: ToString, R: ToString>(name: S, reason: R) -> Self {
        Self::Invalid { name: name.to_string(), reason: reason.to_string() }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: ParamValue,
    source: ParamSource,
}

#[derive(Debug, Clone, Default)]
pub struct Params {
    inner: HashMap<String, Entry>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` under `name` unless an entry from a higher ranked source exists.
    ///
    /// Returns true if the value was stored.
    pub fn merge(&mut self, source: ParamSource, name: impl Into<String>, value: impl Into<ParamValue>) -> bool {
        let name = name.into();
        if let Some(existing) = self.inner.get(&name)
            && existing.source > source
        {
            return false;
        }

        self.inner.insert(name, Entry { value: value.into(), source });
        true
    }

    /// Writes with [`ParamSource::Handler`] precedence, overriding anything collected before.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.merge(ParamSource::Handler, name, value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.inner.get(name).map(|entry| &entry.value)
    }

    pub fn source(&self, name: &str) -> Option<ParamSource> {
        self.inner.get(name).map(|entry| entry.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.inner.iter().map(|(name, entry)| (name.as_str(), &entry.value))
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ParamError> {
        self.get(name).ok_or_else(|| ParamError::missing(name))
    }

    pub fn text(&self, name: &str) -> Result<&str, ParamError> {
        match self.require(name)? {
            ParamValue::Text(text) => Ok(text),
            other => Err(ParamError::type_mismatch(name, ParamKind::Text, other.kind())),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[String], ParamError> {
        match self.require(name)? {
            ParamValue::List(values) => Ok(values),
            other => Err(ParamError::type_mismatch(name, ParamKind::List, other.kind())),
        }
    }

    pub fn structured(&self, name: &str) -> Result<&serde_json::Value, ParamError> {
        match self.require(name)? {
            ParamValue::Structured(value) => Ok(value),
            other => Err(ParamError::type_mismatch(name, ParamKind::Structured, other.kind())),
        }
    }

    /// Parses a text parameter with [`FromStr`].
    ///
    /// # Example
    /// ```
    /// use micro_dispatch::params::Params;
    ///
    /// let mut params = Params::new();
    /// params.insert("id", "42");
    /// assert_eq!(params.parse::<u64>("id"), Ok(42));
    /// assert!(params.parse::<bool>("id").is_err());
    /// ```
    pub fn parse<T>(&self, name: &str) -> Result<T, ParamError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(name)?.parse::<T>().map_err(|e| ParamError::invalid(name, e))
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries = self.iter().collect::<Vec<_>>();
        entries.sort_unstable_by_key(|(name, _)| *name);

        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
