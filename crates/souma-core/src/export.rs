//! Canonical export: field selection, nested expansion and JSON encoding.
//!
//! Every entity exports to an [`ExportMap`], an insertion-ordered mapping
//! from field names to string values. The rules:
//!
//! - Fields come from the entity's default allow-list, then any `include`
//!   extras in caller order, minus anything in `exclude`.
//! - Scalars are strings. Timestamps use the canonical RFC 3339 form, states
//!   their integer code, absent optionals JSON `null`.
//! - Structural nested lists (a star's planets, a starmap's index) are always
//!   appended after the selected fields.
//! - Subtype payload fields (a picture's `filename`) follow the base fields.
//!
//! [`ExportMap::to_json`] writes compact JSON in map order. Those bytes are
//! what gets signed, so the encoding must never depend on hash ordering.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{CoreError, Result};
use crate::types::Timestamp;

/// A single exported value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportValue {
    Null,
    Text(String),
    List(Vec<ExportMap>),
}

impl ExportValue {
    /// Text value, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExportValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List value, if this is one.
    pub fn as_list(&self) -> Option<&[ExportMap]> {
        match self {
            ExportValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<String> for ExportValue {
    fn from(s: String) -> Self {
        ExportValue::Text(s)
    }
}

impl From<&str> for ExportValue {
    fn from(s: &str) -> Self {
        ExportValue::Text(s.to_string())
    }
}

impl From<Timestamp> for ExportValue {
    fn from(ts: Timestamp) -> Self {
        ExportValue::Text(ts.to_canonical())
    }
}

impl From<i64> for ExportValue {
    fn from(n: i64) -> Self {
        ExportValue::Text(n.to_string())
    }
}

impl<T: Into<ExportValue>> From<Option<T>> for ExportValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ExportValue::Null)
    }
}

impl From<Vec<ExportMap>> for ExportValue {
    fn from(items: Vec<ExportMap>) -> Self {
        ExportValue::List(items)
    }
}

impl Serialize for ExportValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ExportValue::Null => serializer.serialize_none(),
            ExportValue::Text(s) => serializer.serialize_str(s),
            ExportValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// An insertion-ordered export mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMap {
    entries: Vec<(String, ExportValue)>,
}

impl ExportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. An existing field keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ExportValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ExportValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ExportValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Shortcut for a text field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ExportValue::as_text)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<ExportValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical compact JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::Encoding(e.to_string()))
    }

    /// Canonical JSON as a string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::Encoding(e.to_string()))
    }
}

impl Serialize for ExportMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Per-call field selection. Always owned, never shared between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field beyond the defaults.
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.include.push(field.into());
        self
    }

    /// Drop a field.
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude.push(field.into());
        self
    }

    /// Resolve the final field list against an entity's defaults.
    pub fn select(&self, defaults: &[&str]) -> Vec<String> {
        let mut fields: Vec<String> = Vec::with_capacity(defaults.len() + self.include.len());
        let extra = self.include.iter().map(String::as_str);
        for name in defaults.iter().copied().chain(extra) {
            if self.exclude.iter().any(|e| e == name) || fields.iter().any(|f| f == name) {
                continue;
            }
            fields.push(name.to_string());
        }
        fields
    }
}

/// The export contract.
pub trait Export {
    /// Fields exported when the caller asks for nothing special.
    const DEFAULT_FIELDS: &'static [&'static str];

    /// Resolve a scalar field by name. `None` for unknown or non-exportable
    /// fields (private keys are never exportable).
    fn field(&self, name: &str) -> Option<ExportValue>;

    /// Append the structural fields that are always present.
    fn extend_export(&self, _map: &mut ExportMap) {}

    /// Build the export mapping.
    fn export(&self, options: &ExportOptions) -> ExportMap {
        let mut map = ExportMap::new();
        for name in options.select(Self::DEFAULT_FIELDS) {
            if let Some(value) = self.field(&name) {
                map.insert(name, value);
            }
        }
        self.extend_export(&mut map);
        map
    }

    /// Canonical JSON bytes of [`Export::export`].
    fn json(&self, options: &ExportOptions) -> Result<Vec<u8>> {
        self.export(options).to_json()
    }
}
