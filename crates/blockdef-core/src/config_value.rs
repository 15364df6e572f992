//! Desired-configuration trees with unknown leaves.
//!
//! The declarative engine hands over desired configuration where any value
//! may still be unknown. [`ConfigValue`] mirrors JSON plus an `Unknown`
//! variant; an unknown anywhere in a subtree makes that subtree not fully
//! known, and it cannot be converted to plain JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::knowable::{is_unknown_marker, Knowable, UNKNOWN_MARKER};

/// A configuration value whose leaves are tagged known or unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
    Unknown,
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::Map(BTreeMap::new())
    }
}

impl ConfigValue {
    /// Build from JSON, treating `{"$unknown": true}` objects as unknown.
    pub fn from_json(value: &Value) -> Self {
        if is_unknown_marker(value) {
            return ConfigValue::Unknown;
        }
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(*b),
            Value::Number(n) => ConfigValue::Number(n.clone()),
            Value::String(s) => ConfigValue::String(s.clone()),
            Value::Array(items) => ConfigValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => ConfigValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to plain JSON. `None` if any leaf is unknown.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ConfigValue::Null => Some(Value::Null),
            ConfigValue::Bool(b) => Some(Value::Bool(*b)),
            ConfigValue::Number(n) => Some(Value::Number(n.clone())),
            ConfigValue::String(s) => Some(Value::String(s.clone())),
            ConfigValue::List(items) => items
                .iter()
                .map(Self::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            ConfigValue::Map(map) => map
                .iter()
                .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            ConfigValue::Unknown => None,
        }
    }

    /// JSON rendering that keeps unknown leaves as `{"$unknown": true}`.
    pub fn to_tagged_json(&self) -> Value {
        match self {
            ConfigValue::Unknown => {
                let mut marker = serde_json::Map::new();
                marker.insert(UNKNOWN_MARKER.to_string(), Value::Bool(true));
                Value::Object(marker)
            }
            ConfigValue::List(items) => {
                Value::Array(items.iter().map(Self::to_tagged_json).collect())
            }
            ConfigValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_tagged_json()))
                    .collect(),
            ),
            other => other.to_json().unwrap_or(Value::Null),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ConfigValue::Unknown)
    }

    /// True when no leaf anywhere in the tree is unknown.
    pub fn is_fully_known(&self) -> bool {
        match self {
            ConfigValue::Unknown => false,
            ConfigValue::List(items) => items.iter().all(Self::is_fully_known),
            ConfigValue::Map(map) => map.values().all(Self::is_fully_known),
            _ => true,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Copy of this value with `key` removed (only meaningful for maps).
    pub fn without_key(&self, key: &str) -> ConfigValue {
        match self {
            ConfigValue::Map(map) => {
                let mut map = map.clone();
                map.remove(key);
                ConfigValue::Map(map)
            }
            other => other.clone(),
        }
    }

    /// Read a boolean leaf as a [`Knowable`]. Absent or null reads as `default`.
    pub fn knowable_bool(&self, key: &str, default: bool) -> Option<Knowable<bool>> {
        match self.get(key) {
            None | Some(ConfigValue::Null) => Some(Knowable::Known(default)),
            Some(ConfigValue::Bool(b)) => Some(Knowable::Known(*b)),
            Some(ConfigValue::Unknown) => Some(Knowable::Unknown),
            Some(_) => None,
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        ConfigValue::from_json(&value)
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tagged_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ConfigValue::from_json(&value))
    }
}
