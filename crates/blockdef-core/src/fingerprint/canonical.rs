//! Canonical tree for content fingerprints.
//!
//! Payloads are first encoded to `serde_json::Value` and then lowered into
//! a [`CanonicalNode`]:
//! - object keys ordered by byte value (`BTreeMap`)
//! - integers kept exact over the whole `i64`/`u64` range; integer-valued
//!   floats become integers so `30.0` and `30` agree; NaN/Infinity rejected
//! - map entries holding a default value (null, `""`, `false`, `0`, `[]`, `{}`)
//!   dropped, so omitted and defaulted fields hash the same
//! - excluded keys dropped wherever they appear

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::FingerprintConfig;
use crate::domain::error::{BlockDefError, Result};

/// A node of the canonical payload tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalNode {
    /// Only survives as a list element; map entries holding null are dropped.
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<CanonicalNode>),
    Map(BTreeMap<String, CanonicalNode>),
}

impl CanonicalNode {
    /// True for the zero value of each kind.
    pub fn is_default(&self) -> bool {
        match self {
            CanonicalNode::Null => true,
            CanonicalNode::Bool(b) => !*b,
            CanonicalNode::Number(n) => n.as_f64() == Some(0.0),
            CanonicalNode::String(s) => s.is_empty(),
            CanonicalNode::List(items) => items.is_empty(),
            CanonicalNode::Map(map) => map.is_empty(),
        }
    }

    /// Walk the tree depth-first, reporting every map entry and leaf.
    pub fn walk<V: NodeVisitor>(&self, visitor: &mut V) -> std::result::Result<(), V::Error> {
        self.walk_at("", visitor)
    }

    fn walk_at<V: NodeVisitor>(
        &self,
        path: &str,
        visitor: &mut V,
    ) -> std::result::Result<(), V::Error> {
        match self {
            CanonicalNode::Map(map) => {
                for (key, value) in map {
                    let child = key_path(path, key);
                    visitor.visit_entry(&child, key, value)?;
                    value.walk_at(&child, visitor)?;
                }
                Ok(())
            }
            CanonicalNode::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.walk_at(&index_path(path, i), visitor)?;
                }
                Ok(())
            }
            leaf => visitor.visit_leaf(path, leaf),
        }
    }
}

/// Typed visitor over a [`CanonicalNode`] tree.
///
/// Paths use dotted keys and bracketed indices: `inputs[0].name`.
pub trait NodeVisitor {
    type Error;

    /// Called for every map entry before descending into its value.
    fn visit_entry(
        &mut self,
        _path: &str,
        _key: &str,
        _value: &CanonicalNode,
    ) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Called for every scalar.
    fn visit_leaf(
        &mut self,
        _path: &str,
        _node: &CanonicalNode,
    ) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Rejects denylisted keys. Entries present in a canonical tree are
/// non-empty by construction.
pub struct DenylistVisitor<'a> {
    config: &'a FingerprintConfig,
}

impl<'a> DenylistVisitor<'a> {
    pub fn new(config: &'a FingerprintConfig) -> Self {
        Self { config }
    }
}

impl NodeVisitor for DenylistVisitor<'_> {
    type Error = BlockDefError;

    fn visit_entry(&mut self, path: &str, key: &str, _value: &CanonicalNode) -> Result<()> {
        if self.config.is_denied(key) {
            return Err(BlockDefError::DisallowedKey {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Lower a JSON value into canonical form.
pub fn canonicalize(value: &Value, config: &FingerprintConfig) -> Result<CanonicalNode> {
    lower(value, "", config)
}

fn lower(value: &Value, path: &str, config: &FingerprintConfig) -> Result<CanonicalNode> {
    match value {
        Value::Null => Ok(CanonicalNode::Null),
        Value::Bool(b) => Ok(CanonicalNode::Bool(*b)),
        Value::Number(n) => normalize_number(n)
            .map(CanonicalNode::Number)
            .ok_or_else(|| BlockDefError::NonFiniteNumber {
                path: path.to_string(),
            }),
        Value::String(s) => Ok(CanonicalNode::String(s.clone())),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| lower(item, &index_path(path, i), config))
            .collect::<Result<Vec<_>>>()
            .map(CanonicalNode::List),
        Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (key, value) in map {
                if config.is_excluded(key) {
                    continue;
                }
                let node = lower(value, &key_path(path, key), config)?;
                if !node.is_default() {
                    out.insert(key.clone(), node);
                }
            }
            Ok(CanonicalNode::Map(out))
        }
    }
}

fn normalize_number(n: &serde_json::Number) -> Option<serde_json::Number> {
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    let f = n.as_f64().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(serde_json::Number::from(f as i64))
    } else {
        serde_json::Number::from_f64(f)
    }
}

impl Serialize for CanonicalNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CanonicalNode::Null => serializer.serialize_unit(),
            CanonicalNode::Bool(b) => serializer.serialize_bool(*b),
            CanonicalNode::Number(n) => n.serialize(serializer),
            CanonicalNode::String(s) => serializer.serialize_str(s),
            CanonicalNode::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            CanonicalNode::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}
