//! Version payload helpers.
//!
//! Payloads are opaque JSON objects. The engine only touches three kinds of
//! keys: version-control fields, secret references, and secret plaintext.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use super::version::VersionState;
use crate::fingerprint::canonical::{index_path, key_path};
use crate::config::{FingerprintConfig, PredictorConfig};
use crate::config_value::ConfigValue;

/// Copy of `payload` without top-level version-control fields.
pub fn strip_control_fields(payload: &Value, config: &FingerprintConfig) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !config.is_control_field(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Copy of `payload` with the plaintext removed from every secret node.
///
/// A secret node is any object carrying the configured secret reference key.
/// Plaintext outside secret nodes is left alone so the denylist can catch it.
pub fn strip_secret_plaintext(payload: &Value, config: &PredictorConfig) -> Value {
    match payload {
        Value::Object(map) => {
            let is_secret = map.contains_key(&config.secret_ref_key);
            Value::Object(
                map.iter()
                    .filter(|(k, _)| !(is_secret && **k == config.secret_plaintext_key))
                    .map(|(k, v)| (k.clone(), strip_secret_plaintext(v, config)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| strip_secret_plaintext(item, config))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// The exact value that gets fingerprinted for a version payload.
pub fn hashable_payload(payload: &Value, config: &PredictorConfig) -> Value {
    strip_secret_plaintext(
        &strip_control_fields(payload, &config.fingerprint),
        config,
    )
}

/// Payload as sent upstream: content plus the requested state and the
/// definition back-reference. The backend assigns `number`.
pub fn upstream_payload(content: &Value, state: VersionState, definition_id: Uuid) -> Value {
    let mut map = match content {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    map.insert("state".to_string(), Value::from(state.as_str()));
    map.insert("definition".to_string(), Value::from(definition_id.to_string()));
    Value::Object(map)
}

/// Secret material found at one secret node.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretMaterial {
    pub reference: ConfigValue,
    pub plaintext: Option<ConfigValue>,
}

/// Secret nodes in a configuration tree, keyed by their path.
pub fn collect_secrets(
    value: &ConfigValue,
    config: &PredictorConfig,
) -> BTreeMap<String, SecretMaterial> {
    let mut secrets = BTreeMap::new();
    collect_at(value, "", config, &mut secrets);
    secrets
}

fn collect_at(
    value: &ConfigValue,
    path: &str,
    config: &PredictorConfig,
    secrets: &mut BTreeMap<String, SecretMaterial>,
) {
    match value {
        ConfigValue::Map(map) => {
            if let Some(reference) = map.get(&config.secret_ref_key) {
                secrets.insert(
                    path.to_string(),
                    SecretMaterial {
                        reference: reference.clone(),
                        plaintext: map.get(&config.secret_plaintext_key).cloned(),
                    },
                );
            }
            for (key, child) in map {
                if *key != config.secret_ref_key {
                    collect_at(child, &key_path(path, key), config, secrets);
                }
            }
        }
        ConfigValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_at(item, &index_path(path, i), config, secrets);
            }
        }
        _ => {}
    }
}

/// Paths of secret nodes that `desired` rotates relative to `prior`.
///
/// A node rotates when its reference or plaintext is unknown, or differs
/// from the node at the same path in `prior`. Nodes new in `desired` do not.
pub fn secret_rotations(
    prior: &ConfigValue,
    desired: &ConfigValue,
    config: &PredictorConfig,
) -> Vec<String> {
    let prior_secrets = collect_secrets(prior, config);
    collect_secrets(desired, config)
        .into_iter()
        .filter(|(path, secret)| {
            let unknown = !secret.reference.is_fully_known()
                || secret
                    .plaintext
                    .as_ref()
                    .is_some_and(|plaintext| !plaintext.is_fully_known());
            unknown
                || prior_secrets
                    .get(path)
                    .is_some_and(|prior| prior != secret)
        })
        .map(|(path, _)| path)
        .collect()
}
