//! Key injection into an existing configuration
//!
//! Values are merged into the raw JSON object with top-level replace
//! semantics; the typed view is re-derived from the new bytes.

use super::{parse_conf, NetworkConfig};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Return a copy of `original` with `key` set to `new_value`
///
/// The raw bytes are re-serialized with sorted keys. Nested objects are
/// replaced as a whole, never merged.
///
/// # Errors
/// - `Error::Unmarshal` if the existing bytes are not a JSON object
/// - `Error::EmptyKey` if `key` is empty
/// - `Error::MissingValue` if `new_value` serializes to `null`
pub fn inject_conf<V: Serialize>(
    original: &NetworkConfig,
    key: &str,
    new_value: V,
) -> Result<NetworkConfig> {
    let mut config: Map<String, Value> =
        serde_json::from_slice(&original.bytes).map_err(Error::Unmarshal)?;

    if key.is_empty() {
        return Err(Error::EmptyKey);
    }

    let value = serde_json::to_value(new_value).map_err(|source| Error::Serialize {
        what: format!("value for key \"{}\"", key),
        source,
    })?;
    if value.is_null() {
        return Err(Error::MissingValue);
    }

    config.insert(key.to_string(), value);

    let bytes = serde_json::to_vec(&config).map_err(|source| Error::Serialize {
        what: "network configuration".to_string(),
        source,
    })?;
    parse_conf(bytes, "injected configuration")
}
