//! Network configuration model
//!
//! Provides:
//! - `NetworkConfig`: one plugin's configuration, typed view plus raw bytes
//! - `NetworkConfigList`: an ordered chain of plugin configurations
//! - Parsing from bytes, discovery on disk and key injection

pub mod inject;
pub mod loader;

pub use inject::inject_conf;
pub use loader::{
    conf_files, conf_from_file, conf_list_from_file, load_conf, load_conf_list,
    CONF_EXTENSIONS, CONF_LIST_EXTENSIONS,
};

use crate::error::{Error, Result};
use crate::types::NetConf;
use serde_json::{Map, Value};

/// One plugin configuration
///
/// `bytes` is what the plugin receives on stdin; `network` is always the
/// decoding of `bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: NetConf,
    pub bytes: Vec<u8>,
}

impl NetworkConfig {
    /// Network name
    pub fn name(&self) -> &str {
        &self.network.name
    }

    /// Plugin executable name
    pub fn plugin_type(&self) -> &str {
        &self.network.plugin_type
    }
}

/// Ordered list of plugin configurations applied to the same sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfigList {
    pub name: Option<String>,
    pub cni_version: Option<String>,
    /// Plugins in application order
    pub plugins: Vec<NetworkConfig>,
    pub bytes: Vec<u8>,
}

impl NetworkConfigList {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Parse a single plugin configuration from raw JSON
pub fn conf_from_bytes(bytes: &[u8]) -> Result<NetworkConfig> {
    parse_conf(bytes.to_vec(), "bytes")
}

/// Parse a plugin configuration list from raw JSON
pub fn conf_list_from_bytes(bytes: &[u8]) -> Result<NetworkConfigList> {
    parse_conf_list(bytes.to_vec(), "bytes")
}

/// Wrap a single configuration as a one-element list
///
/// The list takes its name and version from the configuration itself.
pub fn conf_list_from_conf(conf: &NetworkConfig) -> Result<NetworkConfigList> {
    let plugin: Value = serde_json::from_slice(&conf.bytes).map_err(Error::Unmarshal)?;

    let mut raw = Map::new();
    if !conf.network.name.is_empty() {
        raw.insert("name".to_string(), Value::String(conf.network.name.clone()));
    }
    if !conf.network.cni_version.is_empty() {
        raw.insert(
            "cniVersion".to_string(),
            Value::String(conf.network.cni_version.clone()),
        );
    }
    raw.insert("plugins".to_string(), Value::Array(vec![plugin]));

    let bytes = serde_json::to_vec(&raw).map_err(|source| Error::Serialize {
        what: "configuration list".to_string(),
        source,
    })?;

    Ok(NetworkConfigList {
        name: non_empty(&conf.network.name),
        cni_version: non_empty(&conf.network.cni_version),
        plugins: vec![conf.clone()],
        bytes,
    })
}

pub(crate) fn parse_conf(bytes: Vec<u8>, origin: &str) -> Result<NetworkConfig> {
    let network: NetConf = serde_json::from_slice(&bytes).map_err(|source| Error::ConfigParse {
        origin: origin.to_string(),
        source,
    })?;
    Ok(NetworkConfig { network, bytes })
}

pub(crate) fn parse_conf_list(bytes: Vec<u8>, origin: &str) -> Result<NetworkConfigList> {
    let raw: Map<String, Value> =
        serde_json::from_slice(&bytes).map_err(|source| Error::ConfigListParse {
            origin: origin.to_string(),
            source,
        })?;

    let invalid = |message: String| Error::InvalidConfigList {
        origin: origin.to_string(),
        message,
    };

    let name = optional_string(&raw, "name").map_err(&invalid)?;
    let cni_version = optional_string(&raw, "cniVersion").map_err(&invalid)?;

    let plugins = match raw.get("plugins") {
        None => return Err(invalid("no 'plugins' key".to_string())),
        Some(Value::Array(plugins)) => plugins,
        Some(_) => return Err(invalid("'plugins' must be an array".to_string())),
    };
    if plugins.is_empty() {
        return Err(invalid("no plugins in list".to_string()));
    }

    let mut configs = Vec::with_capacity(plugins.len());
    for (index, plugin) in plugins.iter().enumerate() {
        if !plugin.is_object() {
            return Err(invalid(format!("plugin {} is not an object", index)));
        }
        // Map is BTreeMap-backed, so re-serializing yields sorted compact keys
        let plugin_bytes = serde_json::to_vec(plugin).map_err(|source| Error::Serialize {
            what: format!("plugin {} of {}", index, origin),
            source,
        })?;
        configs.push(parse_conf(
            plugin_bytes,
            &format!("{} (plugin {})", origin, index),
        )?);
    }

    Ok(NetworkConfigList {
        name,
        cni_version,
        plugins: configs,
        bytes,
    })
}

fn optional_string(
    raw: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<String>, String> {
    match raw.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
