//! Wire types shared with plugins
//!
//! Provides:
//! - Typed view of a plugin configuration (`NetConf`)
//! - ADD result (`CniResult`) and its IP/route/DNS parts
//! - Structured plugin error (`PluginError`)
//! - VERSION reply (`VersionInfo`)

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::net::IpAddr;

/// Protocol version this library speaks
pub const CURRENT_VERSION: &str = "0.2.0";

/// Versions a plugin that predates the VERSION command is assumed to support
pub const LEGACY_VERSIONS: &[&str] = &["0.1.0", "0.2.0"];

/// Typed view of one plugin configuration
///
/// Only the fields the runtime cares about are decoded; everything else
/// stays in the raw bytes of the owning `NetworkConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConf {
    #[serde(
        rename = "cniVersion",
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub cni_version: String,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Plugin executable name
    #[serde(
        rename = "type",
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub plugin_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Dns::is_empty")]
    pub dns: Dns,
}

/// IPAM plugin reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipam {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub plugin_type: String,
}

/// DNS settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dns {
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub domain: String,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub search: Vec<String>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Decode an explicit `null` as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Dns {
    pub fn is_empty(&self) -> bool {
        self.nameservers.is_empty()
            && self.domain.is_empty()
            && self.search.is_empty()
            && self.options.is_empty()
    }
}

/// Result of a successful ADD
///
/// The 0.2.0 fields are typed. Keys from newer result formats are kept in
/// `extra` so a result can be handed to the next plugin unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CniResult {
    #[serde(rename = "cniVersion", default, skip_serializing_if = "Option::is_none")]
    pub cni_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip4: Option<IpConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip6: Option<IpConfig>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Dns::is_empty"
    )]
    pub dns: Dns,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Address assigned to the interface, with gateway and routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub ip: IpNet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub dst: IpNet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<IpAddr>,
}

impl fmt::Display for CniResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ip4) = &self.ip4 {
            parts.push(format!("IP4:{}", ip4));
        }
        if let Some(ip6) = &self.ip6 {
            parts.push(format!("IP6:{}", ip6));
        }
        if !self.dns.nameservers.is_empty() {
            parts.push(format!("DNS:{}", self.dns.nameservers.join(",")));
        }
        write!(f, "{}", parts.join(", "))
    }
}

impl fmt::Display for IpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{IP:{}", self.ip)?;
        if let Some(gw) = self.gateway {
            write!(f, " Gateway:{}", gw)?;
        }
        if !self.routes.is_empty() {
            let routes: Vec<String> = self
                .routes
                .iter()
                .map(|r| match r.gw {
                    Some(gw) => format!("{} via {}", r.dst, gw),
                    None => r.dst.to_string(),
                })
                .collect();
            write!(f, " Routes:[{}]", routes.join(" "))?;
        }
        write!(f, "}}")
    }
}

/// Error reported by a plugin on stdout together with a non-zero exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginError {
    pub code: u32,

    pub msg: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl PluginError {
    pub fn new(code: u32, msg: &str) -> Self {
        Self {
            code,
            msg: msg.to_string(),
            details: String::new(),
        }
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = details.to_string();
        self
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}", self.msg)
        } else {
            write!(f, "{}; {}", self.msg, self.details)
        }
    }
}

impl std::error::Error for PluginError {}

/// Reply to the VERSION command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "cniVersion", default)]
    pub cni_version: String,

    #[serde(rename = "supportedVersions")]
    pub supported_versions: Vec<String>,
}

impl VersionInfo {
    /// Version info assumed for plugins that do not understand VERSION
    pub fn legacy() -> Self {
        Self {
            cni_version: CURRENT_VERSION.to_string(),
            supported_versions: LEGACY_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn supports(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netconf_ignores_plugin_keys() {
        let conf: NetConf = serde_json::from_str(
            r#"{"name":"net","type":"bridge","mtu":1400,"ipam":{"type":"host-local"}}"#,
        )
        .unwrap();
        assert_eq!(conf.name, "net");
        assert_eq!(conf.plugin_type, "bridge");
        assert_eq!(conf.ipam.unwrap().plugin_type, "host-local");
        assert!(conf.dns.is_empty());
    }

    #[test]
    fn test_netconf_accepts_null_fields() {
        let conf: NetConf = serde_json::from_str(
            r#"{"cniVersion":null,"name":"net","type":"bridge","ipam":null,"dns":null}"#,
        )
        .unwrap();
        assert_eq!(conf.plugin_type, "bridge");
        assert!(conf.cni_version.is_empty());
        assert!(conf.ipam.is_none());
        assert!(conf.dns.is_empty());

        let dns: Dns = serde_json::from_str(r#"{"nameservers":null,"domain":"local"}"#).unwrap();
        assert!(dns.nameservers.is_empty());
        assert_eq!(dns.domain, "local");

        let result: CniResult = serde_json::from_str(r#"{"dns":null}"#).unwrap();
        assert!(result.dns.is_empty());
    }

    #[test]
    fn test_dns_omits_empty_fields() {
        let dns = Dns {
            nameservers: vec!["server1".to_string(), "server2".to_string()],
            domain: "local".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&dns).unwrap(),
            r#"{"nameservers":["server1","server2"],"domain":"local"}"#
        );
    }

    #[test]
    fn test_result_keeps_unknown_keys() {
        let raw = r#"{"cniVersion":"0.3.1","interfaces":[{"name":"eth0"}],"ip4":{"ip":"10.1.2.3/24","gateway":"10.1.2.1"}}"#;
        let result: CniResult = serde_json::from_str(raw).unwrap();

        let ip4 = result.ip4.as_ref().unwrap();
        assert_eq!(ip4.ip.to_string(), "10.1.2.3/24");
        assert_eq!(ip4.gateway, Some("10.1.2.1".parse().unwrap()));
        assert!(result.extra.contains_key("interfaces"));

        let again: Value = serde_json::to_value(&result).unwrap();
        assert_eq!(again["interfaces"][0]["name"], "eth0");
        assert_eq!(again["cniVersion"], "0.3.1");
    }

    #[test]
    fn test_result_display() {
        let result: CniResult = serde_json::from_str(
            r#"{"ip4":{"ip":"10.1.2.3/24","routes":[{"dst":"0.0.0.0/0","gw":"10.1.2.1"}]},"dns":{"nameservers":["8.8.8.8"]}}"#,
        )
        .unwrap();
        assert_eq!(
            result.to_string(),
            "IP4:{IP:10.1.2.3/24 Routes:[0.0.0.0/0 via 10.1.2.1]}, DNS:8.8.8.8"
        );
    }

    #[test]
    fn test_plugin_error_display() {
        let err: PluginError =
            serde_json::from_str(r#"{"code":7,"msg":"boom","details":"bridge missing"}"#).unwrap();
        assert_eq!(err.code, 7);
        assert_eq!(err.to_string(), "boom; bridge missing");
        assert_eq!(PluginError::new(7, "boom").to_string(), "boom");
    }

    #[test]
    fn test_plugin_error_requires_code_and_msg() {
        assert!(serde_json::from_str::<PluginError>("{}").is_err());
        assert!(serde_json::from_str::<PluginError>(r#"{"msg":"x"}"#).is_err());
    }

    #[test]
    fn test_legacy_version_info() {
        let info = VersionInfo::legacy();
        assert!(info.supports("0.1.0"));
        assert!(info.supports("0.2.0"));
        assert!(!info.supports("0.3.0"));
    }
}
