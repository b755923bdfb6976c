//! Plugin environment contract

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_COMMAND: &str = "CNI_COMMAND";
pub const ENV_CONTAINER_ID: &str = "CNI_CONTAINERID";
pub const ENV_NETNS: &str = "CNI_NETNS";
pub const ENV_IFNAME: &str = "CNI_IFNAME";
pub const ENV_ARGS: &str = "CNI_ARGS";
pub const ENV_PATH: &str = "CNI_PATH";

/// Operation requested from a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Add,
    Del,
    Version,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Add => "ADD",
            Verb::Del => "DEL",
            Verb::Version => "VERSION",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-call parameters handed to a plugin through its environment
#[derive(Debug, Clone)]
pub struct InvokeArgs {
    pub verb: Verb,
    pub container_id: String,
    pub net_ns: PathBuf,
    pub if_name: String,
    pub plugin_args: Vec<(String, String)>,
    /// Plugin search path, re-exposed so plugins can delegate (e.g. to IPAM)
    pub path: Vec<PathBuf>,
}

impl InvokeArgs {
    /// Environment variables for the plugin process
    ///
    /// These are added on top of the caller's own environment.
    pub fn as_env(&self) -> Vec<(&'static str, OsString)> {
        vec![
            (ENV_COMMAND, self.verb.as_str().into()),
            (ENV_CONTAINER_ID, self.container_id.clone().into()),
            (ENV_NETNS, self.net_ns.clone().into_os_string()),
            (ENV_ARGS, plugin_args_string(&self.plugin_args).into()),
            (ENV_IFNAME, self.if_name.clone().into()),
            (ENV_PATH, join_path(&self.path)),
        ]
    }
}

/// Serialize plugin arguments as `K1=V1;K2=V2`
pub fn plugin_args_string(args: &[(String, String)]) -> String {
    args.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse `K1=V1;K2=V2` into ordered pairs
///
/// Empty segments are skipped; a segment without `=` is an error.
pub fn parse_plugin_args(s: &str) -> Result<Vec<(String, String)>> {
    s.split(';')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => Err(Error::InvalidPluginArgs(pair.to_string())),
        })
        .collect()
}

fn join_path(path: &[PathBuf]) -> OsString {
    let mut joined = OsString::new();
    for (i, dir) in path.iter().enumerate() {
        if i > 0 {
            joined.push(":");
        }
        joined.push(Path::new(dir));
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_strings() {
        assert_eq!(Verb::Add.to_string(), "ADD");
        assert_eq!(Verb::Del.as_str(), "DEL");
        assert_eq!(Verb::Version.as_str(), "VERSION");
    }

    #[test]
    fn test_plugin_args_roundtrip_order() {
        let args = vec![
            ("IgnoreUnknown".to_string(), "1".to_string()),
            ("K8S_POD_NAME".to_string(), "web-0".to_string()),
        ];
        let s = plugin_args_string(&args);
        assert_eq!(s, "IgnoreUnknown=1;K8S_POD_NAME=web-0");
        assert_eq!(parse_plugin_args(&s).unwrap(), args);
    }

    #[test]
    fn test_parse_plugin_args_edge_cases() {
        assert!(parse_plugin_args("").unwrap().is_empty());
        assert_eq!(
            parse_plugin_args("A=;B=x=y;").unwrap(),
            vec![
                ("A".to_string(), String::new()),
                ("B".to_string(), "x=y".to_string())
            ]
        );
        assert!(matches!(
            parse_plugin_args("A=1;broken"),
            Err(Error::InvalidPluginArgs(p)) if p == "broken"
        ));
        assert!(parse_plugin_args("=1").is_err());
    }

    #[test]
    fn test_as_env() {
        let args = InvokeArgs {
            verb: Verb::Add,
            container_id: "abc123".to_string(),
            net_ns: PathBuf::from("/var/run/netns/test"),
            if_name: "eth0".to_string(),
            plugin_args: vec![("FOO".to_string(), "bar".to_string())],
            path: vec![PathBuf::from("/opt/cni/bin"), PathBuf::from("/usr/libexec/cni")],
        };

        let env = args.as_env();
        let get = |key: &str| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string_lossy().to_string())
        };
        assert_eq!(get(ENV_COMMAND).as_deref(), Some("ADD"));
        assert_eq!(get(ENV_CONTAINER_ID).as_deref(), Some("abc123"));
        assert_eq!(get(ENV_NETNS).as_deref(), Some("/var/run/netns/test"));
        assert_eq!(get(ENV_IFNAME).as_deref(), Some("eth0"));
        assert_eq!(get(ENV_ARGS).as_deref(), Some("FOO=bar"));
        assert_eq!(get(ENV_PATH).as_deref(), Some("/opt/cni/bin:/usr/libexec/cni"));
    }
}
