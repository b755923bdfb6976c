//! Runtime-facing API
//!
//! `CniConfig` ties configuration to plugin execution: it resolves the
//! plugin named by a configuration's `type`, runs it with the per-call
//! `RuntimeConf`, and drives chained configuration lists.

use crate::conf::{inject_conf, NetworkConfig, NetworkConfigList};
use crate::error::{ChainFailure, Error, ErrorKind, Result};
use crate::invoke::{
    exec_plugin, exec_plugin_with_result, exec_plugin_without_result, find_in_path, CancelToken,
    ExecLimits, InvokeArgs, Verb,
};
use crate::types::{CniResult, VersionInfo, CURRENT_VERSION};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Message legacy plugins reply with when asked for VERSION
const UNKNOWN_VERSION_COMMAND: &str = "unknown CNI_COMMAND: VERSION";

/// Per-call parameters supplied by the container runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConf {
    pub container_id: String,
    /// Network namespace path
    pub net_ns: PathBuf,
    /// Interface to create inside the namespace
    pub if_name: String,
    /// Forwarded to the plugin verbatim, in order
    pub args: Vec<(String, String)>,
}

impl RuntimeConf {
    pub fn new(container_id: &str, net_ns: impl Into<PathBuf>, if_name: &str) -> Self {
        Self {
            container_id: container_id.to_string(),
            net_ns: net_ns.into(),
            if_name: if_name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: &str) -> Self {
        self.args.push((key.to_string(), value.to_string()));
        self
    }
}

/// Network attach/detach operations
pub trait Cni {
    fn add_network_list(&self, list: &NetworkConfigList, rt: &RuntimeConf) -> Result<CniResult>;
    fn del_network_list(&self, list: &NetworkConfigList, rt: &RuntimeConf) -> Result<()>;

    fn add_network(&self, net: &NetworkConfig, rt: &RuntimeConf) -> Result<CniResult>;
    fn del_network(&self, net: &NetworkConfig, rt: &RuntimeConf) -> Result<()>;
}

/// What a chained DEL does when one plugin fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelPolicy {
    /// Keep deleting the remaining plugins and report every failure (default)
    #[default]
    BestEffort,
    /// Return the first failure
    StopOnError,
}

/// Plugin execution settings
///
/// Cheap to clone; give each call its own clone to use a separate
/// cancellation token.
#[derive(Debug, Clone, Default)]
pub struct CniConfig {
    /// Directories searched for plugin executables, in order
    pub path: Vec<PathBuf>,
    /// Upper bound on a single plugin execution
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
    pub del_policy: DelPolicy,
}

impl CniConfig {
    pub fn new(path: Vec<PathBuf>) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_del_policy(mut self, policy: DelPolicy) -> Self {
        self.del_policy = policy;
        self
    }

    /// Ask a plugin which protocol versions it supports
    ///
    /// Plugins that predate the VERSION command are reported as supporting
    /// the legacy versions.
    pub fn get_version_info(&self, plugin_type: &str) -> Result<VersionInfo> {
        let plugin = find_in_path(plugin_type, &self.path)?;
        let args = InvokeArgs {
            verb: Verb::Version,
            container_id: "dummy".to_string(),
            net_ns: PathBuf::from("dummy"),
            if_name: "dummy".to_string(),
            plugin_args: Vec::new(),
            path: vec![PathBuf::from("dummy")],
        };
        let stdin = serde_json::to_vec(&serde_json::json!({ "cniVersion": CURRENT_VERSION }))
            .map_err(|source| Error::Serialize {
                what: "version request".to_string(),
                source,
            })?;

        match exec_plugin(&plugin, &stdin, &args, &self.limits()) {
            Ok(stdout) => serde_json::from_slice(&stdout).map_err(|source| {
                Error::MalformedOutput {
                    plugin: plugin.clone(),
                    source,
                }
            }),
            Err(Error::Plugin(e)) if e.msg == UNKNOWN_VERSION_COMMAND => {
                debug!(plugin = plugin_type, "plugin predates VERSION, assuming legacy versions");
                Ok(VersionInfo::legacy())
            }
            Err(e) => Err(e),
        }
    }

    fn limits(&self) -> ExecLimits<'_> {
        ExecLimits {
            timeout: self.timeout,
            cancel: self.cancel.as_ref(),
        }
    }

    fn prepare(
        &self,
        verb: Verb,
        net: &NetworkConfig,
        rt: &RuntimeConf,
    ) -> Result<(PathBuf, InvokeArgs)> {
        if net.network.plugin_type.is_empty() {
            return Err(Error::MissingPluginType(net.network.name.clone()));
        }
        let plugin = find_in_path(&net.network.plugin_type, &self.path)?;
        let args = InvokeArgs {
            verb,
            container_id: rt.container_id.clone(),
            net_ns: rt.net_ns.clone(),
            if_name: rt.if_name.clone(),
            plugin_args: rt.args.clone(),
            path: self.path.clone(),
        };
        Ok((plugin, args))
    }
}

impl Cni for CniConfig {
    /// Run ADD for every plugin in list order
    ///
    /// Each plugin sees the previous plugin's result as `prevResult`. The
    /// first failure stops the chain; plugins already added are not rolled
    /// back.
    fn add_network_list(&self, list: &NetworkConfigList, rt: &RuntimeConf) -> Result<CniResult> {
        let mut prev: Option<CniResult> = None;

        for (index, plugin) in list.plugins.iter().enumerate() {
            let result = build_one_config(list, plugin, prev.as_ref())
                .and_then(|net| self.add_network(&net, rt))
                .map_err(|e| Error::Chain {
                    index,
                    plugin: plugin.plugin_type().to_string(),
                    source: Box::new(e),
                })?;
            prev = Some(result);
        }

        Ok(prev.unwrap_or_default())
    }

    /// Run DEL for every plugin in reverse list order
    ///
    /// Cancellation or timeout ends the chain regardless of `DelPolicy`.
    fn del_network_list(&self, list: &NetworkConfigList, rt: &RuntimeConf) -> Result<()> {
        let mut failures = Vec::new();

        for (index, plugin) in list.plugins.iter().enumerate().rev() {
            let outcome =
                build_one_config(list, plugin, None).and_then(|net| self.del_network(&net, rt));

            if let Err(error) = outcome {
                let plugin = plugin.plugin_type().to_string();
                let stop = self.del_policy == DelPolicy::StopOnError
                    || error.kind() == ErrorKind::Cancelled;
                if stop {
                    return Err(Error::Chain {
                        index,
                        plugin,
                        source: Box::new(error),
                    });
                }
                warn!(index, plugin = %plugin, error = %error, "DEL failed, continuing");
                failures.push(ChainFailure {
                    index,
                    plugin,
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Cleanup(failures))
        }
    }

    fn add_network(&self, net: &NetworkConfig, rt: &RuntimeConf) -> Result<CniResult> {
        let (plugin, args) = self.prepare(Verb::Add, net, rt)?;
        exec_plugin_with_result(&plugin, &net.bytes, &args, &self.limits())
    }

    fn del_network(&self, net: &NetworkConfig, rt: &RuntimeConf) -> Result<()> {
        let (plugin, args) = self.prepare(Verb::Del, net, rt)?;
        exec_plugin_without_result(&plugin, &net.bytes, &args, &self.limits())
    }
}

/// Configuration handed to one plugin of a list
///
/// The list's `name` and `cniVersion` are injected, plus `prevResult` when
/// a previous plugin produced one.
pub fn build_one_config(
    list: &NetworkConfigList,
    orig: &NetworkConfig,
    prev_result: Option<&CniResult>,
) -> Result<NetworkConfig> {
    let mut conf = orig.clone();
    if let Some(name) = &list.name {
        conf = inject_conf(&conf, "name", name)?;
    }
    if let Some(version) = &list.cni_version {
        conf = inject_conf(&conf, "cniVersion", version)?;
    }
    if let Some(prev) = prev_result {
        conf = inject_conf(&conf, "prevResult", prev)?;
    }
    Ok(conf)
}
