//! libcni - container network plugin configuration and invocation
//!
//! Loads network configurations from disk, lets callers adjust them, and
//! runs the external plugins they name with the per-container runtime
//! parameters.
//!
//! ```no_run
//! use libcni::{Cni, CniConfig, RuntimeConf};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> libcni::Result<()> {
//! let list = libcni::load_conf_list(Path::new("/etc/cni/net.d"), "mynet")?;
//! let cni = CniConfig::new(vec![PathBuf::from("/opt/cni/bin")]);
//! let rt = RuntimeConf::new("abc123", "/var/run/netns/abc123", "eth0");
//!
//! let result = cni.add_network_list(&list, &rt)?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chain;
pub mod conf;
pub mod error;
pub mod invoke;
pub mod types;

// Re-exports
pub use api::{build_one_config, Cni, CniConfig, DelPolicy, RuntimeConf};
pub use chain::format_chain_name;
pub use conf::{
    conf_files, conf_from_bytes, conf_from_file, conf_list_from_bytes, conf_list_from_conf,
    conf_list_from_file, inject_conf, load_conf, load_conf_list, NetworkConfig, NetworkConfigList,
};
pub use error::{ChainFailure, Error, ErrorKind, Result};
pub use invoke::CancelToken;
pub use types::{CniResult, Dns, NetConf, PluginError, VersionInfo};
