//! cnitool - run network plugins from the command line
//!
//! Looks up a network by name in the configuration directory and runs its
//! plugins against a network namespace.

mod cli;

use cli::{AttachArgs, Cli, Commands};
use libcni::invoke::parse_plugin_args;
use libcni::{Cni, CniConfig, Error, NetworkConfigList, Result, RuntimeConf};
use serde::Serialize;
use sha2::{Digest, Sha512};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let mut cni = CniConfig::new(cli.cni_path.clone());
    if let Some(secs) = cli.timeout {
        cni = cni.with_timeout(Duration::from_secs(secs));
    }

    match cli.command {
        Commands::Add(args) => {
            let list = load_network(&cli.conf_dir, &args.network)?;
            let rt = runtime_conf(&args)?;
            let result = cni.add_network_list(&list, &rt)?;
            print_json(&result)?;
        }
        Commands::Del(args) => {
            let list = load_network(&cli.conf_dir, &args.network)?;
            let rt = runtime_conf(&args)?;
            cni.del_network_list(&list, &rt)?;
        }
        Commands::Version { plugin } => {
            let info = cni.get_version_info(&plugin)?;
            print_json(&info)?;
        }
        Commands::ChainName {
            network,
            container_id,
        } => {
            println!("{}", libcni::format_chain_name(&network, &container_id));
        }
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
        }
    }

    Ok(())
}

/// Find a network list by name, falling back to a single configuration
fn load_network(dir: &Path, name: &str) -> Result<NetworkConfigList> {
    match libcni::load_conf_list(dir, name) {
        Ok(list) => Ok(list),
        Err(e) if e.is_not_found() => {
            debug!(network = name, "no configuration list, trying single configuration");
            let conf = libcni::load_conf(dir, name)?;
            libcni::conf_list_from_conf(&conf)
        }
        Err(e) => Err(e),
    }
}

fn runtime_conf(args: &AttachArgs) -> Result<RuntimeConf> {
    let container_id = args
        .container_id
        .clone()
        .unwrap_or_else(|| container_id_for(&args.netns));

    let mut rt = RuntimeConf::new(&container_id, args.netns.clone(), &args.ifname);
    if let Some(raw) = &args.args {
        rt.args = parse_plugin_args(raw)?;
    }
    Ok(rt)
}

/// Stable container ID for a namespace path
fn container_id_for(netns: &Path) -> String {
    let digest = hex::encode(Sha512::digest(netns.as_os_str().as_bytes()));
    format!("cnitool-{}", &digest[..20])
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| Error::Serialize {
        what: "output".to_string(),
        source,
    })?;
    println!("{}", json);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
