//! Command-line interface for cnitool
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// cnitool - run network plugins against a network namespace
#[derive(Parser)]
#[command(name = "cnitool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding network configurations
    #[arg(long, env = "NETCONFPATH", default_value = "/etc/cni/net.d")]
    pub conf_dir: PathBuf,

    /// Plugin search path (colon-separated)
    #[arg(long, env = "CNI_PATH", default_value = "/opt/cni/bin", value_delimiter = ':')]
    pub cni_path: Vec<PathBuf>,

    /// Kill a plugin that runs longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Attach a namespace to a network
    Add(AttachArgs),

    /// Detach a namespace from a network (plugins run in reverse order)
    Del(AttachArgs),

    /// Show the protocol versions a plugin supports
    Version {
        /// Plugin executable name
        plugin: String,
    },

    /// Print the packet filter chain name for a network and container
    ChainName {
        /// Network name
        network: String,

        /// Container ID
        container_id: String,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments shared by add and del
#[derive(clap::Args)]
pub struct AttachArgs {
    /// Network (or network list) name
    pub network: String,

    /// Network namespace path
    pub netns: PathBuf,

    /// Interface name inside the namespace
    #[arg(long, env = "CNI_IFNAME", default_value = "eth0")]
    pub ifname: String,

    /// Container ID (derived from the namespace path if omitted)
    #[arg(long)]
    pub container_id: Option<String>,

    /// Plugin arguments as KEY=VALUE;KEY=VALUE
    #[arg(long, env = "CNI_ARGS")]
    pub args: Option<String>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "cnitool", &mut std::io::stdout());
    }
}
