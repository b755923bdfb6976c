//! Unified error types for libcni

use crate::types::PluginError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for libcni operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("error reading {}: {source}", .path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("error listing {}: {source}", .dir.display())]
    ReadDir { dir: PathBuf, source: io::Error },

    // Lookup errors
    #[error("no net configurations found")]
    NoConfigsFound { dir: PathBuf },

    #[error("no net configuration with name \"{name}\" in {}", .dir.display())]
    ConfigNotFound { name: String, dir: PathBuf },

    #[error("no net configuration lists found")]
    NoConfigListsFound { dir: PathBuf },

    #[error("no net configuration list with name \"{name}\" in {}", .dir.display())]
    ConfigListNotFound { name: String, dir: PathBuf },

    #[error("{plugin} not found in configured path [{}]", join_dirs(.path))]
    PluginNotFound { plugin: String, path: Vec<PathBuf> },

    // Parse errors
    #[error("error parsing configuration {origin}: {source}")]
    ConfigParse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("error parsing configuration list {origin}: {source}")]
    ConfigListParse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("invalid configuration list {origin}: {message}")]
    InvalidConfigList { origin: String, message: String },

    #[error("unmarshal existing network bytes: {0}")]
    Unmarshal(serde_json::Error),

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: String,
        source: serde_json::Error,
    },

    // Validation errors
    #[error("key value can not be empty")]
    EmptyKey,

    #[error("newValue must be specified")]
    MissingValue,

    #[error("network configuration \"{0}\" has no plugin type")]
    MissingPluginType(String),

    #[error("invalid plugin name \"{0}\"")]
    InvalidPluginName(String),

    #[error("invalid plugin argument \"{0}\", expected KEY=VALUE")]
    InvalidPluginArgs(String),

    // Process errors
    #[error("failed to execute plugin {}: {source}", .plugin.display())]
    Spawn { plugin: PathBuf, source: io::Error },

    #[error("failed waiting for plugin {}: {source}", .plugin.display())]
    Wait { plugin: PathBuf, source: io::Error },

    #[error("failed to write configuration to plugin {}: {source}", .plugin.display())]
    StdinWrite { plugin: PathBuf, source: io::Error },

    #[error("plugin {} failed ({status}): {stderr}", .plugin.display())]
    PluginFailed {
        plugin: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("invalid output from plugin {}: {source}", .plugin.display())]
    MalformedOutput {
        plugin: PathBuf,
        source: serde_json::Error,
    },

    // Structured plugin error, passed through as reported
    #[error("{0}")]
    Plugin(PluginError),

    // Cancellation
    #[error("plugin {} timed out after {timeout:?}", .plugin.display())]
    Timeout { plugin: PathBuf, timeout: Duration },

    #[error("plugin {} cancelled", .plugin.display())]
    Cancelled { plugin: PathBuf },

    // Chain errors
    #[error("plugin {index} ({plugin}) in chain failed: {source}")]
    Chain {
        index: usize,
        plugin: String,
        source: Box<Error>,
    },

    #[error("{} plugin(s) failed during DEL: {}", .0.len(), join_failures(.0))]
    Cleanup(Vec<ChainFailure>),
}

/// Error classes callers can branch on without matching every variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Io,
    Validation,
    Process,
    Plugin,
    Cancelled,
}

/// One failed plugin inside a chained DEL
#[derive(Debug)]
pub struct ChainFailure {
    /// Position of the plugin in the list
    pub index: usize,
    /// Plugin type
    pub plugin: String,
    pub error: Error,
}

impl std::fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plugin {} ({}): {}", self.index, self.plugin, self.error)
    }
}

impl Error {
    /// Classify this error
    ///
    /// Chain errors report the class of the plugin failure they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigRead { .. } | Error::ReadDir { .. } => ErrorKind::Io,
            Error::NoConfigsFound { .. }
            | Error::ConfigNotFound { .. }
            | Error::NoConfigListsFound { .. }
            | Error::ConfigListNotFound { .. }
            | Error::PluginNotFound { .. } => ErrorKind::NotFound,
            Error::ConfigParse { .. }
            | Error::ConfigListParse { .. }
            | Error::InvalidConfigList { .. }
            | Error::Unmarshal(_)
            | Error::Serialize { .. }
            | Error::MalformedOutput { .. } => ErrorKind::Parse,
            Error::EmptyKey
            | Error::MissingValue
            | Error::MissingPluginType(_)
            | Error::InvalidPluginName(_)
            | Error::InvalidPluginArgs(_) => ErrorKind::Validation,
            Error::Spawn { .. }
            | Error::Wait { .. }
            | Error::StdinWrite { .. }
            | Error::PluginFailed { .. } => ErrorKind::Process,
            Error::Plugin(_) => ErrorKind::Plugin,
            Error::Timeout { .. } | Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Chain { source, .. } => source.kind(),
            Error::Cleanup(failures) => failures
                .first()
                .map(|f| f.error.kind())
                .unwrap_or(ErrorKind::Process),
        }
    }

    /// Whether this is a "nothing matched" lookup failure
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

fn join_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_failures(failures: &[ChainFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for libcni operations
pub type Result<T> = std::result::Result<T, Error>;
