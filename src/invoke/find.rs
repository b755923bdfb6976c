//! Plugin executable lookup

use crate::error::{Error, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Find the executable `plugin` in the first directory of `paths` that has it
///
/// Directory order is authoritative. Plugin names must be bare file names.
pub fn find_in_path(plugin: &str, paths: &[PathBuf]) -> Result<PathBuf> {
    if plugin.is_empty() || plugin == "." || plugin == ".." || plugin.contains('/') {
        return Err(Error::InvalidPluginName(plugin.to_string()));
    }

    paths
        .iter()
        .map(|dir| dir.join(plugin))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| Error::PluginNotFound {
            plugin: plugin.to_string(),
            path: paths.to_vec(),
        })
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
