//! Configuration discovery on disk
//!
//! Scans a single directory (no recursion) for `.conf`/`.json` plugin
//! configurations or `.conflist` configuration lists. Nothing is cached:
//! every lookup re-reads the directory.

use super::{parse_conf, parse_conf_list, NetworkConfig, NetworkConfigList};
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions of single plugin configurations
pub const CONF_EXTENSIONS: &[&str] = &["conf", "json"];

/// Extensions of configuration lists
pub const CONF_LIST_EXTENSIONS: &[&str] = &["conflist"];

/// List files directly inside `dir` with one of the given extensions
///
/// Entries are sorted by file name. Directories are skipped; symlinks are
/// followed. A missing directory yields an empty list.
pub fn conf_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::ReadDir {
                dir: dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::ReadDir {
            dir: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        // Suffix after the last dot, so a file named just ".conf" counts too
        let has_extension = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.rsplit_once('.'))
            .is_some_and(|(_, ext)| extensions.contains(&ext));
        if !has_extension {
            continue;
        }

        // Dangling symlinks and directories named like configs are invisible
        let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
        if is_file {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Read and parse a single plugin configuration file
pub fn conf_from_file(path: &Path) -> Result<NetworkConfig> {
    let bytes = read_file(path)?;
    parse_conf(bytes, &path.display().to_string())
}

/// Read and parse a configuration list file
pub fn conf_list_from_file(path: &Path) -> Result<NetworkConfigList> {
    let bytes = read_file(path)?;
    parse_conf_list(bytes, &path.display().to_string())
}

/// Find the plugin configuration named `name` in `dir`
///
/// Files are parsed in file name order. A malformed file fails the whole
/// lookup, even when a later file would have matched.
pub fn load_conf(dir: &Path, name: &str) -> Result<NetworkConfig> {
    let files = conf_files(dir, CONF_EXTENSIONS)?;
    if files.is_empty() {
        return Err(Error::NoConfigsFound {
            dir: dir.to_path_buf(),
        });
    }

    for file in &files {
        let conf = conf_from_file(file)?;
        if conf.network.name == name {
            debug!(network = name, file = %file.display(), "found network configuration");
            return Ok(conf);
        }
    }

    Err(Error::ConfigNotFound {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    })
}

/// Find the configuration list named `name` in `dir`
///
/// Same scan order and failure behavior as [`load_conf`].
pub fn load_conf_list(dir: &Path, name: &str) -> Result<NetworkConfigList> {
    let files = conf_files(dir, CONF_LIST_EXTENSIONS)?;
    if files.is_empty() {
        return Err(Error::NoConfigListsFound {
            dir: dir.to_path_buf(),
        });
    }

    for file in &files {
        let list = conf_list_from_file(file)?;
        if list.name.as_deref() == Some(name) {
            debug!(
                network = name,
                file = %file.display(),
                plugins = list.plugins.len(),
                "found network configuration list"
            );
            return Ok(list);
        }
    }

    Err(Error::ConfigListNotFound {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })
}
