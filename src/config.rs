//! Client configuration file.
//!
//! Looked up in order: `--config PATH`, `$LMI_CONFIG`,
//! `$XDG_CONFIG_HOME/lmi/lmi.yaml`, `$HOME/.config/lmi/lmi.yaml`. A missing
//! default file is not an error; a missing explicit one is.
//!
//! ```yaml
//! targets:
//!   - ssh root@db1.example.com lmi-bridge
//! namespace: root/cimv2
//! human_friendly: true
//! bridge_stderr: false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::cim::DEFAULT_NAMESPACE;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bridges to run commands against when no `--target` is given.
    pub targets: Vec<String>,
    pub namespace: String,
    /// Print sizes as `1.5 GiB` instead of byte counts.
    pub human_friendly: bool,
    /// Let bridge stderr through (debugging bridges).
    pub bridge_stderr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            human_friendly: false,
            bridge_stderr: false,
        }
    }
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load from an explicit path or the first default location that exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading configuration");
            return Self::from_file(path);
        }
        match default_path() {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "loading configuration");
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

fn default_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("lmi").join("lmi.yaml"))
}
