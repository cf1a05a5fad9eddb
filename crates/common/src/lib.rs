// # -----------------------------
// # crates/common/src/lib.rs
// # -----------------------------
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "datafs.toml";
pub const CONFIG_ENV: &str = "DATAFS_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerCfg,
    pub fs: FsCfg,
    pub policy: PolicyCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
    pub name: String,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            name: concat!("datafs-mcpd/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsCfg {
    /// Real directories, in alias order (`/data/a`, `/data/b`, ...).
    pub allowed_dirs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyCfg {
    /// Refuse every tool that writes to disk.
    pub read_only: bool,
}

/// One tool invocation as it travels over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Config {
    /// Loads the configuration file.
    ///
    /// Lookup order: `explicit`, then `$DATAFS_CONFIG`, then `datafs.toml` in
    /// the working directory. Only the implicit default may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.trim().is_empty() => (PathBuf::from(p), true),
                _ => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };
        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config at {}", path.display()))?;
        let cfg: Config =
            toml::from_str(&s).with_context(|| format!("parse TOML {}", path.display()))?;
        Ok(cfg)
    }

    /// Command-line directories come first, then the ones from the file.
    pub fn merge_dirs(&mut self, cli_dirs: &[String]) {
        if cli_dirs.is_empty() {
            return;
        }
        let mut dirs = cli_dirs.to_vec();
        dirs.append(&mut self.fs.allowed_dirs);
        self.fs.allowed_dirs = dirs;
    }
}
