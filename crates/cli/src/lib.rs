// # -----------------------------
// # crates/cli/src/lib.rs
// # -----------------------------
// Startup shared by `datafs` and `datafs-mcpd`.

use anyhow::{Context, Result};
use datafs_common::Config;
use datafs_tools::FsTools;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout belongs to the protocol.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub struct Setup {
    pub config: Config,
    pub tools: FsTools,
}

impl Setup {
    /// Config file + command line, then the directory registry. Any failure
    /// here is fatal: no request is served with a half-built sandbox.
    pub fn load(cli_dirs: &[String], config_path: Option<&Path>, read_only: bool) -> Result<Self> {
        let mut config = Config::load(config_path).context("load config")?;
        config.merge_dirs(cli_dirs);
        if read_only {
            config.policy.read_only = true;
        }
        if config.fs.allowed_dirs.is_empty() {
            anyhow::bail!(
                "no allowed directories: pass at least one directory or set [fs].allowed_dirs"
            );
        }
        let tools = FsTools::from_config(&config).context("configure allowed directories")?;
        for (alias, real) in tools.resolver().registry().list_aliases() {
            tracing::info!(%alias, real = %real.display(), "allowed directory");
        }
        if config.policy.read_only {
            tracing::info!("read-only profile: write tools disabled");
        }
        Ok(Self { config, tools })
    }

    /// `/data/a -> /real/dir`, one per line.
    pub fn mapping(&self) -> String {
        self.tools
            .resolver()
            .registry()
            .list_aliases()
            .into_iter()
            .map(|(alias, real)| format!("{alias} -> {}", real.display()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
