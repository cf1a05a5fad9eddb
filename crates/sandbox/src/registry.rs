use crate::SandboxError;
use datafs_common::FsCfg;
use std::path::{Component, Path, PathBuf};

pub const VIRTUAL_ROOT: &str = "/data";

/// One allowed directory and the alias it answers to.
#[derive(Debug, Clone)]
pub struct AllowedDir {
    alias: String,
    real: PathBuf,
    canonical: PathBuf,
}

impl AllowedDir {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The directory as registered: home-expanded and absolute, symlinks untouched.
    pub fn real(&self) -> &Path {
        &self.real
    }

    fn holds(&self, resolved: &Path) -> bool {
        resolved.starts_with(&self.canonical) || resolved.starts_with(&self.real)
    }
}

/// Allowed directories, fixed at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    dirs: Vec<AllowedDir>,
}

impl DirectoryRegistry {
    /// Validates every directory and assigns aliases in input order.
    pub fn configure<S: AsRef<str>>(real_dirs: &[S]) -> Result<Self, SandboxError> {
        if real_dirs.is_empty() {
            return Err(SandboxError::NoDirectories);
        }
        let cwd = std::env::current_dir()?;
        let mut dirs = Vec::with_capacity(real_dirs.len());
        for (i, raw) in real_dirs.iter().enumerate() {
            let raw = raw.as_ref();
            let expanded = expand_home(raw);
            let real = if expanded.is_absolute() {
                normalize(&expanded)
            } else {
                normalize(&cwd.join(expanded))
            };
            if !real.is_dir() {
                return Err(SandboxError::NotADirectory(raw.to_string()));
            }
            let canonical = std::fs::canonicalize(&real)?;
            let alias = alias_for(i);
            tracing::debug!(%alias, real = %real.display(), "registered directory");
            dirs.push(AllowedDir {
                alias,
                real,
                canonical,
            });
        }
        Ok(Self { dirs })
    }

    pub fn from_cfg(cfg: &FsCfg) -> Result<Self, SandboxError> {
        Self::configure(&cfg.allowed_dirs)
    }

    pub fn list_aliases(&self) -> Vec<(&str, &Path)> {
        self.dirs
            .iter()
            .map(|d| (d.alias.as_str(), d.real.as_path()))
            .collect()
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<&Path> {
        self.dirs
            .iter()
            .find(|d| d.alias == alias)
            .map(|d| d.real.as_path())
    }

    /// Longest alias that `virtual_path` equals or lives under, plus the remainder.
    pub(crate) fn match_alias<'a>(&self, virtual_path: &'a str) -> Option<(&AllowedDir, &'a str)> {
        self.dirs
            .iter()
            .filter_map(|d| {
                let rest = virtual_path.strip_prefix(d.alias.as_str())?;
                if rest.is_empty() || rest.starts_with('/') {
                    Some((d, rest))
                } else {
                    None
                }
            })
            .max_by_key(|(d, _)| d.alias.len())
    }

    /// True if `resolved` is an allowed directory or lies beneath one.
    pub fn contains(&self, resolved: &Path) -> bool {
        self.dirs.iter().any(|d| d.holds(resolved))
    }
}

/// `/data/a` .. `/data/z`, then `/data/aa`, `/data/ab`, ...
fn alias_for(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    format!("{VIRTUAL_ROOT}/{}", String::from_utf8_lossy(&letters))
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Collapses `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
