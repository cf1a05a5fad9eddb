use crate::registry::{normalize, DirectoryRegistry};
use crate::SandboxError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A real path that passed the sandbox checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    exists: bool,
}

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// False when the target did not exist at resolve time (create case).
    pub fn exists(&self) -> bool {
        self.exists
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<DirectoryRegistry>,
}

impl PathResolver {
    pub fn new(registry: Arc<DirectoryRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DirectoryRegistry {
        &self.registry
    }

    /// Maps a virtual path onto a real one.
    ///
    /// Existing targets are returned fully symlink-resolved and must land
    /// inside an allowed directory. Missing targets are returned as written,
    /// provided their resolved parent is inside an allowed directory.
    pub fn resolve(&self, virtual_path: &str) -> Result<ResolvedPath, SandboxError> {
        let candidate = self.candidate(virtual_path)?;
        match std::fs::canonicalize(&candidate) {
            Ok(resolved) => {
                if self.registry.contains(&resolved) {
                    tracing::debug!(virtual_path, real = %resolved.display(), "resolved");
                    Ok(ResolvedPath {
                        path: resolved,
                        exists: true,
                    })
                } else {
                    tracing::warn!(virtual_path, "sandbox escape refused");
                    Err(SandboxError::AccessDenied)
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => self.resolve_missing(virtual_path, candidate),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`resolve`](Self::resolve), but tolerates any number of missing
    /// parents: the deepest existing ancestor is the one that must be inside
    /// the sandbox. Used to create nested directories.
    pub fn resolve_nested(&self, virtual_path: &str) -> Result<ResolvedPath, SandboxError> {
        match self.resolve(virtual_path) {
            Err(SandboxError::ParentNotFound) => {}
            other => return other,
        }
        let candidate = self.candidate(virtual_path)?;
        let mut ancestor = candidate.as_path();
        while std::fs::symlink_metadata(ancestor).is_err() {
            ancestor = ancestor.parent().ok_or(SandboxError::AccessDenied)?;
        }
        let real = match std::fs::canonicalize(ancestor) {
            Ok(p) => p,
            // dangling symlink somewhere along the way
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(SandboxError::AccessDenied),
            Err(e) => return Err(e.into()),
        };
        if !self.registry.contains(&real) {
            tracing::warn!(virtual_path, "sandbox escape refused (ancestor)");
            return Err(SandboxError::AccessDenied);
        }
        Ok(ResolvedPath {
            path: candidate,
            exists: false,
        })
    }

    fn resolve_missing(
        &self,
        virtual_path: &str,
        candidate: PathBuf,
    ) -> Result<ResolvedPath, SandboxError> {
        // The name exists but canonicalize failed: a dangling symlink.
        // Writing through it would create its target, wherever that is.
        if std::fs::symlink_metadata(&candidate).is_ok() {
            tracing::warn!(virtual_path, "dangling symlink refused");
            return Err(SandboxError::AccessDenied);
        }
        let parent = candidate.parent().ok_or(SandboxError::AccessDenied)?;
        let real_parent = match std::fs::canonicalize(parent) {
            Ok(p) => p,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(SandboxError::ParentNotFound),
            Err(e) => return Err(e.into()),
        };
        if !self.registry.contains(&real_parent) {
            tracing::warn!(virtual_path, "sandbox escape refused (parent)");
            return Err(SandboxError::AccessDenied);
        }
        tracing::debug!(virtual_path, real = %candidate.display(), "resolved (new)");
        Ok(ResolvedPath {
            path: candidate,
            exists: false,
        })
    }

    /// Syntactic real path: alias swapped for its directory, `.`/`..` collapsed.
    fn candidate(&self, virtual_path: &str) -> Result<PathBuf, SandboxError> {
        let (dir, rest) = self
            .registry
            .match_alias(virtual_path)
            .ok_or_else(|| SandboxError::InvalidPath(virtual_path.to_string()))?;
        let relative = rest.trim_start_matches('/');
        let joined = if relative.is_empty() {
            dir.real().to_path_buf()
        } else {
            dir.real().join(relative)
        };
        Ok(normalize(&joined))
    }
}
