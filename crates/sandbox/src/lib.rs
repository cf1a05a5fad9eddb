// # -----------------------------
// # crates/sandbox/src/lib.rs
// # -----------------------------
// Virtual path sandbox.
// - Registry of allowed real directories, aliased as /data/a, /data/b, ...
// - Resolver that maps a virtual path onto a real one and refuses escapes
//   (`..`, symlinks pointing outside, missing parents)

mod registry;
mod resolver;

pub use registry::{AllowedDir, DirectoryRegistry, VIRTUAL_ROOT};
pub use resolver::{PathResolver, ResolvedPath};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Not a valid path (List allowed directories for valid paths): {0}")]
    InvalidPath(String),
    #[error("Parent directory not found")]
    ParentNotFound,
    #[error("Access denied")]
    AccessDenied,
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("no allowed directories configured")]
    NoDirectories,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
