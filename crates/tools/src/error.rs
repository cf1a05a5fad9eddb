use crate::patch::PatchError;
use datafs_sandbox::SandboxError;
use std::io::{self, ErrorKind};
use thiserror::Error;

const LIST_HINT: &str = "(List allowed directories for valid paths)";

/// Every way a tool call can fail. Rendered once, at the tool boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Sandbox(SandboxError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("No such file or directory")]
    NotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Is a directory")]
    IsADirectory,
    #[error("Not a directory")]
    NotADirectory,
    #[error("File already exists")]
    AlreadyExists,
    #[error("Invalid value")]
    InvalidValue,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Input validation error: {0}")]
    Schema(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("server is read-only")]
    ReadOnly,
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for ToolError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::PermissionDenied => Self::PermissionDenied,
            ErrorKind::AlreadyExists => Self::AlreadyExists,
            ErrorKind::IsADirectory => Self::IsADirectory,
            ErrorKind::NotADirectory => Self::NotADirectory,
            ErrorKind::InvalidData => Self::InvalidValue,
            _ => Self::Io(e),
        }
    }
}

impl From<SandboxError> for ToolError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::Io(io) => io.into(),
            other => Self::Sandbox(other),
        }
    }
}

impl ToolError {
    /// Short, stable classification for callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sandbox(SandboxError::InvalidPath(_)) => "invalid_path",
            Self::Sandbox(SandboxError::ParentNotFound) => "parent_not_found",
            Self::Sandbox(SandboxError::AccessDenied) => "access_denied",
            Self::Sandbox(SandboxError::NotADirectory(_) | SandboxError::NoDirectories) => "config",
            Self::Sandbox(SandboxError::Io(_)) | Self::Io(_) => "io",
            Self::Patch(PatchError::Format(_)) => "patch_format",
            Self::Patch(PatchError::Apply { .. }) => "patch_apply",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::IsADirectory => "is_a_directory",
            Self::NotADirectory => "not_a_directory",
            Self::AlreadyExists => "already_exists",
            Self::InvalidValue => "invalid_value",
            Self::InvalidInput(_) => "invalid_input",
            Self::Schema(_) => "schema_error",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ReadOnly => "read_only",
        }
    }

    /// User-facing message. Mentions the virtual path, never the real one,
    /// and never the underlying OS error text.
    pub fn render(&self, action: &str, virtual_path: &str) -> String {
        self.render_with(action, virtual_path, Some(LIST_HINT))
    }

    /// Same as [`render`](Self::render), in the shorter wording of the write
    /// tools: no pointer to the allowed directory list.
    pub fn render_for_write(&self, action: &str, virtual_path: &str) -> String {
        self.render_with(action, virtual_path, None)
    }

    fn render_with(&self, action: &str, virtual_path: &str, hint: Option<&str>) -> String {
        let vp = if virtual_path.is_empty() {
            "Unknown path"
        } else {
            virtual_path
        };
        let hint = hint.map(|h| format!(" {h}")).unwrap_or_default();
        match self {
            Self::NotFound | Self::Sandbox(SandboxError::ParentNotFound) => {
                format!("{action}: No such file or directory{hint}: {vp}")
            }
            Self::PermissionDenied | Self::Sandbox(SandboxError::AccessDenied) => {
                format!("{action}: Permission denied{hint}: {vp}")
            }
            Self::IsADirectory => format!("{action}: Is a directory: {vp}"),
            Self::NotADirectory if hint.is_empty() => format!("{action}: Not a directory: {vp}"),
            Self::NotADirectory => format!("{action}: Not a valid directory{hint}: {vp}"),
            Self::AlreadyExists => format!("{action}: File already exists: {vp}"),
            Self::InvalidValue => format!("{action}: Invalid value: {vp}"),
            Self::ReadOnly => format!("{action}: Permission denied (server is read-only): {vp}"),
            Self::Patch(e) => format!("{action}: {e}: {vp}"),
            Self::Sandbox(_) | Self::InvalidInput(_) | Self::Schema(_) | Self::UnknownTool(_) => {
                format!("{action}: {self}")
            }
            Self::Io(_) => format!("{action}: {vp}"),
        }
    }
}
