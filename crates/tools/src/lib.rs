// # -----------------------------
// # crates/tools/src/lib.rs
// # -----------------------------
pub mod edit;
pub mod error;
pub mod fs;
pub mod patch;
pub mod surface;

pub use error::ToolError;
pub use patch::{apply as apply_patch, Applied, PatchError, PatchSegment};
pub use surface::{FsTools, Tool, ToolFailure};
