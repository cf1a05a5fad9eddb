//! Tool surface: one method per remotely callable tool, plus a JSON
//! dispatcher used by the binaries.

use crate::error::ToolError;
use crate::edit::{self, EditOp};
use crate::{fs, patch};
use datafs_common::Config;
use datafs_sandbox::{DirectoryRegistry, PathResolver, SandboxError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    ListAllowedDirectories,
    ReadFile,
    ReadMultipleFiles,
    ListDirectory,
    DirectoryTree,
    SearchFiles,
    GetFileInfo,
    WriteFile,
    EditFile,
    CreateDirectory,
    MoveFile,
    ApplyDiff,
}

impl Tool {
    pub const ALL: [Tool; 12] = [
        Tool::ListAllowedDirectories,
        Tool::ReadFile,
        Tool::ReadMultipleFiles,
        Tool::ListDirectory,
        Tool::DirectoryTree,
        Tool::SearchFiles,
        Tool::GetFileInfo,
        Tool::WriteFile,
        Tool::EditFile,
        Tool::CreateDirectory,
        Tool::MoveFile,
        Tool::ApplyDiff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::ListAllowedDirectories => "list_allowed_directories",
            Tool::ReadFile => "read_file",
            Tool::ReadMultipleFiles => "read_multiple_files",
            Tool::ListDirectory => "list_directory",
            Tool::DirectoryTree => "directory_tree",
            Tool::SearchFiles => "search_files",
            Tool::GetFileInfo => "get_file_info",
            Tool::WriteFile => "write_file",
            Tool::EditFile => "edit_file",
            Tool::CreateDirectory => "create_directory",
            Tool::MoveFile => "move_file",
            Tool::ApplyDiff => "apply_diff",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn writes(self) -> bool {
        matches!(
            self,
            Tool::WriteFile
                | Tool::EditFile
                | Tool::CreateDirectory
                | Tool::MoveFile
                | Tool::ApplyDiff
        )
    }

    /// Prefix of every error message the tool renders.
    fn action(self) -> &'static str {
        match self {
            Tool::ReadFile | Tool::ReadMultipleFiles | Tool::ListAllowedDirectories => "Error reading",
            Tool::ListDirectory | Tool::DirectoryTree => "Error listing",
            Tool::SearchFiles => "Error searching",
            Tool::GetFileInfo => "Error getting info",
            Tool::WriteFile => "Error writing",
            Tool::EditFile => "Error editing",
            Tool::CreateDirectory => "Error creating",
            Tool::MoveFile => "Error moving",
            Tool::ApplyDiff => "Error applying diff",
        }
    }

    fn args(self) -> &'static [&'static str] {
        match self {
            Tool::ListAllowedDirectories => &[],
            Tool::ReadFile => &["path", "head?", "tail?"],
            Tool::ReadMultipleFiles => &["paths"],
            Tool::ListDirectory | Tool::DirectoryTree | Tool::GetFileInfo => &["path"],
            Tool::SearchFiles => &["path", "pattern?", "excludePatterns?"],
            Tool::WriteFile => &["path", "content"],
            Tool::EditFile => &["path", "edits", "dryRun?"],
            Tool::CreateDirectory => &["path"],
            Tool::MoveFile => &["source", "destination"],
            Tool::ApplyDiff => &["path", "diff", "dryRun?"],
        }
    }

    fn description(self) -> &'static str {
        match self {
            Tool::ListAllowedDirectories => "List the top-level virtual directories that are accessible.",
            Tool::ReadFile => "Read a whole file, or only its first (head) or last (tail) lines.",
            Tool::ReadMultipleFiles => "Read several files at once; paths are separated by newlines.",
            Tool::ListDirectory => "List the entries of a directory, marked [DIR] or [FILE].",
            Tool::DirectoryTree => "Recursive listing of a directory.",
            Tool::SearchFiles => "Recursive listing filtered by a glob on names, with optional exclusions.",
            Tool::GetFileInfo => "Size, times, type and permissions of a file or directory.",
            Tool::WriteFile => "Create or overwrite a file with the given content.",
            Tool::EditFile => "Replace whole lines ({oldText, newText} edits, in order) and return a unified diff; dryRun does not write.",
            Tool::CreateDirectory => "Create a directory, including missing parents.",
            Tool::MoveFile => "Move or rename a file or directory; fails if the destination exists.",
            Tool::ApplyDiff => "Apply an @@@ segment patch to a file; dryRun reports without writing.",
        }
    }
}

/// A rendered failure, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadFileArgs {
    path: String,
    #[serde(default)]
    head: Option<usize>,
    #[serde(default)]
    tail: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadMultipleArgs {
    paths: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    path: String,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default, rename = "excludePatterns")]
    exclude_patterns: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EditArgs {
    path: String,
    edits: Vec<EditOp>,
    #[serde(default, rename = "dryRun")]
    dry_run: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveArgs {
    source: String,
    destination: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplyDiffArgs {
    path: String,
    diff: String,
    #[serde(default, rename = "dryRun")]
    dry_run: bool,
}

fn decode<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::Schema(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct FsTools {
    resolver: PathResolver,
    read_only: bool,
}

impl FsTools {
    pub fn new(resolver: PathResolver, read_only: bool) -> Self {
        Self {
            resolver,
            read_only,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, SandboxError> {
        let registry = DirectoryRegistry::from_cfg(&cfg.fs)?;
        Ok(Self::new(
            PathResolver::new(Arc::new(registry)),
            cfg.policy.read_only,
        ))
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Tools this instance serves; write tools are hidden when read-only.
    pub fn tools(&self) -> Vec<Tool> {
        Tool::ALL
            .into_iter()
            .filter(|t| !(self.read_only && t.writes()))
            .collect()
    }

    pub fn descriptors(&self) -> Value {
        Value::Array(
            self.tools()
                .into_iter()
                .map(|t| {
                    json!({
                        "name": t.name(),
                        "args": t.args(),
                        "description": t.description(),
                        "writes": t.writes(),
                    })
                })
                .collect(),
        )
    }

    /// Runs the named tool with JSON arguments.
    pub fn call(&self, name: &str, args: Value) -> Result<String, ToolFailure> {
        let virtual_path = args
            .get("path")
            .or_else(|| args.get("source"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(tool) = Tool::from_name(name) else {
            let e = ToolError::UnknownTool(name.to_string());
            return Err(ToolFailure {
                kind: e.kind(),
                message: e.to_string(),
            });
        };
        tracing::debug!(tool = name, %virtual_path, "tool call");
        self.dispatch(tool, args).map_err(|e| {
            tracing::warn!(tool = name, kind = e.kind(), error = ?e, "tool failed");
            let message = if tool.writes() {
                e.render_for_write(tool.action(), &virtual_path)
            } else {
                e.render(tool.action(), &virtual_path)
            };
            ToolFailure {
                kind: e.kind(),
                message,
            }
        })
    }

    fn dispatch(&self, tool: Tool, args: Value) -> Result<String, ToolError> {
        if self.read_only && tool.writes() {
            return Err(ToolError::ReadOnly);
        }
        match tool {
            Tool::ListAllowedDirectories => Ok(self.list_allowed_directories()),
            Tool::ReadFile => {
                let a: ReadFileArgs = decode(args)?;
                self.read_file(&a.path, a.head, a.tail)
            }
            Tool::ReadMultipleFiles => {
                let a: ReadMultipleArgs = decode(args)?;
                Ok(self.read_multiple_files(&a.paths))
            }
            Tool::ListDirectory => {
                let a: PathArgs = decode(args)?;
                self.list_directory(&a.path)
            }
            Tool::DirectoryTree => {
                let a: PathArgs = decode(args)?;
                self.search_files(&a.path, None, &[])
            }
            Tool::SearchFiles => {
                let a: SearchArgs = decode(args)?;
                self.search_files(
                    &a.path,
                    a.pattern.as_deref(),
                    a.exclude_patterns.as_deref().unwrap_or_default(),
                )
            }
            Tool::GetFileInfo => {
                let a: PathArgs = decode(args)?;
                self.get_file_info(&a.path)
            }
            Tool::WriteFile => {
                let a: WriteArgs = decode(args)?;
                self.write_file(&a.path, &a.content)
            }
            Tool::EditFile => {
                let a: EditArgs = decode(args)?;
                self.edit_file(&a.path, &a.edits, a.dry_run)
            }
            Tool::CreateDirectory => {
                let a: PathArgs = decode(args)?;
                self.create_directory(&a.path)
            }
            Tool::MoveFile => {
                let a: MoveArgs = decode(args)?;
                self.move_file(&a.source, &a.destination)
            }
            Tool::ApplyDiff => {
                let a: ApplyDiffArgs = decode(args)?;
                self.apply_diff(&a.path, &a.diff, a.dry_run)
            }
        }
    }

    pub fn list_allowed_directories(&self) -> String {
        let aliases: Vec<&str> = self
            .resolver
            .registry()
            .list_aliases()
            .into_iter()
            .map(|(alias, _)| alias)
            .collect();
        format!("### Allowed directories:\n{}", aliases.join("\n"))
    }

    pub fn read_file(
        &self,
        path: &str,
        head: Option<usize>,
        tail: Option<usize>,
    ) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        match (head, tail) {
            (Some(_), Some(_)) => Err(ToolError::InvalidInput(
                "Specify either head or tail, not both".into(),
            )),
            (Some(n), None) => fs::head(target.as_path(), n),
            (None, Some(n)) => fs::tail(target.as_path(), n),
            (None, None) => fs::read_to_string(target.as_path()),
        }
    }

    /// Failures are reported inline, per path; the call itself never fails.
    pub fn read_multiple_files(&self, paths: &str) -> String {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for vp in paths.split('\n') {
            if vp.is_empty() || !seen.insert(vp) {
                continue;
            }
            match self.read_file(vp, None, None) {
                Ok(content) => results.push(format!("### {vp}:\n```\n{content}\n```\n")),
                Err(e) => results.push(format!("### {vp}:\n{}\n", e.render("Error reading", vp))),
            }
        }
        results.join("\n")
    }

    pub fn list_directory(&self, path: &str) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        let entries = fs::list_dir(target.as_path())?;
        Ok(entries
            .iter()
            .map(|e| format!("[{}] {}", if e.is_dir { "DIR" } else { "FILE" }, e.name))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Also backs `directory_tree` (no pattern, no exclusions).
    pub fn search_files(
        &self,
        path: &str,
        pattern: Option<&str>,
        exclude: &[String],
    ) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        let matches = fs::walk(target.as_path(), pattern, exclude)?;
        let mut out = vec![format!("### Contents of {path}:")];
        out.extend(matches);
        Ok(out.join("\n"))
    }

    pub fn get_file_info(&self, path: &str) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        Ok(fs::file_info(target.as_path())?.render(path))
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        fs::write_from_string(target.as_path(), content)?;
        tracing::info!(
            virtual_path = path,
            bytes = content.len(),
            created = !target.exists(),
            "wrote file"
        );
        Ok(format!("Wrote to {path}"))
    }

    /// Returns the unified diff of the edits; written unless `dry_run`.
    pub fn edit_file(&self, path: &str, edits: &[EditOp], dry_run: bool) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        let original = fs::read_to_string(target.as_path())?;
        let updated = edit::apply_edits(&original, edits);
        let diff = edit::unified_diff(&original, &updated, path);
        if !dry_run {
            fs::write_from_string(target.as_path(), &updated)?;
            tracing::info!(virtual_path = path, edits = edits.len(), "edited file");
        }
        Ok(diff)
    }

    pub fn create_directory(&self, path: &str) -> Result<String, ToolError> {
        let target = self.resolver.resolve_nested(path)?;
        fs::create_dir_all(target.as_path())?;
        tracing::info!(virtual_path = path, "created directory");
        Ok(format!("Created {path}"))
    }

    pub fn move_file(&self, source: &str, destination: &str) -> Result<String, ToolError> {
        let from = self.resolver.resolve(source)?;
        let to = self.resolver.resolve(destination)?;
        fs::move_path(from.as_path(), to.as_path())?;
        tracing::info!(source, destination, "moved");
        Ok(format!("Moved {source} to {destination}"))
    }

    /// Applies a segment patch. The file is written only once every segment
    /// applied; with `dry_run` it is never written.
    pub fn apply_diff(&self, path: &str, diff: &str, dry_run: bool) -> Result<String, ToolError> {
        let target = self.resolver.resolve(path)?;
        let original = fs::read_to_string(target.as_path())?;
        let applied = patch::apply(&original, diff)?;
        if dry_run {
            return Ok(format!(
                "Dry run, {path} not modified: {}\n```\n{}\n```",
                applied.report, applied.content
            ));
        }
        fs::write_from_string(target.as_path(), &applied.content)?;
        tracing::info!(
            virtual_path = path,
            segments = applied.segments,
            warnings = applied.warnings.len(),
            "patched file"
        );
        Ok(format!("Updated {path}: {}", applied.report))
    }
}
