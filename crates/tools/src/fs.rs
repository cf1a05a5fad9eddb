// # -----------------------------
// # crates/tools/src/fs.rs
// # -----------------------------
// Plain I/O on real paths that already went through the resolver.

use crate::error::ToolError;
use chrono::{DateTime, Local};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn read_to_string(path: &Path) -> Result<String, ToolError> {
    Ok(std::fs::read_to_string(path)?)
}

/// Parents are not created: the resolver only accepts paths whose parent exists.
pub fn write_from_string(path: &Path, content: &str) -> Result<(), ToolError> {
    std::fs::write(path, content)?;
    Ok(())
}

/// First `n` lines, line endings kept.
pub fn head(path: &Path, n: usize) -> Result<String, ToolError> {
    let content = read_to_string(path)?;
    Ok(content.split_inclusive('\n').take(n).collect())
}

/// Last `n` lines, line endings kept.
pub fn tail(path: &Path, n: usize) -> Result<String, ToolError> {
    let content = read_to_string(path)?;
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    Ok(lines[lines.len().saturating_sub(n)..].concat())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Direct children, sorted by name.
pub fn list_dir(path: &Path) -> Result<Vec<DirEntry>, ToolError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        out.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.path().is_dir(),
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// Recursive listing relative to `root`, directories suffixed with `/`.
///
/// `pattern` filters entry names (case-insensitive glob). Names matching one
/// of `exclude` are skipped, and excluded directories are not descended.
/// Symlinked directories are listed but never followed. Only an unreadable
/// `root` is an error; entries below it that cannot be read are skipped.
pub fn walk(root: &Path, pattern: Option<&str>, exclude: &[String]) -> Result<Vec<String>, ToolError> {
    let include = pattern.map(name_matcher).transpose()?;
    let exclude = exclude_set(exclude)?;
    let _ = std::fs::read_dir(root)?;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !exclude.is_match(e.file_name()));
    let mut out = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if let Some(m) = &include {
            if !m.is_match(entry.file_name()) {
                continue;
            }
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let mut s = rel.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() || entry.path().is_dir() {
            s.push('/');
        }
        out.push(s);
    }
    out.sort();
    Ok(out)
}

fn name_matcher(pattern: &str) -> Result<GlobMatcher, ToolError> {
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ToolError::InvalidInput(format!("invalid pattern `{pattern}`: {e}")))?;
    Ok(glob.compile_matcher())
}

fn exclude_set(patterns: &[String]) -> Result<GlobSet, ToolError> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        let glob = GlobBuilder::new(p)
            .build()
            .map_err(|e| ToolError::InvalidInput(format!("invalid pattern `{p}`: {e}")))?;
        b.add(glob);
    }
    b.build()
        .map_err(|e| ToolError::InvalidInput(format!("invalid exclude patterns: {e}")))
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub accessed: Option<String>,
    pub is_dir: bool,
    pub is_file: bool,
    pub permissions: String,
}

impl FileInfo {
    /// `key: value` lines, led by the virtual path.
    pub fn render(&self, virtual_path: &str) -> String {
        let na = || "n/a".to_string();
        [
            format!("path: {virtual_path}"),
            format!("size: {}", self.size),
            format!("created: {}", self.created.clone().unwrap_or_else(na)),
            format!("modified: {}", self.modified.clone().unwrap_or_else(na)),
            format!("accessed: {}", self.accessed.clone().unwrap_or_else(na)),
            format!("isDirectory: {}", self.is_dir),
            format!("isFile: {}", self.is_file),
            format!("permissions: {}", self.permissions),
        ]
        .join("\n")
    }
}

pub fn file_info(path: &Path) -> Result<FileInfo, ToolError> {
    let meta = std::fs::metadata(path)?;
    Ok(FileInfo {
        size: meta.len(),
        created: changed_time(&meta).map(format_time),
        modified: meta.modified().ok().map(format_time),
        accessed: meta.accessed().ok().map(format_time),
        is_dir: meta.is_dir(),
        is_file: meta.is_file(),
        permissions: permission_bits(&meta),
    })
}

fn format_time(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format(TIME_FORMAT).to_string()
}

// st_ctime on unix, birth time elsewhere
#[cfg(unix)]
fn changed_time(meta: &std::fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u32::try_from(meta.ctime_nsec()).unwrap_or(0);
    SystemTime::UNIX_EPOCH.checked_add(std::time::Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn changed_time(meta: &std::fs::Metadata) -> Option<SystemTime> {
    meta.created().ok()
}

#[cfg(unix)]
fn permission_bits(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:03o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(meta: &std::fs::Metadata) -> String {
    let bits = if meta.permissions().readonly() { "444" } else { "666" };
    bits.to_string()
}

/// Renames `from` to `to`; refuses to replace an existing target.
pub fn move_path(from: &Path, to: &Path) -> Result<(), ToolError> {
    if std::fs::symlink_metadata(to).is_ok() {
        return Err(ToolError::AlreadyExists);
    }
    std::fs::rename(from, to)?;
    Ok(())
}

pub fn create_dir_all(path: &Path) -> Result<(), ToolError> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn head_and_tail_keep_line_endings() {
        let d = tempfile::tempdir().unwrap();
        let p = d.path().join("f.txt");
        fs::write(&p, "1\n2\n3\n4").unwrap();
        assert_eq!(head(&p, 2).unwrap(), "1\n2\n");
        assert_eq!(head(&p, 10).unwrap(), "1\n2\n3\n4");
        assert_eq!(tail(&p, 2).unwrap(), "3\n4");
        assert_eq!(tail(&p, 0).unwrap(), "");
    }

    #[test]
    fn list_dir_marks_directories() {
        let d = tempfile::tempdir().unwrap();
        fs::create_dir(d.path().join("b")).unwrap();
        fs::write(d.path().join("a.txt"), "").unwrap();
        let got = list_dir(d.path()).unwrap();
        assert_eq!(
            got,
            vec![
                DirEntry { name: "a.txt".into(), is_dir: false },
                DirEntry { name: "b".into(), is_dir: true },
            ]
        );
    }

    #[test]
    fn walk_filters_and_prunes() {
        let d = tempfile::tempdir().unwrap();
        fs::create_dir_all(d.path().join("src/nested")).unwrap();
        fs::create_dir_all(d.path().join("target/debug")).unwrap();
        fs::write(d.path().join("src/Main.RS"), "").unwrap();
        fs::write(d.path().join("src/nested/lib.rs"), "").unwrap();
        fs::write(d.path().join("target/debug/out.rs"), "").unwrap();
        fs::write(d.path().join("README.md"), "").unwrap();

        let all = walk(d.path(), None, &[]).unwrap();
        assert_eq!(
            all,
            vec![
                "README.md",
                "src/",
                "src/Main.RS",
                "src/nested/",
                "src/nested/lib.rs",
                "target/",
                "target/debug/",
                "target/debug/out.rs",
            ]
        );

        let rs = walk(d.path(), Some("*.rs"), &["target".to_string()]).unwrap();
        assert_eq!(rs, vec!["src/Main.RS", "src/nested/lib.rs"]);
    }

    #[test]
    fn walk_of_missing_root_fails() {
        let d = tempfile::tempdir().unwrap();
        let err = walk(&d.path().join("gone"), None, &[]).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;
        let d = tempfile::tempdir().unwrap();
        let locked = d.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.txt"), "").unwrap();
        fs::write(d.path().join("open.txt"), "").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let got = walk(d.path(), None, &[]);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let got = got.unwrap();
        assert!(got.contains(&"locked/".to_string()));
        assert!(got.contains(&"open.txt".to_string()));
    }

    #[test]
    fn bad_pattern_is_invalid_input() {
        let d = tempfile::tempdir().unwrap();
        let err = walk(d.path(), Some("a[b"), &[]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn file_info_reports_type_and_size() {
        let d = tempfile::tempdir().unwrap();
        let p = d.path().join("f.txt");
        fs::write(&p, "hello").unwrap();
        let info = file_info(&p).unwrap();
        assert_eq!(info.size, 5);
        assert!(info.is_file && !info.is_dir);
        assert_eq!(info.permissions.len(), 3);
        let text = info.render("/data/a/f.txt");
        assert!(text.starts_with("path: /data/a/f.txt\nsize: 5\n"));
        assert!(text.contains("isFile: true"));
    }

    #[test]
    fn move_refuses_existing_target() {
        let d = tempfile::tempdir().unwrap();
        let a = d.path().join("a");
        let b = d.path().join("b");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();
        assert!(matches!(move_path(&a, &b), Err(ToolError::AlreadyExists)));
        let c = d.path().join("c");
        move_path(&a, &c).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read_to_string(c).unwrap(), "a");
    }
}
