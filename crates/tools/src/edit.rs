// # -----------------------------
// # crates/tools/src/edit.rs
// # -----------------------------
// Line-anchored text replacement, reported as a unified diff.

use serde::Deserialize;
use similar::TextDiff;

const CONTEXT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditOp {
    #[serde(rename = "oldText")]
    pub old_text: String,
    #[serde(rename = "newText")]
    pub new_text: String,
}

/// Replaces every occurrence of `old` that starts a line and ends at a line
/// break (or end of text). The line break itself is kept. Returns the new
/// text and the number of replacements.
pub fn replace_lines(content: &str, old: &str, new: &str) -> (String, usize) {
    let line_starts = std::iter::once(0).chain(
        content
            .bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(i, _)| i + 1),
    );
    let mut out = String::with_capacity(content.len());
    let mut count = 0;
    let mut copied = 0;
    for pos in line_starts {
        if pos < copied || !content[pos..].starts_with(old) {
            continue;
        }
        let end = pos + old.len();
        let at_line_end =
            end == content.len() || matches!(content.as_bytes()[end], b'\n' | b'\r');
        if at_line_end {
            out.push_str(&content[copied..pos]);
            out.push_str(new);
            copied = end;
            count += 1;
        }
    }
    out.push_str(&content[copied..]);
    (out, count)
}

/// Applies `edits` in order.
pub fn apply_edits(content: &str, edits: &[EditOp]) -> String {
    edits.iter().fold(content.to_string(), |acc, e| {
        let (next, n) = replace_lines(&acc, &e.old_text, &e.new_text);
        tracing::debug!(replacements = n, "edit applied");
        next
    })
}

/// Unified diff of `old` → `new` labelled with `label` on both sides,
/// one hunk per changed region with three lines of context. Identical
/// inputs give an empty string.
pub fn unified_diff(old: &str, new: &str, label: &str) -> String {
    if old == new {
        return String::new();
    }
    let diff = TextDiff::from_lines(old, new);
    let text = diff
        .unified_diff()
        .context_radius(CONTEXT)
        .header(label, label)
        .to_string();
    text
}
