//! Segment patches.
//!
//! A patch is a list of segments, each opened by a header line:
//!
//! ```text
//! @@@
//! @@@ line >= 12 @@@
//! ```
//!
//! Body lines starting with `-` are expected in the file and removed, lines
//! starting with `+` are inserted, anything else is context (one leading
//! space is stripped) and must match exactly. Segments are applied in order;
//! each one searches forward from where the previous one ended.

use thiserror::Error;

pub const SEGMENT_DELIMITER: &str = "@@@";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("invalid patch: {0}")]
    Format(String),
    #[error("segment {segment}: {reason}")]
    Apply { segment: usize, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSegment {
    /// 1-based line the search may start from (`line >= N`).
    pub min_line: Option<usize>,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

/// Splits patch text into segments.
pub fn parse(patch_text: &str) -> Result<Vec<PatchSegment>, PatchError> {
    let mut segments = Vec::new();
    let mut current: Option<PatchSegment> = None;
    for (i, line) in patch_text.lines().enumerate() {
        if let Some(rest) = line.strip_prefix(SEGMENT_DELIMITER) {
            let min_line = parse_header(rest, i + 1)?;
            if let Some(seg) = current.take() {
                segments.push(seg);
            }
            current = Some(PatchSegment {
                min_line,
                ..Default::default()
            });
            continue;
        }
        // text before the first header is ignored
        let Some(seg) = current.as_mut() else {
            continue;
        };
        if let Some(removed) = line.strip_prefix('-') {
            seg.from.push(removed.to_string());
        } else if let Some(added) = line.strip_prefix('+') {
            seg.to.push(added.to_string());
        } else {
            let ctx = line.strip_prefix(' ').unwrap_or(line);
            seg.from.push(ctx.to_string());
            seg.to.push(ctx.to_string());
        }
    }
    if let Some(seg) = current {
        segments.push(seg);
    }
    if segments.is_empty() {
        return Err(PatchError::Format(format!(
            "no segment header (`{SEGMENT_DELIMITER}`) found"
        )));
    }
    Ok(segments)
}

fn parse_header(rest: &str, line_no: usize) -> Result<Option<usize>, PatchError> {
    let mut body = rest.trim();
    if let Some(inner) = body.strip_suffix(SEGMENT_DELIMITER) {
        body = inner.trim();
    }
    if body.is_empty() {
        return Ok(None);
    }
    let bad = || {
        PatchError::Format(format!(
            "line {line_no}: unrecognized segment header `{SEGMENT_DELIMITER}{rest}`"
        ))
    };
    let number = body
        .strip_prefix("line")
        .map(str::trim_start)
        .and_then(|s| s.strip_prefix(">="))
        .map(str::trim)
        .ok_or_else(bad)?;
    match number.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(Some(n)),
        _ => Err(PatchError::Format(format!(
            "line {line_no}: `line >= {number}` needs a positive line number"
        ))),
    }
}

/// How one line ends. Only the last line of a file may have no ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Lf,
    CrLf,
    Missing,
}

impl Ending {
    fn as_str(self) -> &'static str {
        match self {
            Ending::Lf => "\n",
            Ending::CrLf => "\r\n",
            Ending::Missing => "",
        }
    }
}

/// Working copy of the file plus the search cursor, for one `apply` call.
#[derive(Debug, Clone)]
pub struct ApplyState {
    lines: Vec<String>,
    endings: Vec<Ending>,
    // ending given to lines that replace nothing
    main_ending: Ending,
    cursor: usize,
    warnings: Vec<String>,
}

impl ApplyState {
    pub fn new(lines: Vec<String>) -> Self {
        let endings = vec![Ending::Lf; lines.len()];
        Self {
            lines,
            endings,
            main_ending: Ending::Lf,
            cursor: 0,
            warnings: Vec::new(),
        }
    }

    /// Splits `content` keeping each line's own terminator.
    fn from_text(content: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        for piece in content.split_inclusive('\n') {
            let (text, ending) = if let Some(t) = piece.strip_suffix("\r\n") {
                (t, Ending::CrLf)
            } else if let Some(t) = piece.strip_suffix('\n') {
                (t, Ending::Lf)
            } else {
                (piece, Ending::Missing)
            };
            lines.push(text.to_string());
            endings.push(ending);
        }
        let crlf = endings.iter().filter(|e| **e == Ending::CrLf).count();
        let lf = endings.iter().filter(|e| **e == Ending::Lf).count();
        Self {
            lines,
            endings,
            main_ending: if crlf > lf { Ending::CrLf } else { Ending::Lf },
            cursor: 0,
            warnings: Vec::new(),
        }
    }

    fn text(&self) -> String {
        self.lines
            .iter()
            .zip(&self.endings)
            .flat_map(|(l, e)| [l.as_str(), e.as_str()])
            .collect()
    }

    /// 0-based line where the next segment starts searching.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Applies one segment; `number` is its 1-based position in the patch.
    pub fn apply_segment(&mut self, number: usize, seg: &PatchSegment) -> Result<(), PatchError> {
        let mut start = self.cursor;
        if let Some(n) = seg.min_line {
            let hinted = n.saturating_sub(1);
            if hinted >= self.cursor {
                start = hinted;
            } else {
                let msg = format!(
                    "segment {number}: hint `line >= {n}` points before line {}, ignored",
                    self.cursor + 1
                );
                tracing::warn!("{msg}");
                self.warnings.push(msg);
            }
        }

        let at = if seg.from.is_empty() {
            if start > self.lines.len() {
                return Err(PatchError::Apply {
                    segment: number,
                    reason: format!(
                        "insertion point line {} is past the end of the file ({} lines)",
                        start + 1,
                        self.lines.len()
                    ),
                });
            }
            start
        } else {
            find_window(&self.lines, &seg.from, start).ok_or_else(|| PatchError::Apply {
                segment: number,
                reason: format!(
                    "expected lines not found at or after line {}: {:?}",
                    start + 1,
                    preview(&seg.from)
                ),
            })?
        };

        let endings = self.block_endings(at, seg.from.len(), seg.to.len());
        self.lines
            .splice(at..at + seg.from.len(), seg.to.iter().cloned());
        self.endings.splice(at..at + seg.from.len(), endings);
        self.cursor = at + seg.to.len();
        tracing::debug!(
            segment = number,
            at,
            removed = seg.from.len(),
            inserted = seg.to.len(),
            cursor = self.cursor,
            "segment applied"
        );
        Ok(())
    }

    /// Endings for `inserted` lines replacing `removed` lines at `at`.
    /// Replacements inherit the endings of the lines they replace; extra
    /// lines get the file's main ending. A missing final newline stays
    /// missing and stays last.
    fn block_endings(&mut self, at: usize, removed: usize, inserted: usize) -> Vec<Ending> {
        let old = &self.endings[at..at + removed];
        let keep = old.len().saturating_sub(1);
        let mut out: Vec<Ending> = (0..inserted)
            .map(|i| if i < keep { old[i] } else { self.main_ending })
            .collect();
        let last_old = old.last().copied();
        if let (Some(last), Some(o)) = (out.last_mut(), last_old) {
            *last = o;
        }
        let at_eof = at + removed == self.endings.len();
        if at_eof && at > 0 && self.endings[at - 1] == Ending::Missing && inserted > 0 {
            // appending after an unterminated last line
            self.endings[at - 1] = self.main_ending;
            if let Some(last) = out.last_mut() {
                *last = Ending::Missing;
            }
        }
        if inserted == 0 && last_old == Some(Ending::Missing) && at > 0 {
            self.endings[at - 1] = Ending::Missing;
        }
        out
    }
}

/// First window at or after `start` equal to `needle`. No fuzzing.
fn find_window(lines: &[String], needle: &[String], start: usize) -> Option<usize> {
    if start > lines.len() || needle.len() > lines.len() - start {
        return None;
    }
    lines[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + start)
}

fn preview(lines: &[String]) -> &str {
    lines.first().map(String::as_str).unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub content: String,
    pub report: String,
    pub warnings: Vec<String>,
    pub segments: usize,
    /// Cursor after the last segment.
    pub cursor: usize,
}

/// Applies `patch_text` to `original` in memory. Either every segment
/// applies or an error is returned and nothing changes.
pub fn apply(original: &str, patch_text: &str) -> Result<Applied, PatchError> {
    let segments = parse(patch_text)?;
    let mut state = ApplyState::from_text(original);
    for (i, seg) in segments.iter().enumerate() {
        state.apply_segment(i + 1, seg)?;
    }
    let mut report = format!("Applied {} segment(s).", segments.len());
    for w in &state.warnings {
        report.push_str("\nWarning: ");
        report.push_str(w);
    }
    Ok(Applied {
        content: state.text(),
        report,
        segments: segments.len(),
        cursor: state.cursor,
        warnings: state.warnings,
    })
}
