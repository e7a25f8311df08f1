//! Unified diff application.
//!
//! Hunks must match the file's lines exactly, but may sit at a different
//! line than their header claims. Each hunk is searched for outward from
//! its declared position, never before the end of the previous hunk.

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;

use crate::modify_file::normalize_line_endings;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Default)]
struct Hunk {
    old_start: usize,
    lines: Vec<Line>,
}

impl Hunk {
    fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                Line::Context(s) | Line::Remove(s) => Some(s.as_str()),
                Line::Add(_) => None,
            })
            .collect()
    }

    fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                Line::Context(s) | Line::Add(s) => Some(s.as_str()),
                Line::Remove(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Patch {
    hunks: Vec<Hunk>,
    /// `Some(false)` when the new file must not end with a newline,
    /// `Some(true)` when a missing final newline is being added.
    trailing_newline: Option<bool>,
}

fn parse_hunk_start(header: &str) -> Option<usize> {
    let old = header.strip_prefix("@@ -")?.split_whitespace().next()?;
    let start = old.split(',').next()?.parse::<usize>().ok()?;
    Some(start)
}

fn parse_patch(text: &str) -> Option<Patch> {
    let mut patch = Patch::default();
    let mut current: Option<Hunk> = None;
    let mut last_kind: Option<char> = None;

    let text = normalize_line_endings(text);
    let raw_lines: Vec<&str> = text.split('\n').collect();
    for (i, &raw) in raw_lines.iter().enumerate() {
        if raw.starts_with("@@") {
            if let Some(hunk) = current.take() {
                patch.hunks.push(hunk);
            }
            current = Some(Hunk {
                old_start: parse_hunk_start(raw)?,
                lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // Headers (`diff`, `index`, `---`, `+++`) before the first hunk.
            continue;
        };

        if raw.starts_with("--- ") && raw_lines.get(i + 1).is_some_and(|next| next.starts_with("+++ ")) {
            // Start of a second file's diff.
            break;
        }

        if raw.starts_with('\\') {
            match last_kind {
                Some('+') => patch.trailing_newline = Some(false),
                Some(' ') => patch.trailing_newline = Some(false),
                Some('-') if patch.trailing_newline.is_none() => patch.trailing_newline = Some(true),
                _ => {}
            }
            continue;
        }

        let (kind, body) = match raw.chars().next() {
            Some(c @ (' ' | '-' | '+')) => (c, &raw[1..]),
            None => (' ', ""),
            Some(_) => return None,
        };
        last_kind = Some(kind);
        hunk.lines.push(match kind {
            '-' => Line::Remove(body.to_string()),
            '+' => Line::Add(body.to_string()),
            _ => Line::Context(body.to_string()),
        });
    }

    if let Some(mut hunk) = current.take() {
        // A blank final line comes from the patch text's own trailing newline.
        if hunk.lines.last() == Some(&Line::Context(String::new())) {
            hunk.lines.pop();
        }
        patch.hunks.push(hunk);
    }
    Some(patch)
}

fn matches_at(lines: &[String], at: usize, expected: &[&str]) -> bool {
    at + expected.len() <= lines.len() && lines[at..at + expected.len()].iter().zip(expected).all(|(a, b)| a == b)
}

/// Find the hunk's position, trying the declared line first and then
/// alternating further below and above it.
fn locate(lines: &[String], expected: &[&str], declared: usize, floor: usize) -> Option<usize> {
    let declared = declared.max(floor);
    let max_start = lines.len().checked_sub(expected.len())?;
    let reach = max_start.max(declared);
    for offset in 0..=reach {
        let below = declared + offset;
        if below <= max_start && matches_at(lines, below, expected) {
            return Some(below);
        }
        if offset > 0
            && let Some(above) = declared.checked_sub(offset)
            && above >= floor
            && matches_at(lines, above, expected)
        {
            return Some(above);
        }
    }
    None
}

/// Apply a unified diff to `content`. Returns `None` when any hunk fails.
pub fn apply_unified_diff(content: &str, patch_text: &str) -> Option<String> {
    let patch = parse_patch(patch_text)?;
    if patch.hunks.is_empty() {
        return None;
    }

    let content = normalize_line_endings(content);
    let mut trailing = content.ends_with('\n');
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    if trailing || content.is_empty() {
        lines.pop();
    }

    let mut floor = 0;
    let mut shift: isize = 0;
    for hunk in &patch.hunks {
        let old = hunk.old_lines();
        let new = hunk.new_lines();
        let declared = (hunk.old_start.saturating_sub(1) as isize + shift).max(0) as usize;
        let at = if old.is_empty() {
            declared.max(floor).min(lines.len())
        } else {
            locate(&lines, &old, declared, floor)?
        };
        lines.splice(at..at + old.len(), new.iter().map(|s| s.to_string()));
        floor = at + new.len();
        shift += new.len() as isize - old.len() as isize;
    }

    if let Some(t) = patch.trailing_newline {
        trailing = t;
    }
    let mut out = lines.join("\n");
    if trailing && !lines.is_empty() {
        out.push('\n');
    }
    Some(out)
}

pub struct ApplyPatchTool {
    sandbox: Sandbox,
}

impl ApplyPatchTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        "applyPatch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff patch to a file"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The relative or absolute path of the file to patch"
                },
                "patch": {
                    "type": "string",
                    "description": "The unified diff to apply"
                }
            },
            "required": ["name", "patch"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = arguments["name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'name' argument".into()))?;
        let patch = arguments["patch"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'patch' argument".into()))?;

        let path = self.sandbox.resolve(name)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to read {}: {e}", path.display())))?;

        let patched = apply_unified_diff(&original, patch)
            .ok_or_else(|| ToolError::PatchMismatch(format!("Unable to patch {name}")))?;

        tokio::fs::write(&path, patched)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to write {}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), "Patched file");
        Ok(ToolResult::ok(format!("Patched {name}")))
    }
}
