//! Fuzzy search-and-replace over a file's lines.
//!
//! Models rarely reproduce a file's text byte for byte. Each modification
//! slides a window the height of its pattern over the file and replaces the
//! first window that is similar enough.

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Modification {
    pattern: String,
    replacement: String,
}

pub struct ModifyFileTool {
    sandbox: Sandbox,
    threshold: f64,
}

impl ModifyFileTool {
    pub fn new(sandbox: Sandbox, threshold: f64) -> Self {
        Self { sandbox, threshold }
    }
}

/// Convert `\r\n` and lone `\r` to `\n`.
pub(crate) fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Lowercase and collapse runs of whitespace to one space.
fn fold(text: &str) -> Vec<char> {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .collect()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity in `[0, 1]`, ignoring case and whitespace layout.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (fold(a), fold(b));
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Replace the first window of lines that matches `pattern`.
pub fn fuzzy_replace(content: &str, pattern: &str, replacement: &str, threshold: f64) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let height = pattern.split('\n').count();
    if height > lines.len() {
        return None;
    }

    (0..=lines.len() - height).find_map(|start| {
        let window = lines[start..start + height].join("\n");
        if similarity(&window, pattern) <= threshold {
            return None;
        }
        let mut out: Vec<&str> = Vec::with_capacity(lines.len());
        out.extend_from_slice(&lines[..start]);
        out.push(replacement);
        out.extend_from_slice(&lines[start + height..]);
        Some(out.join("\n"))
    })
}

#[async_trait]
impl Tool for ModifyFileTool {
    fn name(&self) -> &str {
        "modifyFile"
    }

    fn description(&self) -> &str {
        "Makes one or more modifications to a file by replacing the first instance of a pattern with a replacement"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The relative or absolute file path"
                },
                "modifications": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "pattern": {
                                "type": "string",
                                "description": "The substring pattern to find"
                            },
                            "replacement": {
                                "type": "string",
                                "description": "The substring replacement"
                            }
                        },
                        "required": ["pattern", "replacement"]
                    }
                }
            },
            "required": ["filePath", "modifications"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let file_path = arguments["filePath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filePath' argument".into()))?;
        let modifications: Vec<Modification> =
            serde_json::from_value(arguments["modifications"].clone())
                .map_err(|e| ToolError::InvalidArguments(format!("Invalid 'modifications': {e}")))?;
        if modifications.is_empty() {
            return Err(ToolError::InvalidArguments("No modifications provided".into()));
        }

        let path = self.sandbox.resolve(file_path)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to read {}: {e}", path.display())))?;

        let mut content = normalize_line_endings(&original);
        for (i, m) in modifications.iter().enumerate() {
            content = fuzzy_replace(&content, &m.pattern, &m.replacement, self.threshold).ok_or_else(|| {
                ToolError::PatchMismatch(format!(
                    "Unable to replace, no matches found for modification {}",
                    i + 1
                ))
            })?;
        }

        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to write {}: {e}", path.display())))?;

        tracing::info!(
            path = %path.display(),
            modifications = modifications.len(),
            "Modified file"
        );
        Ok(ToolResult::ok(format!(
            "Applied {} modification(s) to {file_path}",
            modifications.len()
        )))
    }
}
