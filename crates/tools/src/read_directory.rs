//! Directory listing tool, aware of `.gitignore` and `.ignore` files.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;
use ignore::WalkBuilder;

pub struct ReadDirectoryTool {
    sandbox: Sandbox,
    respect_ignore_files: bool,
}

impl ReadDirectoryTool {
    pub fn new(sandbox: Sandbox, respect_ignore_files: bool) -> Self {
        Self {
            sandbox,
            respect_ignore_files,
        }
    }
}

fn list_files(root: &Path, recursive: bool, respect_ignore_files: bool) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.follow_links(false);
    builder.hidden(false);
    builder.parents(respect_ignore_files);
    builder.ignore(respect_ignore_files);
    builder.git_ignore(respect_ignore_files);
    builder.git_exclude(respect_ignore_files);
    builder.git_global(false);
    builder.require_git(false);
    builder.filter_entry(|entry| entry.file_name() != OsStr::new(".git"));
    if !recursive {
        builder.max_depth(Some(1));
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping unreadable entry"),
        }
    }
    files.sort();
    files
}

#[async_trait]
impl Tool for ReadDirectoryTool {
    fn name(&self) -> &str {
        "readDirectory"
    }

    fn description(&self) -> &str {
        "Reads the contents of a directory and returns an array of strings containing the full paths of the directory contents."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directoryPath": {
                    "type": "string",
                    "description": "The relative or absolute directory path"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Descend into subdirectories",
                    "default": true
                }
            },
            "required": ["directoryPath"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let directory_path = arguments["directoryPath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'directoryPath' argument".into()))?;
        let recursive = arguments["recursive"].as_bool().unwrap_or(true);

        let dir = self.sandbox.resolve(directory_path)?;
        if !dir.is_dir() {
            return Err(ToolError::failed(
                self.name(),
                format!("'{directory_path}' is not a directory"),
            ));
        }
        tracing::info!(path = %dir.display(), recursive, "Reading directory");

        let respect = self.respect_ignore_files;
        let files = tokio::task::spawn_blocking(move || list_files(&dir, recursive, respect))
            .await
            .map_err(|e| ToolError::Fatal(format!("directory walk panicked: {e}")))?;

        let paths: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let output = serde_json::to_string(&paths)
            .map_err(|e| ToolError::failed(self.name(), e))?;
        Ok(ToolResult::ok(output))
    }
}
