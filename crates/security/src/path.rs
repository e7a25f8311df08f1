//! Path validation: filesystem sandboxing to the workspace directory.
//!
//! Tools receive paths from the model. Relative paths are resolved against
//! the workspace root; absolute paths are accepted only when they land
//! inside it after symlinks and `..` components are resolved.

use std::path::{Component, Path, PathBuf};

use handoff_core::ToolError;

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside the workspace root '{root}'")]
    OutsideRoot { path: String, root: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

impl From<PathValidationError> for ToolError {
    fn from(e: PathValidationError) -> Self {
        ToolError::SandboxViolation(e.to_string())
    }
}

/// The workspace every filesystem tool is confined to.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathValidationError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { root: canonical })
    }

    /// The canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path to an absolute path inside the root.
    ///
    /// The target does not need to exist. The nearest existing ancestor is
    /// canonicalized so a symlink pointing out of the workspace is caught
    /// even when the final component is new.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let input = Path::new(path);
        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };
        let normalized = normalize(&joined);

        let mut existing = normalized.as_path();
        let mut missing = Vec::new();
        while !existing.exists() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => break,
            }
        }

        let mut resolved = existing
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: path.into(),
                reason: e.to_string(),
            })?;
        for name in missing.iter().rev() {
            resolved.push(name);
        }

        if !resolved.starts_with(&self.root) {
            tracing::warn!(path, root = %self.root.display(), "Rejected path outside workspace");
            return Err(PathValidationError::OutsideRoot {
                path: path.into(),
                root: self.root.display().to_string(),
            });
        }

        Ok(resolved)
    }
}

/// Lexically apply `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
