//! JavaScript/TypeScript module specifier resolution.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use handoff_core::{Tool, ToolError, ToolResult};
use handoff_security::Sandbox;

pub struct ResolveModuleTool {
    sandbox: Sandbox,
}

impl ResolveModuleTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    async fn resolve_specifier(&self, specifier: &str, importer: &Path) -> Result<Option<String>, ToolError> {
        if specifier.starts_with("node:") || specifier.contains("://") {
            return Ok(Some(specifier.to_string()));
        }

        let base = importer.parent().unwrap_or(self.sandbox.root());
        let candidate = if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/') {
            let joined = base.join(specifier);
            self.sandbox.resolve(&joined.to_string_lossy())?
        } else {
            match self.resolve_package(specifier, base).await? {
                Some(path) => path,
                None => return Ok(None),
            }
        };

        if candidate.extension().is_some() {
            return Ok(Some(candidate.to_string_lossy().into_owned()));
        }
        for extension in ["js", "ts"] {
            let with_extension = candidate.with_extension(extension);
            if tokio::fs::try_exists(&with_extension).await.unwrap_or(false) {
                return Ok(Some(with_extension.to_string_lossy().into_owned()));
            }
        }
        Ok(None)
    }

    /// Look for `node_modules/<package>` in `base` and each ancestor up to
    /// the workspace root.
    async fn resolve_package(&self, specifier: &str, base: &Path) -> Result<Option<PathBuf>, ToolError> {
        let (package, subpath) = split_package(specifier);
        let mut dir = Some(base);
        while let Some(current) = dir {
            let package_dir = current.join("node_modules").join(package);
            if tokio::fs::try_exists(&package_dir).await.unwrap_or(false) {
                let entry = match subpath {
                    Some(sub) => sub.to_string(),
                    None => package_entry(&package_dir).await,
                };
                let resolved = self.sandbox.resolve(&package_dir.join(entry).to_string_lossy())?;
                return Ok(Some(resolved));
            }
            if current == self.sandbox.root() {
                break;
            }
            dir = current.parent();
        }
        Ok(None)
    }
}

/// Split `@scope/name/sub/path` or `name/sub/path` into package and subpath.
fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut split_at = None;
    for (seen, (i, _)) in specifier.match_indices('/').enumerate() {
        if seen + 1 == name_segments {
            split_at = Some(i);
            break;
        }
    }
    match split_at {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

/// The package's entry point: `module`, then `main`, else `index.js`.
async fn package_entry(package_dir: &Path) -> String {
    let manifest = tokio::fs::read_to_string(package_dir.join("package.json"))
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok());
    manifest
        .as_ref()
        .and_then(|m| {
            ["module", "main"]
                .iter()
                .find_map(|key| m.get(*key).and_then(|v| v.as_str()))
        })
        .unwrap_or("index.js")
        .to_string()
}

#[async_trait]
impl Tool for ResolveModuleTool {
    fn name(&self) -> &str {
        "resolveModule"
    }

    fn description(&self) -> &str {
        "Resolves a JavaScript or TypeScript module specifier to a file path"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "moduleSpecifier": {
                    "type": "string",
                    "description": "A string that specifies a potentially importable module. This may be a relative path (such as \"./lib/helper.js\"), a bare name (such as \"my-module\"), or an absolute path"
                },
                "filePath": {
                    "type": "string",
                    "description": "The relative or absolute file path from which the import will be resolved"
                }
            },
            "required": ["moduleSpecifier", "filePath"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let specifier = arguments["moduleSpecifier"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'moduleSpecifier' argument".into()))?;
        let file_path = arguments["filePath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filePath' argument".into()))?;

        tracing::info!(specifier, from = file_path, "Resolving module");
        let importer = self.sandbox.resolve(file_path)?;

        match self.resolve_specifier(specifier, &importer).await? {
            Some(resolved) => Ok(ToolResult::ok(resolved)),
            None => Err(ToolError::failed(
                self.name(),
                format!("Could not resolve module '{specifier}' from '{file_path}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, ResolveModuleTool) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/lib")).unwrap();
        std::fs::write(root.join("src/index.ts"), "").unwrap();
        std::fs::write(root.join("src/lib/helper.ts"), "").unwrap();
        std::fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
        std::fs::write(
            root.join("node_modules/left-pad/package.json"),
            r#"{ "name": "left-pad", "main": "lib/main.js", "module": "esm/index.mjs" }"#,
        )
        .unwrap();
        std::fs::create_dir_all(root.join("node_modules/@acme/util")).unwrap();
        std::fs::write(root.join("node_modules/@acme/util/package.json"), "{}").unwrap();
        let tool = ResolveModuleTool::new(Sandbox::new(root).unwrap());
        (dir, tool)
    }

    async fn resolve(tool: &ResolveModuleTool, specifier: &str) -> Result<String, ToolError> {
        tool.execute(serde_json::json!({
            "moduleSpecifier": specifier,
            "filePath": "src/index.ts"
        }))
        .await
        .map(|r| r.output)
    }

    #[tokio::test]
    async fn relative_specifier_tries_js_then_ts() {
        let (_dir, tool) = setup();
        let resolved = resolve(&tool, "./lib/helper").await.unwrap();
        assert_eq!(resolved, tool.sandbox.root().join("src/lib/helper.ts").to_string_lossy());
    }

    #[tokio::test]
    async fn bare_name_prefers_module_field() {
        let (_dir, tool) = setup();
        let resolved = resolve(&tool, "left-pad").await.unwrap();
        assert!(resolved.ends_with("node_modules/left-pad/esm/index.mjs"), "{resolved}");
    }

    #[tokio::test]
    async fn scoped_package_falls_back_to_index() {
        let (_dir, tool) = setup();
        let resolved = resolve(&tool, "@acme/util").await.unwrap();
        assert!(resolved.ends_with("node_modules/@acme/util/index.js"), "{resolved}");
    }

    #[tokio::test]
    async fn builtin_passes_through() {
        let (_dir, tool) = setup();
        assert_eq!(resolve(&tool, "node:fs").await.unwrap(), "node:fs");
    }

    #[tokio::test]
    async fn unresolvable_module_is_reported() {
        let (_dir, tool) = setup();
        let err = resolve(&tool, "./lib/missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tool execution failed: resolveModule — Could not resolve module './lib/missing' from 'src/index.ts'"
        );
    }

    #[test]
    fn package_splitting() {
        assert_eq!(split_package("react"), ("react", None));
        assert_eq!(split_package("react/jsx-runtime"), ("react", Some("jsx-runtime")));
        assert_eq!(split_package("@scope/pkg/deep/file"), ("@scope/pkg", Some("deep/file")));
    }
}
