//! Built-in tool implementations for handoff.
//!
//! Every tool here works on files inside a single workspace directory,
//! enforced by [`handoff_security::Sandbox`]. Roles pick tools from the
//! catalog by name.

pub mod apply_patch;
pub mod current_directory;
pub mod file_read;
pub mod file_write;
pub mod modify_file;
pub mod read_directory;
pub mod resolve_module;

use std::sync::Arc;

use handoff_config::ToolsConfig;
use handoff_core::Tool;
use handoff_security::Sandbox;

/// Names of every tool in the catalog, in registration order.
pub const FILE_TOOLS: &[&str] = &[
    "currentWorkingDirectory",
    "readFile",
    "readDirectory",
    "resolveModule",
    "writeFile",
    "modifyFile",
    "applyPatch",
];

/// Tools that never change the workspace.
pub const READ_ONLY_TOOLS: &[&str] = &[
    "currentWorkingDirectory",
    "readFile",
    "readDirectory",
    "resolveModule",
];

/// Build the catalog of filesystem tools for one workspace.
pub fn builtin_tools(sandbox: &Sandbox, config: &ToolsConfig) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(current_directory::CurrentDirectoryTool::new(sandbox.clone())),
        Arc::new(file_read::FileReadTool::new(sandbox.clone())),
        Arc::new(read_directory::ReadDirectoryTool::new(
            sandbox.clone(),
            config.respect_ignore_files,
        )),
        Arc::new(resolve_module::ResolveModuleTool::new(sandbox.clone())),
        Arc::new(file_write::FileWriteTool::new(sandbox.clone(), config.write_policy)),
        Arc::new(modify_file::ModifyFileTool::new(sandbox.clone(), config.fuzzy_threshold)),
        Arc::new(apply_patch::ApplyPatchTool::new(sandbox.clone())),
    ]
}
