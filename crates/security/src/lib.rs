//! Security module for handoff: keeps filesystem tools inside the workspace.
//!
//! Every path a tool touches goes through [`Sandbox::resolve`], which
//! resolves it against the workspace root and refuses anything that
//! escapes it, including escapes through `..` or symlinks.

pub mod path;

pub use path::{PathValidationError, Sandbox};
