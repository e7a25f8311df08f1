//! # handoff core
//!
//! Domain types, traits, and error definitions for the handoff delegation
//! runtime. This crate has **no framework dependencies** beyond `tokio::sync`:
//! it defines the model that the transport, tools, and agent crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the agent core talks to is a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping the model transport via configuration
//! - Testing the runtime with scripted transports and stub tools
//! - A clean dependency graph (all crates depend inward on core)

pub mod credentials;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod validation;

// Re-export key types at crate root for ergonomics
pub use credentials::Credentials;
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
