//! Error types for the handoff domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` aggregates them.

use thiserror::Error;

/// The top-level error type for all handoff operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors (fatal to the current turn) ---
    #[error("Transport error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors that escaped the invocation boundary ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Caller mistakes ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a configuration error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the model transport. A `ProviderError` terminates the turn
/// it happened in and is returned to the caller of `send_message`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures raised by tool handlers.
///
/// Most variants are recoverable: the invocation boundary converts them to
/// their display string and hands that to the model as the tool output.
/// `Transport` and `Fatal` are not converted and abort the turn.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("Patch mismatch: {0}")]
    PatchMismatch(String),

    #[error("Delegation '{tool_name}' failed: no message returned by the delegated runner")]
    DelegationResultMissing { tool_name: String },

    #[error("Delegation '{tool_name}' refused: maximum delegation depth of {max_depth} reached")]
    DelegationDepthExceeded { tool_name: String, max_depth: u32 },

    #[error("Delegated turn failed: {0}")]
    Transport(ProviderError),

    #[error("Fatal tool failure: {0}")]
    Fatal(String),
}

impl ToolError {
    /// Whether this error should be reported to the model as tool output
    /// instead of aborting the turn.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::Fatal(_))
    }

    /// Shorthand for an `ExecutionFailed` error.
    pub fn failed(tool_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        match err {
            Error::Provider(e) => ToolError::Transport(e),
            Error::Tool(e) => e,
            Error::InvalidInput(reason) => ToolError::InvalidArguments(reason),
            other => ToolError::Fatal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn recoverable_classification() {
        assert!(ToolError::NotFound("x".into()).is_recoverable());
        assert!(ToolError::SandboxViolation("/etc".into()).is_recoverable());
        assert!(ToolError::PatchMismatch("a.rs".into()).is_recoverable());
        assert!(
            ToolError::DelegationResultMissing {
                tool_name: "assignToDeveloper".into()
            }
            .is_recoverable()
        );
        assert!(!ToolError::Fatal("boom".into()).is_recoverable());
        assert!(!ToolError::Transport(ProviderError::Network("down".into())).is_recoverable());
    }

    #[test]
    fn delegation_missing_mentions_no_message() {
        let err = ToolError::DelegationResultMissing {
            tool_name: "assignToDeveloper".into(),
        };
        assert!(err.to_string().contains("no message"));
        assert!(err.to_string().contains("assignToDeveloper"));
    }

    #[test]
    fn transport_error_survives_conversion_to_tool_error() {
        let err: ToolError = Error::Provider(ProviderError::Network("reset".into())).into();
        assert!(matches!(err, ToolError::Transport(ProviderError::Network(_))));

        let err: ToolError = Error::config("unknown role").into();
        assert!(matches!(err, ToolError::Fatal(_)));
    }

    #[test]
    fn invalid_input_becomes_recoverable_tool_error() {
        let err: ToolError = Error::InvalidInput("message text must not be empty".into()).into();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.is_recoverable());
    }
}
