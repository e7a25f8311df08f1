//! Model transport implementations for handoff.
//!
//! All transports implement the `handoff_core::Provider` trait. The agent
//! only ever sees `Arc<dyn Provider>`.

pub mod openai_compat;

use std::sync::Arc;

use handoff_config::AppConfig;
use handoff_core::{Credentials, Provider, ProviderError};

pub use openai_compat::OpenAiCompatProvider;

/// Build the transport described by the configuration.
pub fn build_from_config(
    config: &AppConfig,
    credentials: Credentials,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = if config.api_url.contains("api.openai.com") {
        "openai"
    } else {
        "openai-compatible"
    };
    tracing::debug!(provider = name, url = %config.api_url, "Building transport");
    let provider = OpenAiCompatProvider::new(name, &config.api_url, credentials)?;
    Ok(Arc::new(provider))
}
