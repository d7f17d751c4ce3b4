//! OpenAI-compatible client configuration.
//!
//! Gemini is reached through its OpenAI-compatible endpoint, so both providers
//! share one client type and differ only in base URL and key.

use crate::error::{GigmatchError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Client type used for chat and embeddings.
pub type ApiClient = Client<OpenAIConfig>;

/// Create a client for the given endpoint with the default timeout.
pub fn create_client(api_base: &str, api_key: &str) -> Result<ApiClient> {
    create_client_with_timeout(api_base, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for the given endpoint with a custom timeout.
pub fn create_client_with_timeout(
    api_base: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<ApiClient> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GigmatchError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let config = OpenAIConfig::new()
        .with_api_base(api_base.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}
