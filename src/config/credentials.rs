//! Credential resolution.
//!
//! Every secret is looked up in the same order: an explicit value (config file
//! or caller-supplied), then the environment, then startup fails.

use super::{ModelProvider, Settings, StoreProvider};
use crate::error::{GigmatchError, Result};
use tracing::debug;

/// Resolved credentials for the configured providers.
#[derive(Clone)]
pub struct Credentials {
    /// API key for the chat model provider.
    pub model_api_key: String,
    /// API key for the embedding provider.
    pub embedding_api_key: String,
    /// Qdrant endpoint and key, when the Qdrant store is selected.
    pub qdrant: Option<QdrantCredentials>,
}

/// Qdrant connection details.
#[derive(Clone)]
pub struct QdrantCredentials {
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("model_api_key", &mask(&self.model_api_key))
            .field("embedding_api_key", &mask(&self.embedding_api_key))
            .field("qdrant", &self.qdrant.as_ref().map(|q| &q.url))
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from settings and the process environment.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        Self::resolve_with(settings, |var| std::env::var(var).ok())
    }

    /// Resolve credentials with a custom environment lookup.
    pub fn resolve_with<F>(settings: &Settings, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_api_key = provider_key(settings, settings.model.provider, &lookup)?;
        let embedding_api_key = provider_key(settings, settings.embedding.provider, &lookup)?;

        let qdrant = match settings.vector_store.provider {
            StoreProvider::Qdrant => Some(QdrantCredentials {
                url: resolve_secret(
                    settings.vector_store.qdrant_url.as_deref(),
                    "Qdrant URL",
                    "QDRANT_URL",
                    &lookup,
                )?,
                api_key: resolve_secret(
                    settings.vector_store.qdrant_api_key.as_deref(),
                    "Qdrant API key",
                    "QDRANT_API_KEY",
                    &lookup,
                )?,
            }),
            StoreProvider::Sqlite | StoreProvider::Memory => None,
        };

        Ok(Self {
            model_api_key,
            embedding_api_key,
            qdrant,
        })
    }
}

fn provider_key<F>(settings: &Settings, provider: ModelProvider, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = match provider {
        ModelProvider::Gemini => settings.credentials.gemini_api_key.as_deref(),
        ModelProvider::OpenAi => settings.credentials.openai_api_key.as_deref(),
    };
    resolve_secret(
        explicit,
        provider.credential_name(),
        provider.api_key_env(),
        lookup,
    )
}

/// Resolve one secret: explicit value, then environment variable, then error.
///
/// Empty values count as absent.
pub fn resolve_secret<F>(
    explicit: Option<&str>,
    name: &'static str,
    env_var: &'static str,
    lookup: &F,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        debug!("{} taken from configuration", name);
        return Ok(value.to_string());
    }

    if let Some(value) = lookup(env_var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        debug!("{} taken from {}", name, env_var);
        return Ok(value);
    }

    Err(GigmatchError::MissingCredential { name, env_var })
}

/// Mask a secret for display, keeping a short prefix and suffix.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
