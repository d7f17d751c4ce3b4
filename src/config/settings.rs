//! Configuration settings for gigmatch.

use crate::scoring::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub knowledge: KnowledgeSettings,
    pub agents: AgentSettings,
    pub credentials: CredentialSettings,
    pub scoring: ScoringWeights,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.gigmatch".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Hosted model provider. Both are reached through the OpenAI wire format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini through its OpenAI-compatible endpoint.
    #[default]
    Gemini,
    /// OpenAI.
    OpenAi,
}

impl ModelProvider {
    /// Base URL used when no explicit `api_base` is configured.
    pub fn default_api_base(&self) -> &'static str {
        match self {
            ModelProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            ModelProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ModelProvider::Gemini => "GEMINIAPI_KEY",
            ModelProvider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Human-readable credential name.
    pub fn credential_name(&self) -> &'static str {
        match self {
            ModelProvider::Gemini => "Gemini API key",
            ModelProvider::OpenAi => "OpenAI API key",
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ModelProvider::Gemini),
            "openai" => Ok(ModelProvider::OpenAi),
            _ => Err(format!("Unknown model provider: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProvider::Gemini => write!(f, "gemini"),
            ModelProvider::OpenAi => write!(f, "openai"),
        }
    }
}

/// Language model settings shared by every agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    /// Model identifier.
    pub id: String,
    /// Override for the provider's base URL.
    pub api_base: Option<String>,
    pub temperature: f32,
    /// Maximum model calls per agent run.
    pub max_iterations: usize,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            id: "gemini-2.0-flash".to_string(),
            api_base: None,
            temperature: 0.4,
            max_iterations: 10,
            timeout_secs: 300,
        }
    }
}

impl ModelSettings {
    /// Base URL to call, explicit override first.
    pub fn api_base(&self) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| self.provider.default_api_base().to_string())
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ModelProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Override for the provider's base URL.
    pub api_base: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            api_base: None,
        }
    }
}

impl EmbeddingSettings {
    /// Base URL to call, explicit override first.
    pub fn api_base(&self) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| self.provider.default_api_base().to_string())
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Local SQLite database (persistent).
    #[default]
    Sqlite,
    /// Process memory (lost on exit).
    Memory,
    /// Qdrant, when built with the `qdrant` feature.
    Qdrant,
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreProvider::Sqlite => write!(f, "sqlite"),
            StoreProvider::Memory => write!(f, "memory"),
            StoreProvider::Qdrant => write!(f, "qdrant"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub provider: StoreProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Qdrant endpoint. Falls back to QDRANT_URL.
    pub qdrant_url: Option<String>,
    /// Qdrant API key. Falls back to QDRANT_API_KEY.
    pub qdrant_api_key: Option<String>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Sqlite,
            sqlite_path: "~/.gigmatch/vectors.db".to_string(),
            qdrant_url: None,
            qdrant_api_key: None,
        }
    }
}

/// One knowledge base: where its records come from and where they are indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSourceSettings {
    /// JSON file (array of objects) or a directory of such files.
    pub path: String,
    /// Collection name in the vector store.
    pub collection: String,
}

/// Knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    pub artists: KnowledgeSourceSettings,
    pub venues: KnowledgeSourceSettings,
    /// Records returned per knowledge lookup.
    pub max_results: usize,
    /// Minimum similarity score for a record to be returned.
    pub min_score: f32,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            artists: KnowledgeSourceSettings {
                path: "artists.json".to_string(),
                collection: "artists".to_string(),
            },
            venues: KnowledgeSourceSettings {
                path: "venues.json".to_string(),
                collection: "venues".to_string(),
            },
            max_results: 5,
            min_score: 0.3,
        }
    }
}

/// Behaviour flags applied to the agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Emit tool-call events while streaming.
    pub show_tool_calls: bool,
    /// Ask the model to format answers as markdown.
    pub markdown: bool,
    /// Give knowledge agents a search tool.
    pub search_knowledge: bool,
    /// Inject top matching records into the prompt before the first model call.
    pub add_references: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            show_tool_calls: true,
            markdown: true,
            search_knowledge: true,
            add_references: false,
        }
    }
}

/// Explicit API keys. Each one takes precedence over its environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialSettings {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GigmatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gigmatch")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_booking_setup() {
        let settings = Settings::default();
        assert_eq!(settings.model.provider, ModelProvider::Gemini);
        assert_eq!(settings.model.id, "gemini-2.0-flash");
        assert_eq!(settings.knowledge.artists.collection, "artists");
        assert_eq!(settings.knowledge.venues.collection, "venues");
        assert_eq!(settings.vector_store.provider, StoreProvider::Sqlite);
        assert!(settings.agents.show_tool_calls);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [model]
            provider = "openai"
            id = "gpt-4o-mini"

            [vector_store]
            provider = "qdrant"
            "#,
        )
        .unwrap();

        assert_eq!(settings.model.provider, ModelProvider::OpenAi);
        assert_eq!(settings.model.max_iterations, 10);
        assert_eq!(settings.vector_store.provider, StoreProvider::Qdrant);
        assert_eq!(settings.knowledge.max_results, 5);
    }

    #[test]
    fn test_api_base_override() {
        let mut model = ModelSettings::default();
        assert!(model.api_base().contains("generativelanguage"));

        model.api_base = Some("http://localhost:8080/v1".to_string());
        assert_eq!(model.api_base(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_save_and_load_roundtrip_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.knowledge.max_results = 8;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.knowledge.max_results, 8);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAi);
        assert_eq!("google".parse::<ModelProvider>().unwrap(), ModelProvider::Gemini);
        assert!("mistral".parse::<ModelProvider>().is_err());
    }
}
