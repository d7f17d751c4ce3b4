//! Configuration module for gigmatch.
//!
//! Handles loading and managing application settings, credentials and prompt templates.

mod credentials;
mod prompts;
mod settings;

pub use credentials::{mask, resolve_secret, Credentials, QdrantCredentials};
pub use prompts::{AgentPrompts, AgentRole, InstructionScript, Prompts, RagPrompts};
pub use settings::{
    AgentSettings, CredentialSettings, EmbeddingSettings, GeneralSettings, KnowledgeSettings,
    KnowledgeSourceSettings, ModelProvider, ModelSettings, PromptSettings, Settings,
    StoreProvider, VectorStoreSettings,
};
