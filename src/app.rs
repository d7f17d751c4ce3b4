//! Application context for gigmatch.
//!
//! Builds every component once from settings and owns them for the life of
//! the process: the vector store, the two knowledge bases, the knowledge
//! agents and the coordinating team.

use crate::agent::{Agent, AgentResponse, ChatModel, OpenAIChatModel, RunEvent};
use crate::config::{
    AgentRole, Credentials, KnowledgeSourceSettings, Prompts, Settings, StoreProvider,
};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{GigmatchError, Result};
use crate::knowledge::{Domain, KnowledgeBase, LoadReport};
use crate::openai::create_client_with_timeout;
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Which agent a query is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AgentTarget {
    /// The coordinating team.
    #[default]
    Team,
    /// The artist agent alone.
    Artists,
    /// The venue agent alone.
    Venues,
}

/// Everything needed to answer queries.
pub struct AppContext {
    settings: Settings,
    prompts: Prompts,
    store: Arc<dyn VectorStore>,
    artists: Arc<KnowledgeBase>,
    venues: Arc<KnowledgeBase>,
    artist_agent: Arc<Agent>,
    venue_agent: Arc<Agent>,
    team: Agent,
}

impl AppContext {
    /// Build the context, resolving credentials from settings and the environment.
    pub fn new(settings: Settings) -> Result<Self> {
        let credentials = Credentials::resolve(&settings)?;
        Self::with_credentials(settings, &credentials)
    }

    /// Build the context with already resolved credentials.
    pub fn with_credentials(settings: Settings, credentials: &Credentials) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let timeout = Duration::from_secs(settings.model.timeout_secs);

        info!(
            "Using {} model {} and {} embeddings ({})",
            settings.model.provider,
            settings.model.id,
            settings.embedding.provider,
            settings.embedding.model
        );

        let chat_client = create_client_with_timeout(
            &settings.model.api_base(),
            &credentials.model_api_key,
            timeout,
        )?;
        let model: Arc<dyn ChatModel> = Arc::new(
            OpenAIChatModel::new(chat_client, &settings.model.id)
                .with_temperature(settings.model.temperature),
        );

        let embedding_client = create_client_with_timeout(
            &settings.embedding.api_base(),
            &credentials.embedding_api_key,
            timeout,
        )?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(
            embedding_client,
            &settings.embedding,
        ));

        let store = open_store(&settings, credentials)?;

        Self::with_components(settings, prompts, model, embedder, store)
    }

    /// Build the context from custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let knowledge = |source: &KnowledgeSourceSettings| {
            if source.collection.trim().is_empty() {
                return Err(GigmatchError::Config(format!(
                    "Knowledge source {} has no collection name",
                    source.path
                )));
            }
            Ok(Arc::new(
                KnowledgeBase::new(
                    &source.collection,
                    Settings::expand_path(&source.path),
                    store.clone(),
                    embedder.clone(),
                )
                .with_max_results(settings.knowledge.max_results)
                .with_min_score(settings.knowledge.min_score),
            ))
        };
        let artists = knowledge(&settings.knowledge.artists)?;
        let venues = knowledge(&settings.knowledge.venues)?;
        if artists.collection() == venues.collection() {
            return Err(GigmatchError::Config(format!(
                "Artists and venues share the collection '{}'",
                artists.collection()
            )));
        }

        let knowledge_agent = |role: &AgentRole, knowledge: &Arc<KnowledgeBase>| {
            Arc::new(
                Agent::from_role(role, model.clone())
                    .with_knowledge(knowledge.clone())
                    .with_prompts(&prompts)
                    .with_flags(settings.agents.clone())
                    .with_max_iterations(settings.model.max_iterations),
            )
        };
        let artist_agent = knowledge_agent(&prompts.agents.artist, &artists);
        let venue_agent = knowledge_agent(&prompts.agents.venue, &venues);

        let team = Agent::new(&prompts.team.name, model.clone())
            .with_script(prompts.team.clone())
            .with_members(vec![artist_agent.clone(), venue_agent.clone()])
            .with_prompts(&prompts)
            .with_flags(settings.agents.clone())
            .with_scoring(settings.scoring)
            .with_max_iterations(settings.model.max_iterations);

        Ok(Self {
            settings,
            prompts,
            store,
            artists,
            venues,
            artist_agent,
            venue_agent,
            team,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    /// The knowledge base of a domain.
    pub fn knowledge(&self, domain: Domain) -> &Arc<KnowledgeBase> {
        match domain {
            Domain::Artists => &self.artists,
            Domain::Venues => &self.venues,
        }
    }

    /// The agent behind a target.
    pub fn agent(&self, target: AgentTarget) -> &Agent {
        match target {
            AgentTarget::Team => &self.team,
            AgentTarget::Artists => &self.artist_agent,
            AgentTarget::Venues => &self.venue_agent,
        }
    }

    /// Load one domain's knowledge base, or both.
    #[instrument(skip(self))]
    pub async fn load_knowledge(
        &self,
        recreate: bool,
        domain: Option<Domain>,
    ) -> Result<Vec<LoadReport>> {
        let domains = match domain {
            Some(domain) => vec![domain],
            None => Domain::ALL.to_vec(),
        };

        let mut reports = Vec::with_capacity(domains.len());
        for domain in domains {
            reports.push(self.knowledge(domain).load(recreate).await?);
        }
        Ok(reports)
    }

    /// Ask the team and wait for the complete answer.
    pub async fn ask(&self, query: &str) -> Result<AgentResponse> {
        self.ask_agent(AgentTarget::Team, query).await
    }

    /// Ask the team and stream its run events.
    pub fn ask_stream<'a>(&'a self, query: &'a str) -> BoxStream<'a, Result<RunEvent>> {
        self.stream_agent(AgentTarget::Team, query)
    }

    /// Ask one agent and wait for the complete answer.
    pub async fn ask_agent(&self, target: AgentTarget, query: &str) -> Result<AgentResponse> {
        if query.trim().is_empty() {
            return Err(GigmatchError::InvalidInput("Query is empty".to_string()));
        }
        self.agent(target).run(query).await
    }

    /// Ask one agent and stream its run events.
    pub fn stream_agent<'a>(
        &'a self,
        target: AgentTarget,
        query: &'a str,
    ) -> BoxStream<'a, Result<RunEvent>> {
        self.agent(target).run_stream(query)
    }

    /// Flush the vector store and release every component.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down");
        self.store.flush().await
    }
}

/// Open the configured vector store.
pub fn open_store(settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        StoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        StoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
        StoreProvider::Qdrant => open_qdrant(settings, credentials)?,
    };
    info!("Opened {} vector store", settings.vector_store.provider);
    Ok(store)
}

#[cfg(feature = "qdrant")]
fn open_qdrant(settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn VectorStore>> {
    let qdrant = credentials.qdrant.as_ref().ok_or(GigmatchError::MissingCredential {
        name: "Qdrant URL",
        env_var: "QDRANT_URL",
    })?;
    Ok(Arc::new(crate::vector_store::QdrantVectorStore::new(
        qdrant,
        Duration::from_secs(settings.model.timeout_secs),
    )?))
}

#[cfg(not(feature = "qdrant"))]
fn open_qdrant(_settings: &Settings, _credentials: &Credentials) -> Result<Arc<dyn VectorStore>> {
    Err(GigmatchError::Config(
        "This build has no Qdrant support. Rebuild with the `qdrant` feature.".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::answer_text;
    use crate::testing::{KeywordEmbedder, ScriptedModel};
    use futures::StreamExt;
    use std::path::Path;

    fn context(dir: &Path) -> AppContext {
        std::fs::write(
            dir.join("artists.json"),
            r#"[{"name": "Echo Valley", "genre": "indie", "popularity": 8}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("venues.json"),
            r#"[{"name": "Blue Room", "city": "Oslo", "capacity": 400}]"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.knowledge.artists.path = dir.join("artists.json").display().to_string();
        settings.knowledge.venues.path = dir.join("venues.json").display().to_string();
        settings.knowledge.min_score = 0.0;

        AppContext::with_components(
            settings,
            Prompts::default(),
            Arc::new(ScriptedModel::new()),
            Arc::new(KeywordEmbedder::new()),
            Arc::new(MemoryVectorStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_both_domains_twice() {
        let dir = tempfile::tempdir().unwrap();
        let app = context(dir.path());

        let first = app.load_knowledge(false, None).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].collection, "artists");
        assert_eq!(first[0].embedded, 1);

        let second = app.load_knowledge(false, None).await.unwrap();
        assert!(second.iter().all(|r| r.embedded == 0 && r.skipped == 1));

        let collections = app.vector_store().list_collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        assert!(collections.iter().all(|c| c.document_count == 1));
    }

    #[tokio::test]
    async fn test_load_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = context(dir.path());
        std::fs::remove_file(dir.path().join("venues.json")).unwrap();

        let err = app
            .load_knowledge(false, Some(Domain::Venues))
            .await
            .unwrap_err();
        assert!(err.is_source());
    }

    #[tokio::test]
    async fn test_ask_and_stream_agree() {
        let dir = tempfile::tempdir().unwrap();
        let app = context(dir.path());
        app.load_knowledge(false, None).await.unwrap();

        let query = "find a popular indie artist";
        let full = app.ask(query).await.unwrap();
        assert!(full.content.contains("Echo Valley"));
        assert!(!full.content.contains("Blue Room"));

        let streamed: Vec<String> = answer_text(app.ask_stream(query))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert!(!streamed.is_empty());
        assert_eq!(streamed.concat(), full.content);

        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_before_load_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = context(dir.path());

        let err = app.ask("find a popular indie artist").await.unwrap_err();
        assert!(matches!(err, GigmatchError::UnknownCollection(_)));

        let streamed: Vec<Result<String>> = answer_text(app.ask_stream("find a popular indie artist"))
            .collect()
            .await;
        assert!(streamed.iter().any(|r| r.is_err()));

        app.load_knowledge(false, None).await.unwrap();
        assert!(app.ask("find a popular indie artist").await.is_ok());
    }

    #[tokio::test]
    async fn test_ask_single_agent() {
        let dir = tempfile::tempdir().unwrap();
        let app = context(dir.path());
        app.load_knowledge(false, Some(Domain::Venues)).await.unwrap();

        let response = app
            .ask_agent(AgentTarget::Venues, "venues in Oslo")
            .await
            .unwrap();
        assert!(response.content.contains("Blue Room"));
        assert!(response.tool_calls.iter().all(|c| c.agent == "Venue Agent"));

        assert!(app.ask_agent(AgentTarget::Team, "  ").await.is_err());
    }

    #[test]
    fn test_shared_collection_rejected() {
        let mut settings = Settings::default();
        settings.knowledge.venues.collection = "artists".to_string();
        let result = AppContext::with_components(
            settings,
            Prompts::default(),
            Arc::new(ScriptedModel::new()),
            Arc::new(KeywordEmbedder::new()),
            Arc::new(MemoryVectorStore::new()),
        );
        assert!(matches!(result, Err(GigmatchError::Config(_))));
    }
}
