//! Ask command implementation.

use super::open_query_context;
use crate::agent::answer_text;
use crate::app::{AgentTarget, AppContext};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use futures::StreamExt;
use std::io::Write;

/// Run the ask command.
pub async fn run_ask(
    query: &str,
    stream: bool,
    target: AgentTarget,
    model: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.model.id = model;
    }
    let app = open_query_context(settings).await?;
    answer_and_shutdown(app, query, stream, target).await
}

/// Answer one query, then shut the context down whether or not answering succeeded.
async fn answer_and_shutdown(
    app: AppContext,
    query: &str,
    stream: bool,
    target: AgentTarget,
) -> Result<()> {
    let outcome = if stream {
        stream_answer(&app, target, query).await
    } else {
        full_answer(&app, target, query).await
    };
    app.shutdown().await?;
    outcome
}

async fn full_answer(app: &AppContext, target: AgentTarget, query: &str) -> Result<()> {
    let spinner = Output::spinner("Consulting the booking team...");
    let result = app.ask_agent(target, query).await;
    spinner.finish_and_clear();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    };

    println!("\n{}\n", response.content.trim());

    if !response.matches.is_empty() {
        Output::ranking(&response.matches);
    }
    if app.settings().agents.show_tool_calls && !response.tool_calls.is_empty() {
        Output::header("Tool Calls");
        for call in &response.tool_calls {
            Output::kv(&format!("{} -> {}", call.agent, call.name), &call.arguments);
        }
    }
    Ok(())
}

async fn stream_answer(app: &AppContext, target: AgentTarget, query: &str) -> Result<()> {
    let result = if app.settings().agents.show_tool_calls {
        print_events(app, target, query).await
    } else {
        print_answer_text(app, target, query).await
    };
    if let Err(e) = &result {
        println!();
        Output::error(&format!("Failed to generate answer: {}", e));
    }
    result
}

/// Print only the final answer text as it arrives.
async fn print_answer_text(app: &AppContext, target: AgentTarget, query: &str) -> Result<()> {
    let answer = answer_text(app.stream_agent(target, query));
    futures::pin_mut!(answer);
    println!();
    while let Some(text) = answer.next().await {
        print!("{}", text?);
        std::io::stdout().flush()?;
    }
    println!("\n");
    Ok(())
}

/// Print every run event, with tool activity shown dimmed.
async fn print_events(app: &AppContext, target: AgentTarget, query: &str) -> Result<()> {
    let mut events = app.stream_agent(target, query);
    println!();
    while let Some(event) = events.next().await {
        Output::run_event(&event?);
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::error::Result as StoreResult;
    use crate::testing::{KeywordEmbedder, ScriptedModel};
    use crate::vector_store::{CollectionInfo, Document, MemoryVectorStore, SearchResult, VectorStore};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    /// Memory store that counts flushes.
    #[derive(Default)]
    struct FlushCounter {
        inner: MemoryVectorStore,
        flushes: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FlushCounter {
        async fn ensure_collection(&self, collection: &str, dimensions: usize) -> StoreResult<()> {
            self.inner.ensure_collection(collection, dimensions).await
        }

        async fn upsert_batch(&self, collection: &str, docs: &[Document]) -> StoreResult<usize> {
            self.inner.upsert_batch(collection, docs).await
        }

        async fn search_with_threshold(
            &self,
            collection: &str,
            query_embedding: &[f32],
            limit: usize,
            min_score: f32,
        ) -> StoreResult<Vec<SearchResult>> {
            self.inner
                .search_with_threshold(collection, query_embedding, limit, min_score)
                .await
        }

        async fn document_ids(&self, collection: &str) -> StoreResult<HashSet<Uuid>> {
            self.inner.document_ids(collection).await
        }

        async fn delete_ids(&self, collection: &str, ids: &[Uuid]) -> StoreResult<usize> {
            self.inner.delete_ids(collection, ids).await
        }

        async fn drop_collection(&self, collection: &str) -> StoreResult<usize> {
            self.inner.drop_collection(collection).await
        }

        async fn list_collections(&self) -> StoreResult<Vec<CollectionInfo>> {
            self.inner.list_collections().await
        }

        async fn document_count(&self, collection: &str) -> StoreResult<usize> {
            self.inner.document_count(collection).await
        }

        async fn flush(&self) -> StoreResult<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn app(store: Arc<FlushCounter>) -> AppContext {
        AppContext::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(ScriptedModel::failing()),
            Arc::new(KeywordEmbedder::new()),
            store,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_answer_still_flushes_store() {
        for stream in [false, true] {
            let store = Arc::new(FlushCounter::default());
            let result =
                answer_and_shutdown(app(store.clone()), "find an indie artist", stream, AgentTarget::Team)
                    .await;

            assert!(result.is_err());
            assert_eq!(store.flushes.load(Ordering::SeqCst), 1);
        }
    }
}
