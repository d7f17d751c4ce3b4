//! Knowledge base: a named collection over the vector store, fed from a JSON source.

use super::record::{load_records, Record};
use crate::embedding::Embedder;
use crate::error::{GigmatchError, Result};
use crate::vector_store::{Document, VectorStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outcome of loading a knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub collection: String,
    /// Records read from the source.
    pub records: usize,
    /// Records embedded and written in this load.
    pub embedded: usize,
    /// Records already indexed and left untouched.
    pub skipped: usize,
    /// Stale documents removed because their record is gone or changed.
    pub removed: usize,
}

/// A record returned by a knowledge search.
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    pub record: Record,
    pub score: f32,
}

/// One domain's knowledge base.
pub struct KnowledgeBase {
    collection: String,
    source: PathBuf,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    min_score: f32,
}

impl KnowledgeBase {
    /// Create a knowledge base view over `collection`.
    pub fn new(
        collection: &str,
        source: impl Into<PathBuf>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            source: source.into(),
            store,
            embedder,
            max_results: 5,
            min_score: 0.3,
        }
    }

    /// Set the default number of records per search.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Content-derived document ID for a record in this collection.
    pub fn document_id(&self, record: &Record) -> Uuid {
        document_id(&self.collection, &record.canonical_text())
    }

    /// Read the source and bring the collection in line with it.
    ///
    /// With `recreate` the collection is rebuilt from scratch. Without it,
    /// only records not yet indexed are embedded, and documents whose record
    /// no longer exists in the source are removed.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn load(&self, recreate: bool) -> Result<LoadReport> {
        let records = load_records(&self.source)?;
        info!(
            "Loading {} records from {} into {}",
            records.len(),
            self.source.display(),
            self.collection
        );

        let existing = if recreate {
            HashSet::new()
        } else {
            self.store.document_ids(&self.collection).await?
        };

        let mut seen = HashSet::new();
        let mut pending: Vec<(Uuid, String)> = Vec::new();
        for record in &records {
            let text = record.canonical_text();
            let id = document_id(&self.collection, &text);
            // Identical records in the source collapse to one document.
            if !seen.insert(id) {
                continue;
            }
            if !existing.contains(&id) {
                pending.push((id, text));
            }
        }

        // Embed before touching the store so a failed load leaves it as it was.
        let documents = self.embed_pending(pending).await?;

        if recreate {
            let dropped = self.store.drop_collection(&self.collection).await?;
            debug!("Dropped {} existing documents", dropped);
        }
        self.store
            .ensure_collection(&self.collection, self.embedder.dimensions())
            .await?;

        let stale: Vec<Uuid> = existing.difference(&seen).copied().collect();
        let removed = if stale.is_empty() {
            0
        } else {
            self.store.delete_ids(&self.collection, &stale).await?
        };

        let embedded = if documents.is_empty() {
            0
        } else {
            self.store.upsert_batch(&self.collection, &documents).await?
        };

        let report = LoadReport {
            collection: self.collection.clone(),
            records: records.len(),
            embedded,
            skipped: seen.len() - embedded,
            removed,
        };

        if report.records > seen.len() {
            warn!(
                "{} duplicate records in {} were indexed once",
                report.records - seen.len(),
                self.source.display()
            );
        }
        info!(
            "Loaded {}: {} embedded, {} unchanged, {} removed",
            self.collection, report.embedded, report.skipped, report.removed
        );
        Ok(report)
    }

    async fn embed_pending(&self, pending: Vec<(Uuid, String)>) -> Result<Vec<Document>> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != pending.len() {
            return Err(GigmatchError::Embedding(format!(
                "Expected {} embeddings, got {}",
                pending.len(),
                embeddings.len()
            )));
        }

        Ok(pending
            .into_iter()
            .zip(embeddings)
            .map(|((id, text), embedding)| Document::new(id, text, embedding))
            .collect())
    }

    /// Search for the records most similar to `query`.
    ///
    /// `limit` falls back to the configured result count.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<KnowledgeHit>> {
        let limit = limit.unwrap_or(self.max_results);
        let embedding = self.embedder.embed(query).await?;
        let results = self
            .store
            .search_with_threshold(&self.collection, &embedding, limit, self.min_score)
            .await?;

        let hits = results
            .into_iter()
            .filter_map(|r| match serde_json::from_str::<Record>(&r.document.content) {
                Ok(record) => Some(KnowledgeHit {
                    record,
                    score: r.score,
                }),
                Err(e) => {
                    warn!("Skipping unreadable document {}: {}", r.document.id, e);
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("Knowledge search returned {} records", hits.len());
        Ok(hits)
    }

    /// Number of documents currently indexed.
    pub async fn document_count(&self) -> Result<usize> {
        self.store.document_count(&self.collection).await
    }
}

/// Name-based UUID of a record's canonical text within a collection.
pub fn document_id(collection: &str, canonical_text: &str) -> Uuid {
    let name = format!("{}\n{}", collection, canonical_text);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Format hits for a model prompt, one numbered record per line.
pub fn format_hits_for_prompt(hits: &[KnowledgeHit]) -> String {
    if hits.is_empty() {
        return "No matching records found.".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}", i + 1, hit.record.canonical_text()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use crate::vector_store::{MemoryVectorStore, SqliteVectorStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn write_source(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("artists.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn knowledge(path: &Path, store: Arc<dyn VectorStore>) -> (KnowledgeBase, Arc<KeywordEmbedder>) {
        let embedder = Arc::new(KeywordEmbedder::new());
        let kb = KnowledgeBase::new("artists", path, store, embedder.clone()).with_min_score(0.0);
        (kb, embedder)
    }

    const ARTISTS: &str = r#"[
        {"name": "Echo Valley", "genre": "indie", "popularity": 8},
        {"name": "Iron Tide", "genre": "metal", "popularity": 6}
    ]"#;

    #[tokio::test]
    async fn test_reload_without_recreate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), ARTISTS);
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::in_memory().unwrap());
        let (kb, embedder) = knowledge(&path, store.clone());

        let first = kb.load(false).await.unwrap();
        assert_eq!(first.embedded, 2);
        assert_eq!(first.skipped, 0);

        let second = kb.load(false).await.unwrap();
        assert_eq!(second.embedded, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(kb.document_count().await.unwrap(), 2);
        // Two texts embedded in total: nothing was re-embedded.
        assert_eq!(embedder.embedded_texts(), 2);
    }

    #[tokio::test]
    async fn test_recreate_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), ARTISTS);
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let (kb, embedder) = knowledge(&path, store);

        kb.load(false).await.unwrap();
        let report = kb.load(true).await.unwrap();
        assert_eq!(report.embedded, 2);
        assert_eq!(kb.document_count().await.unwrap(), 2);
        assert_eq!(embedder.embedded_texts(), 4);
    }

    #[tokio::test]
    async fn test_changed_record_replaces_stale_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), ARTISTS);
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let (kb, _) = knowledge(&path, store);
        kb.load(false).await.unwrap();

        write_source(
            dir.path(),
            r#"[
                {"name": "Echo Valley", "genre": "indie", "popularity": 9},
                {"name": "Iron Tide", "genre": "metal", "popularity": 6}
            ]"#,
        );
        let report = kb.load(false).await.unwrap();
        assert_eq!(report.embedded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(kb.document_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_source_fails_and_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let (kb, _) = knowledge(&dir.path().join("artists.json"), store.clone());

        let err = kb.load(false).await.unwrap_err();
        assert!(matches!(err, GigmatchError::SourceNotFound(_)));
        assert!(store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_returns_matching_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), ARTISTS);
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let (kb, _) = knowledge(&path, store);
        kb.load(false).await.unwrap();

        let hits = kb.search("popular indie musician", Some(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.name(), Some("Echo Valley"));
    }

    /// Embeds like `KeywordEmbedder` until told to fail.
    struct FlakyEmbedder {
        inner: KeywordEmbedder,
        down: AtomicBool,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.check()?;
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.check()?;
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    impl FlakyEmbedder {
        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(GigmatchError::Embedding("service unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_recreate_keeps_indexed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), ARTISTS);
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::in_memory().unwrap());
        let embedder = Arc::new(FlakyEmbedder {
            inner: KeywordEmbedder::new(),
            down: AtomicBool::new(false),
        });
        let kb = KnowledgeBase::new("artists", &path, store, embedder.clone()).with_min_score(0.0);
        kb.load(false).await.unwrap();

        embedder.down.store(true, Ordering::SeqCst);
        let err = kb.load(true).await.unwrap_err();
        assert!(matches!(err, GigmatchError::Embedding(_)));

        write_source(dir.path(), r#"[{"name": "Night Owls", "genre": "jazz"}]"#);
        assert!(kb.load(false).await.is_err());
        assert_eq!(kb.document_count().await.unwrap(), 2);

        embedder.down.store(false, Ordering::SeqCst);
        let hits = kb.search("indie", Some(1)).await.unwrap();
        assert_eq!(hits[0].record.name(), Some("Echo Valley"));
    }

    #[tokio::test]
    async fn test_search_before_load_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), ARTISTS);
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let (kb, _) = knowledge(&path, store);

        let err = kb.search("indie", None).await.unwrap_err();
        assert!(matches!(err, GigmatchError::UnknownCollection(name) if name == "artists"));
    }

    #[test]
    fn test_document_id_depends_on_collection() {
        let text = r#"{"name":"Echo Valley"}"#;
        assert_eq!(document_id("artists", text), document_id("artists", text));
        assert_ne!(document_id("artists", text), document_id("venues", text));
    }

    #[test]
    fn test_format_hits_for_prompt() {
        assert_eq!(format_hits_for_prompt(&[]), "No matching records found.");

        let record: Record = serde_json::from_str(r#"{"name": "Blue Room"}"#).unwrap();
        let formatted = format_hits_for_prompt(&[KnowledgeHit { record, score: 0.9 }]);
        assert_eq!(formatted, r#"1. {"name":"Blue Room"}"#);
    }
}
