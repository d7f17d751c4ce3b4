//! Vector store abstraction for gigmatch.
//!
//! Provides a trait-based interface over collection-scoped vector backends.
//! Each knowledge base is one named collection inside a store.

mod memory;
#[cfg(feature = "qdrant")]
mod qdrant;
mod sqlite;

pub use memory::MemoryVectorStore;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A document stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Content-derived document ID.
    pub id: Uuid,
    /// Text that was embedded (the record's canonical JSON).
    pub content: String,
    /// Embedding vector. Backends that do not return vectors on search leave it empty.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document.
    pub fn new(id: Uuid, content: String, embedding: Vec<f32>) -> Self {
        Self {
            id,
            content,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub document_count: usize,
    /// Vector dimension, when known.
    pub dimensions: Option<usize>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if needed. Fails if it exists with another dimension.
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()>;

    /// Bulk upsert documents. Documents with an existing ID are replaced.
    async fn upsert_batch(&self, collection: &str, docs: &[Document]) -> Result<usize>;

    /// Search with a minimum similarity threshold.
    ///
    /// Fails with `UnknownCollection` when the collection was never created.
    async fn search_with_threshold(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// Search for similar documents.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(collection, query_embedding, limit, f32::MIN)
            .await
    }

    /// IDs of every document in a collection. Empty for unknown collections.
    async fn document_ids(&self, collection: &str) -> Result<HashSet<Uuid>>;

    /// Delete documents by ID.
    async fn delete_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize>;

    /// Drop a collection and everything in it. Returns the number of documents removed.
    async fn drop_collection(&self, collection: &str) -> Result<usize>;

    /// List all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Get document count for a collection.
    async fn document_count(&self, collection: &str) -> Result<usize>;

    /// Flush pending state before shutdown.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank scored documents: drop those under `min_score`, best first, keep `limit`.
pub(crate) fn rank(mut results: Vec<SearchResult>, limit: usize, min_score: f32) -> Vec<SearchResult> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let doc = |score: f32| SearchResult {
            document: Document::new(Uuid::new_v4(), format!("{score}"), vec![]),
            score,
        };

        let ranked = rank(vec![doc(0.2), doc(0.9), doc(0.5), doc(0.7)], 2, 0.3);
        let scores: Vec<f32> = ranked.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }
}
