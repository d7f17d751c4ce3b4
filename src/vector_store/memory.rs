//! In-memory vector store implementation.
//!
//! Useful for testing and one-off runs where nothing should persist.

use super::{cosine_similarity, rank, CollectionInfo, Document, SearchResult, VectorStore};
use crate::error::{GigmatchError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Collection {
    dimensions: usize,
    documents: HashMap<Uuid, Document>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> GigmatchError {
    GigmatchError::VectorStore(format!("Store lock poisoned: {}", e))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dimensions,
                documents: HashMap::new(),
            });

        if entry.dimensions != dimensions {
            return Err(GigmatchError::VectorStore(format!(
                "Collection '{}' holds {}-dimensional vectors, embedder produces {}",
                collection, entry.dimensions, dimensions
            )));
        }
        Ok(())
    }

    async fn upsert_batch(&self, collection: &str, docs: &[Document]) -> Result<usize> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| GigmatchError::UnknownCollection(collection.to_string()))?;

        for doc in docs {
            target.documents.insert(doc.id, doc.clone());
        }
        Ok(docs.len())
    }

    async fn search_with_threshold(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let target = collections
            .get(collection)
            .ok_or_else(|| GigmatchError::UnknownCollection(collection.to_string()))?;

        let scored = target
            .documents
            .values()
            .map(|doc| SearchResult {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        Ok(rank(scored, limit, min_score))
    }

    async fn document_ids(&self, collection: &str) -> Result<HashSet<Uuid>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .map(|c| c.documents.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn delete_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(0);
        };
        Ok(ids
            .iter()
            .filter(|id| target.documents.remove(*id).is_some())
            .count())
    }

    async fn drop_collection(&self, collection: &str) -> Result<usize> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        Ok(collections
            .remove(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut infos: Vec<CollectionInfo> = collections
            .iter()
            .map(|(name, c)| CollectionInfo {
                name: name.clone(),
                document_count: c.documents.len(),
                dimensions: Some(c.dimensions),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn document_count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();
        store.ensure_collection("venues", 3).await.unwrap();

        let doc1 = Document::new(Uuid::new_v4(), "Hello world".to_string(), vec![1.0, 0.0, 0.0]);
        let doc2 = Document::new(Uuid::new_v4(), "Goodbye world".to_string(), vec![0.0, 1.0, 0.0]);

        store.upsert_batch("venues", &[doc1.clone(), doc2]).await.unwrap();
        assert_eq!(store.document_count("venues").await.unwrap(), 2);

        let results = store.search("venues", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score > results[1].score);

        // Same ID replaces rather than duplicates.
        store.upsert_batch("venues", &[doc1]).await.unwrap();
        assert_eq!(store.document_count("venues").await.unwrap(), 2);

        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].document_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let store = MemoryVectorStore::new();
        let err = store.search("nothing", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, GigmatchError::UnknownCollection(name) if name == "nothing"));
        assert!(store.document_ids("nothing").await.unwrap().is_empty());
        assert_eq!(store.drop_collection("nothing").await.unwrap(), 0);
    }
}
