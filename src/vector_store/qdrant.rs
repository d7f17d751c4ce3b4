//! Qdrant vector store backed by `qdrant-client`.
//!
//! Collections use cosine distance. Documents are stored as points whose ID is
//! the document UUID and whose payload carries the content and index time.

use super::{CollectionInfo, Document, SearchResult, VectorStore};
use crate::config::QdrantCredentials;
use crate::error::{GigmatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config, CountPointsBuilder,
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    QueryPointsBuilder, ScoredPoint, ScrollPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

/// Points fetched per scroll page.
const SCROLL_PAGE: u32 = 256;
/// Points sent per upsert request.
const UPSERT_BATCH: usize = 128;

const CONTENT_KEY: &str = "content";
const INDEXED_AT_KEY: &str = "indexed_at";

/// Qdrant-backed vector store.
pub struct QdrantVectorStore {
    client: Qdrant,
}

fn store_error(e: QdrantError) -> GigmatchError {
    GigmatchError::VectorStore(format!("Qdrant request failed: {}", e))
}

impl QdrantVectorStore {
    /// Create a store for the given endpoint.
    pub fn new(credentials: &QdrantCredentials, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&credentials.url).map_err(|e| {
            GigmatchError::Config(format!("Invalid Qdrant URL '{}': {}", credentials.url, e))
        })?;

        let client = Qdrant::from_url(url.as_str())
            .api_key(credentials.api_key.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| GigmatchError::Config(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self { client })
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(store_error)
    }

    async fn collection_dimensions(&self, collection: &str) -> Result<Option<usize>> {
        if !self.exists(collection).await? {
            return Ok(None);
        }
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(store_error)?;
        Ok(info.result.and_then(vector_size))
    }
}

/// Vector size of a collection with a single unnamed vector.
fn vector_size(info: qdrant_client::qdrant::CollectionInfo) -> Option<usize> {
    let config = info.config?.params?.vectors_config?.config?;
    match config {
        vectors_config::Config::Params(params) => Some(params.size as usize),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

fn parse_point_id(id: Option<PointId>) -> Result<Uuid> {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(raw)) => Uuid::parse_str(&raw).map_err(|e| {
            GigmatchError::VectorStore(format!("Corrupt point id '{}': {}", raw, e))
        }),
        Some(PointIdOptions::Num(n)) => Err(GigmatchError::VectorStore(format!(
            "Unexpected numeric point id {}",
            n
        ))),
        None => Err(GigmatchError::VectorStore("Point without an id".to_string())),
    }
}

fn payload_text<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(text) => Some(text),
        _ => None,
    }
}

fn to_search_result(point: ScoredPoint) -> Result<SearchResult> {
    let id = parse_point_id(point.id)?;
    let content = payload_text(&point.payload, CONTENT_KEY).ok_or_else(|| {
        GigmatchError::VectorStore(format!("Point {} has no content payload", id))
    })?;
    let indexed_at = payload_text(&point.payload, INDEXED_AT_KEY)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| {
            GigmatchError::VectorStore(format!("Point {} has no index time", id))
        })?;

    Ok(SearchResult {
        document: Document {
            id,
            content: content.to_string(),
            embedding: Vec::new(),
            indexed_at,
        },
        score: point.score,
    })
}

fn to_point(doc: &Document) -> PointStruct {
    let mut payload = Payload::new();
    payload.insert(CONTENT_KEY, doc.content.clone());
    payload.insert(INDEXED_AT_KEY, doc.indexed_at.to_rfc3339());
    PointStruct::new(doc.id.to_string(), doc.embedding.clone(), payload)
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[instrument(skip(self))]
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        if let Some(existing) = self.collection_dimensions(collection).await? {
            if existing != dimensions {
                return Err(GigmatchError::VectorStore(format!(
                    "Collection '{}' holds {}-dimensional vectors, embedder produces {}. Reload with --recreate.",
                    collection, existing, dimensions
                )));
            }
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(store_error)?;
        info!("Created Qdrant collection {} ({} dimensions)", collection, dimensions);
        Ok(())
    }

    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, collection: &str, docs: &[Document]) -> Result<usize> {
        if !self.exists(collection).await? {
            return Err(GigmatchError::UnknownCollection(collection.to_string()));
        }

        for batch in docs.chunks(UPSERT_BATCH) {
            let points: Vec<PointStruct> = batch.iter().map(to_point).collect();
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(store_error)?;
        }

        info!("Batch upserted {} documents into {}", docs.len(), collection);
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_with_threshold(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        if !self.exists(collection).await? {
            return Err(GigmatchError::UnknownCollection(collection.to_string()));
        }

        let mut query = QueryPointsBuilder::new(collection)
            .query(query_embedding.to_vec())
            .limit(limit as u64)
            .with_payload(true);
        if min_score > f32::MIN {
            query = query.score_threshold(min_score);
        }

        let response = self.client.query(query).await.map_err(store_error)?;
        let results = response
            .result
            .into_iter()
            .map(to_search_result)
            .collect::<Result<Vec<_>>>()?;
        debug!("Found {} matching documents in {}", results.len(), collection);
        Ok(results)
    }

    async fn document_ids(&self, collection: &str) -> Result<HashSet<Uuid>> {
        let mut ids = HashSet::new();
        if !self.exists(collection).await? {
            return Ok(ids);
        }

        let mut offset: Option<PointId> = None;
        loop {
            let mut scroll = ScrollPointsBuilder::new(collection)
                .limit(SCROLL_PAGE)
                .with_payload(false)
                .with_vectors(false);
            if let Some(offset) = offset.take() {
                scroll = scroll.offset(offset);
            }

            let page = self.client.scroll(scroll).await.map_err(store_error)?;
            for point in page.result {
                ids.insert(parse_point_id(point.id)?);
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn delete_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() || !self.exists(collection).await? {
            return Ok(0);
        }

        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: points })
                    .wait(true),
            )
            .await
            .map_err(store_error)?;
        Ok(ids.len())
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, collection: &str) -> Result<usize> {
        if !self.exists(collection).await? {
            return Ok(0);
        }
        let count = self.document_count(collection).await?;
        self.client
            .delete_collection(collection)
            .await
            .map_err(store_error)?;
        info!("Dropped Qdrant collection {} ({} documents)", collection, count);
        Ok(count)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let listing = self.client.list_collections().await.map_err(store_error)?;

        let mut infos = Vec::new();
        for entry in listing.collections {
            infos.push(CollectionInfo {
                document_count: self.document_count(&entry.name).await?,
                dimensions: self.collection_dimensions(&entry.name).await?,
                name: entry.name,
            });
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn document_count(&self, collection: &str) -> Result<usize> {
        if !self.exists(collection).await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(store_error)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
