//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Knowledge bases are small (hundreds of records), so a full scan per query is fine.

use super::{cosine_similarity, rank, CollectionInfo, Document, SearchResult, VectorStore};
use crate::error::{GigmatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        dimensions INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
        id TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GigmatchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_id(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value)
            .map_err(|e| GigmatchError::VectorStore(format!("Corrupt document id '{}': {}", value, e)))
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn collection_dimensions(conn: &Connection, collection: &str) -> Result<Option<usize>> {
        let dims: Option<i64> = conn
            .query_row(
                "SELECT dimensions FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dims.map(|d| d as usize))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self))]
    async fn ensure_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        let conn = self.lock()?;

        match Self::collection_dimensions(&conn, collection)? {
            Some(existing) if existing != dimensions => Err(GigmatchError::VectorStore(format!(
                "Collection '{}' holds {}-dimensional vectors, embedder produces {}. Reload with --recreate.",
                collection, existing, dimensions
            ))),
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO collections (name, dimensions, created_at) VALUES (?1, ?2, ?3)",
                    params![collection, dimensions as i64, Utc::now().to_rfc3339()],
                )?;
                info!("Created collection {} ({} dimensions)", collection, dimensions);
                Ok(())
            }
        }
    }

    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, collection: &str, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;

        if Self::collection_dimensions(&conn, collection)?.is_none() {
            return Err(GigmatchError::UnknownCollection(collection.to_string()));
        }

        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO documents (collection, id, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    collection,
                    doc.id.to_string(),
                    doc.content,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
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
        let conn = self.lock()?;

        if Self::collection_dimensions(&conn, collection)?.is_none() {
            return Err(GigmatchError::UnknownCollection(collection.to_string()));
        }

        let mut stmt = conn.prepare(
            "SELECT id, content, embedding, indexed_at FROM documents WHERE collection = ?1",
        )?;

        let docs = stmt
            .query_map(params![collection], |row| {
                let id_str: String = row.get(0)?;
                let embedding_bytes: Vec<u8> = row.get(2)?;
                let indexed_at_str: String = row.get(3)?;
                Ok((id_str, row.get::<_, String>(1)?, embedding_bytes, indexed_at_str))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut scored = Vec::with_capacity(docs.len());
        for (id_str, content, embedding_bytes, indexed_at_str) in docs {
            let document = Document {
                id: Self::parse_id(&id_str)?,
                content,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                indexed_at: Self::parse_timestamp(&indexed_at_str),
            };
            let score = cosine_similarity(query_embedding, &document.embedding);
            scored.push(SearchResult { document, score });
        }

        let results = rank(scored, limit, min_score);
        debug!("Found {} matching documents in {}", results.len(), collection);
        Ok(results)
    }

    async fn document_ids(&self, collection: &str) -> Result<HashSet<Uuid>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT id FROM documents WHERE collection = ?1")?;
        let ids = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

        let ids = ids.collect::<rusqlite::Result<Vec<String>>>()?;
        ids.iter().map(|id| Self::parse_id(id)).collect()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_ids(&self, collection: &str, ids: &[Uuid]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.to_string()],
            )?;
        }

        tx.commit()?;
        debug!("Deleted {} documents from {}", deleted, collection);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![collection],
        )?;
        conn.execute("DELETE FROM collections WHERE name = ?1", params![collection])?;

        info!("Dropped collection {} ({} documents)", collection, deleted);
        Ok(deleted)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.name, c.dimensions, COUNT(d.id)
            FROM collections c
            LEFT JOIN documents d ON d.collection = c.name
            GROUP BY c.name
            ORDER BY c.name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let dimensions: i64 = row.get(1)?;
            let count: i64 = row.get(2)?;
            Ok(CollectionInfo {
                name: row.get(0)?,
                document_count: count as usize,
                dimensions: Some(dimensions as usize),
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn document_count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn flush(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        debug!("Checkpointed SQLite WAL");
        Ok(())
    }
}
