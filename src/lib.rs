//! gigmatch - Artist and Venue Matching
//!
//! A retrieval-augmented, multi-agent assistant that recommends artists and
//! concert venues for a booking request.
//!
//! # Overview
//!
//! gigmatch allows you to:
//! - Index artist and venue records from JSON files into a vector store
//! - Ask an artist agent or a venue agent questions grounded in those records
//! - Ask a coordinating team that routes work to both and scores the pairings
//! - Stream answers, keeping only the final-answer text
//!
//! # Architecture
//!
//! - `config` - Settings, credentials and prompt templates
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction (SQLite, in-memory, Qdrant)
//! - `knowledge` - Artist and venue knowledge bases
//! - `agent` - Agents, the team coordinator, run events and the stream filter
//! - `scoring` - Weighted artist/venue match scores
//! - `app` - Wiring of every component from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use gigmatch::app::AppContext;
//! use gigmatch::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = AppContext::new(Settings::load()?)?;
//!     app.load_knowledge(false, None).await?;
//!
//!     let response = app.ask("Find a popular indie musician and a venue in Oslo").await?;
//!     println!("{}", response.content);
//!
//!     app.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod app;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod openai;
pub mod scoring;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{GigmatchError, Result};
