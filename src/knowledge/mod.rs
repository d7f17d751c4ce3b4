//! Knowledge bases for the artist and venue domains.
//!
//! Records are read from JSON sources, embedded, and indexed into one vector
//! store collection per domain.

mod base;
mod record;

pub use base::{document_id, format_hits_for_prompt, KnowledgeBase, KnowledgeHit, LoadReport};
pub use record::{load_records, Record};

use serde::{Deserialize, Serialize};

/// The two knowledge domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Artists,
    Venues,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Artists, Domain::Venues];
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Artists => write!(f, "artists"),
            Domain::Venues => write!(f, "venues"),
        }
    }
}
