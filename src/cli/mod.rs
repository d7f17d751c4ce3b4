//! CLI module for gigmatch.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::app::AgentTarget;
use crate::knowledge::Domain;
use clap::{Parser, Subcommand};

/// gigmatch - match artists with concert venues
///
/// Loads artist and venue records into a vector store and answers booking
/// questions with a team of retrieval-augmented agents.
#[derive(Parser, Debug)]
#[command(name = "gigmatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the artist and venue knowledge bases into the vector store
    Load {
        /// Drop and rebuild the collections instead of updating them
        #[arg(short, long)]
        recreate: bool,

        /// Load only one domain
        #[arg(short, long, value_enum)]
        domain: Option<Domain>,
    },

    /// Ask for a booking recommendation
    Ask {
        /// The question to ask
        query: String,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,

        /// Agent to ask
        #[arg(short, long, value_enum, default_value = "team")]
        agent: AgentTarget,

        /// Model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search a knowledge base directly
    Search {
        /// Knowledge base to search
        #[arg(value_enum)]
        domain: Domain,

        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Minimum similarity score (0.0-1.0)
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// Start an interactive session with streamed answers
    Chat {
        /// Agent to talk to
        #[arg(short, long, value_enum, default_value = "team")]
        agent: AgentTarget,
    },

    /// List collections in the vector store
    List,

    /// Check credentials, knowledge sources and the vector store
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
