//! Tool definitions and argument parsing for agents.

use super::model::ToolSpec;
use crate::error::{GigmatchError, Result};
use crate::scoring::MatchFactors;
use serde::Deserialize;

/// Name of the knowledge search tool.
pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";

/// Name of the match scoring tool.
pub const CALCULATE_MATCH_SCORE: &str = "calculate_match_score";

/// Prefix of the per-member delegation tools.
pub const TRANSFER_PREFIX: &str = "transfer_task_to_";

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTool {
    /// Search the agent's knowledge base.
    SearchKnowledgeBase { query: String, limit: Option<usize> },

    /// Hand a sub-task to a team member, identified by its slug.
    TransferTask {
        member: String,
        task_description: String,
        expected_output: Option<String>,
    },

    /// Score an artist-venue pair.
    CalculateMatchScore {
        artist: String,
        venue: String,
        factors: MatchFactors,
    },
}

/// Tool-name form of an agent name: "Artist Agent" becomes "artist_agent".
pub fn member_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Tool name for delegating to a member.
pub fn transfer_tool_name(member_name: &str) -> String {
    format!("{}{}", TRANSFER_PREFIX, member_slug(member_name))
}

pub fn search_knowledge_tool(collection: &str) -> ToolSpec {
    ToolSpec {
        name: SEARCH_KNOWLEDGE_BASE.to_string(),
        description: format!(
            "Search the {} knowledge base for relevant records. \
            Use this before answering any question about {}.",
            collection, collection
        ),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of records to return"
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn transfer_tool(member_name: &str, member_role: &str) -> ToolSpec {
    ToolSpec {
        name: transfer_tool_name(member_name),
        description: format!(
            "Transfer a task to {}. Role: {}. \
            Give a clear task description and the output you expect back.",
            member_name, member_role
        ),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "task_description": {
                    "type": "string",
                    "description": "A clear and concise description of the task the member should achieve"
                },
                "expected_output": {
                    "type": "string",
                    "description": "The expected output from the member"
                }
            },
            "required": ["task_description"]
        }),
    }
}

pub fn match_score_tool() -> ToolSpec {
    let factor = |description: &str| {
        serde_json::json!({
            "type": "number",
            "minimum": 0,
            "maximum": 10,
            "description": description
        })
    };

    ToolSpec {
        name: CALCULATE_MATCH_SCORE.to_string(),
        description: "Calculate the match score of an artist and a venue from factor ratings \
            between 0 and 10. Returns a score out of 100 and a grade."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "artist": { "type": "string", "description": "Artist name as found in the knowledge base" },
                "venue": { "type": "string", "description": "Venue name as found in the knowledge base" },
                "genre_compatibility": factor("How well the artist's genre fits the venue"),
                "audience_size": factor("How well the artist's audience fits the venue capacity"),
                "ticket_sales_history": factor("Strength of past ticket sales"),
                "financial_viability": factor("Expected revenue against costs"),
                "regional_demand": factor("Demand for the artist in the venue's location")
            },
            "required": [
                "artist", "venue", "genre_compatibility", "audience_size",
                "ticket_sales_history", "financial_viability", "regional_demand"
            ]
        }),
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct TransferArgs {
    task_description: String,
    #[serde(default)]
    expected_output: Option<String>,
}

#[derive(Deserialize)]
struct ScoreArgs {
    artist: String,
    venue: String,
    genre_compatibility: f64,
    audience_size: f64,
    ticket_sales_history: f64,
    financial_viability: f64,
    regional_demand: f64,
}

/// Parse a tool call from its name and JSON arguments.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<AgentTool> {
    let invalid = |e: serde_json::Error| {
        GigmatchError::Agent(format!("Invalid arguments for {}: {}", name, e))
    };
    // Some models send an empty string for a call without arguments.
    let arguments = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };

    if name == SEARCH_KNOWLEDGE_BASE {
        let args: SearchArgs = serde_json::from_str(arguments).map_err(invalid)?;
        return Ok(AgentTool::SearchKnowledgeBase {
            query: args.query,
            limit: args.limit,
        });
    }

    if name == CALCULATE_MATCH_SCORE {
        let args: ScoreArgs = serde_json::from_str(arguments).map_err(invalid)?;
        return Ok(AgentTool::CalculateMatchScore {
            artist: args.artist,
            venue: args.venue,
            factors: MatchFactors {
                genre_compatibility: args.genre_compatibility,
                audience_size: args.audience_size,
                ticket_sales_history: args.ticket_sales_history,
                financial_viability: args.financial_viability,
                regional_demand: args.regional_demand,
            },
        });
    }

    if let Some(member) = name.strip_prefix(TRANSFER_PREFIX) {
        let args: TransferArgs = serde_json::from_str(arguments).map_err(invalid)?;
        return Ok(AgentTool::TransferTask {
            member: member.to_string(),
            task_description: args.task_description,
            expected_output: args.expected_output.filter(|s| !s.trim().is_empty()),
        });
    }

    Err(GigmatchError::Agent(format!("Unknown tool: {}", name)))
}
