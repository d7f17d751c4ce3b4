//! Prompt templates for gigmatch.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory:
//! `agents.toml`, `team.toml` and `rag.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agents: AgentPrompts,
    pub team: InstructionScript,
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Role description for one knowledge agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRole {
    pub name: String,
    pub role: String,
    pub instructions: Vec<String>,
}

/// Roles of the two knowledge agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub artist: AgentRole,
    pub venue: AgentRole,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            artist: AgentRole {
                name: "Artist Agent".to_string(),
                role: "Research artists by genre, popularity, audience demand and touring history.".to_string(),
                instructions: vec![
                    "Search the artist knowledge base before answering.".to_string(),
                    "Report only artists that appear in the search results.".to_string(),
                    "Include the attributes that support each suggestion.".to_string(),
                ],
            },
            venue: AgentRole {
                name: "Venue Agent".to_string(),
                role: "Research venues by location, capacity, past performances, technical suitability and revenue potential.".to_string(),
                instructions: vec![
                    "Search the venue knowledge base before answering.".to_string(),
                    "Report only venues that appear in the search results.".to_string(),
                    "Include the attributes that support each suggestion.".to_string(),
                ],
            },
        }
    }
}

/// Fixed instruction script of a coordinating agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstructionScript {
    pub name: String,
    pub description: String,
    pub task: String,
    /// Ordered behavioural instructions.
    pub instructions: Vec<String>,
}

impl Default for InstructionScript {
    fn default() -> Self {
        Self {
            name: "Booking Recommender".to_string(),
            description: "You are a team of AI agents that specialize in matching musicians with the best venues and helping booking agents find the ideal artists for concerts.".to_string(),
            task: "Assist musicians in finding the best venues and help booking agents identify the most suitable artists for successful concert bookings.".to_string(),
            instructions: vec![
                "Goal: Ensure musicians get the best venues for their concerts while booking agents find the most suitable artists for their events.".to_string(),
                "Analyze the user query, break it down into smaller tasks, and distribute them to the appropriate agents.".to_string(),
                "Use the Artist Agent to research the best artists based on genre, popularity, audience demand, and past touring history.".to_string(),
                "Use the Venue Agent to research venues based on location, capacity, past performances, technical suitability, and revenue potential.".to_string(),
                "DO NOT generate or assume information about any artist or venue unless it exists in the knowledge base.".to_string(),
                "Combine insights from both agents to generate optimized recommendations.".to_string(),
                "Calculate a **match score** with the calculate_match_score tool, rating genre compatibility, audience size, ticket sales history, financial viability, and artist demand in the venue's location from 0 to 10.".to_string(),
                "Provide structured recommendations, highlighting why a particular artist or venue is a great match.".to_string(),
                "Format responses using markdown for clarity and readability.".to_string(),
                "Use markdown tables to compare and rank the best-matching artists and venues based on key criteria, including a **match score**.".to_string(),
            ],
        }
    }
}

/// Prompts for retrieval-augmented answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// Grounding rules appended to every knowledge agent's system prompt.
    pub grounding: String,
    /// User message template when references are injected up front.
    pub references: String,
    /// Appended to system prompts when markdown output is enabled.
    pub markdown: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            grounding: r#"You answer from the {{collection}} knowledge base only.

Guidelines:
- Use the search_knowledge_base tool to look up records before answering
- Every name, number and attribute you mention must come from a returned record
- If the knowledge base has nothing relevant, say so plainly
- Never invent {{collection}} that were not returned"#.to_string(),

            references: r#"{{query}}

Use the following records from the {{collection}} knowledge base to answer:

{{references}}"#.to_string(),

            markdown: "Format your response using markdown.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agents_path = custom_path.join("agents.toml");
            if agents_path.exists() {
                let content = std::fs::read_to_string(&agents_path)?;
                prompts.agents = toml::from_str(&content)?;
            }

            let team_path = custom_path.join("team.toml");
            if team_path.exists() {
                let content = std::fs::read_to_string(&team_path)?;
                prompts.team = toml::from_str(&content)?;
            }

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
