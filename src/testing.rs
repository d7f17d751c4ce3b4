//! Deterministic test doubles for the embedding and chat model services.

use crate::agent::{ChatModel, Message, ModelDelta, ModelTurn, ToolInvocation, ToolSpec};
use crate::embedding::Embedder;
use crate::error::{GigmatchError, Result};
use crate::knowledge::KnowledgeBase;
use crate::vector_store::{MemoryVectorStore, VectorStore};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const KEYWORD_DIMENSIONS: usize = 512;

/// Bag-of-words embedder: each lowercase token hashes into one dimension.
pub struct KeywordEmbedder {
    embedded: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            embedded: AtomicUsize::new(0),
        }
    }

    /// Number of texts embedded so far.
    pub fn embedded_texts(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; KEYWORD_DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % KEYWORD_DIMENSIONS as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedded.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMENSIONS
    }
}

/// Write `records` to `<dir>/<collection>.json` and load it into a fresh in-memory knowledge base.
pub async fn fixture_knowledge(dir: &Path, collection: &str, records: &str) -> Arc<KnowledgeBase> {
    let path = dir.join(format!("{}.json", collection));
    std::fs::write(&path, records).unwrap();

    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
    let knowledge = KnowledgeBase::new(collection, path, store, Arc::new(KeywordEmbedder::new()))
        .with_min_score(0.0);
    knowledge.load(false).await.unwrap();
    Arc::new(knowledge)
}

#[derive(Clone, Copy, PartialEq)]
enum Behaviour {
    Answer,
    Loop,
    Fail,
}

/// Chat model that follows a fixed script.
///
/// On the first turn it calls the tools it is offered: the knowledge search
/// with the user's message, or the transfer tools whose member name appears in
/// the message (all of them when none does). Optionally it then scores one
/// pair. Finally it answers with the names of the records it was shown, or
/// with the members' answers when no records were shown.
pub struct ScriptedModel {
    behaviour: Behaviour,
    score: Option<(String, String, f64)>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            behaviour: Behaviour::Answer,
            score: None,
        }
    }

    /// Always call the first tool, never answer.
    pub fn looping() -> Self {
        Self {
            behaviour: Behaviour::Loop,
            score: None,
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            score: None,
        }
    }

    /// Score `artist` at `venue` with every factor at `factor` once findings are in.
    pub fn scoring(mut self, artist: &str, venue: &str, factor: f64) -> Self {
        self.score = Some((artist.to_string(), venue.to_string(), factor));
        self
    }

    fn turn(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn> {
        if self.behaviour == Behaviour::Fail {
            return Err(GigmatchError::Model("scripted failure".to_string()));
        }

        let user_index = messages
            .iter()
            .rposition(|m| matches!(m, Message::User(_)))
            .unwrap_or(0);
        let query = match messages.get(user_index) {
            Some(Message::User(text)) => text.clone(),
            _ => String::new(),
        };
        let history = &messages[user_index..];
        let called: Vec<&str> = history
            .iter()
            .flat_map(|m| match m {
                Message::Assistant { tool_calls, .. } => {
                    tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
                }
                _ => Vec::new(),
            })
            .collect();
        let call_id = |i: usize| format!("call_{}_{}", called.len(), i);

        if self.behaviour == Behaviour::Loop {
            if let Some(tool) = tools.first() {
                return Ok(calls(vec![(call_id(0), tool.name.clone(), serde_json::json!({"query": query}))]));
            }
        }

        if called.is_empty() && !tools.is_empty() {
            let mut planned = Vec::new();
            if tools.iter().any(|t| t.name == "search_knowledge_base") {
                planned.push(("search_knowledge_base".to_string(), serde_json::json!({"query": query})));
            }

            let transfers: Vec<&ToolSpec> = tools
                .iter()
                .filter(|t| t.name.starts_with("transfer_task_to_"))
                .collect();
            let lowered = query.to_lowercase();
            let mentioned: Vec<&&ToolSpec> = transfers
                .iter()
                .filter(|t| {
                    let member = t.name.trim_start_matches("transfer_task_to_");
                    let keyword = member.split('_').next().unwrap_or(member);
                    lowered.contains(keyword)
                })
                .collect();
            let routed: Vec<&ToolSpec> = if mentioned.is_empty() {
                transfers.clone()
            } else {
                mentioned.into_iter().copied().collect()
            };
            for tool in routed {
                planned.push((
                    tool.name.clone(),
                    serde_json::json!({"task_description": query, "expected_output": "Matching records"}),
                ));
            }

            if !planned.is_empty() {
                return Ok(calls(
                    planned
                        .into_iter()
                        .enumerate()
                        .map(|(i, (name, args))| (call_id(i), name, args))
                        .collect(),
                ));
            }
        }

        if let Some((artist, venue, factor)) = &self.score {
            let offered = tools.iter().any(|t| t.name == "calculate_match_score");
            if offered && !called.is_empty() && !called.contains(&"calculate_match_score") {
                return Ok(calls(vec![(
                    call_id(0),
                    "calculate_match_score".to_string(),
                    serde_json::json!({
                        "artist": artist,
                        "venue": venue,
                        "genre_compatibility": factor,
                        "audience_size": factor,
                        "ticket_sales_history": factor,
                        "financial_viability": factor,
                        "regional_demand": factor
                    }),
                )]));
            }
        }

        let mut sources: Vec<String> = history
            .iter()
            .filter_map(|m| match m {
                Message::Tool { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect();
        if sources.is_empty() {
            sources.push(query);
        }

        Ok(ModelTurn {
            content: Some(answer(&sources)),
            tool_calls: Vec::new(),
        })
    }
}

fn calls(planned: Vec<(String, String, serde_json::Value)>) -> ModelTurn {
    ModelTurn {
        content: None,
        tool_calls: planned
            .into_iter()
            .map(|(id, name, args)| ToolInvocation {
                id,
                name,
                arguments: args.to_string(),
            })
            .collect(),
    }
}

/// Names of records listed as `N. {json}` lines, or the sources verbatim.
fn answer(sources: &[String]) -> String {
    let names: Vec<String> = sources
        .iter()
        .flat_map(|s| s.lines())
        .filter_map(|line| {
            let (_, json) = line.split_once(". ")?;
            let value: serde_json::Value = serde_json::from_str(json).ok()?;
            value.get("name")?.as_str().map(str::to_string)
        })
        .collect();

    if names.is_empty() {
        format!("Team findings:\n{}", sources.join("\n"))
    } else {
        format!("Recommended from the records: {}.", names.join(", "))
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn> {
        self.turn(messages, tools)
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<BoxStream<'static, Result<ModelDelta>>> {
        let turn = self.turn(messages, tools)?;

        let mut deltas: Vec<Result<ModelDelta>> = turn
            .content
            .unwrap_or_default()
            .split_inclusive(' ')
            .map(|fragment| Ok(ModelDelta::Text(fragment.to_string())))
            .collect();
        if !turn.tool_calls.is_empty() {
            deltas.push(Ok(ModelDelta::ToolCalls(turn.tool_calls)));
        }
        Ok(stream::iter(deltas).boxed())
    }
}
