//! Events emitted while an agent runs in streaming mode.

use serde::Serialize;
use serde_json::Value;

/// Whether content belongs to the answer or to work leading up to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStage {
    FinalAnswer,
    Intermediate,
}

/// Content carried by a chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentPayload {
    Text(String),
    Structured(Value),
}

/// A piece of content produced by an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentChunk {
    /// Name of the agent that produced it.
    pub agent: String,
    pub stage: ContentStage,
    pub payload: ContentPayload,
}

impl ContentChunk {
    pub fn text(agent: &str, stage: ContentStage, text: impl Into<String>) -> Self {
        Self {
            agent: agent.to_string(),
            stage,
            payload: ContentPayload::Text(text.into()),
        }
    }

    pub fn structured(agent: &str, stage: ContentStage, value: Value) -> Self {
        Self {
            agent: agent.to_string(),
            stage,
            payload: ContentPayload::Structured(value),
        }
    }
}

/// An event in an agent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        agent: String,
    },
    ToolCallStarted {
        agent: String,
        name: String,
        arguments: String,
    },
    ToolCallCompleted {
        agent: String,
        name: String,
        result: String,
    },
    Content(ContentChunk),
    RunCompleted {
        agent: String,
        iterations: usize,
    },
}

impl RunEvent {
    /// The text of a final-answer content chunk, if this is one.
    pub fn into_answer_text(self) -> Option<String> {
        match self {
            RunEvent::Content(ContentChunk {
                stage: ContentStage::FinalAnswer,
                payload: ContentPayload::Text(text),
                ..
            }) => Some(text),
            RunEvent::Content(_)
            | RunEvent::RunStarted { .. }
            | RunEvent::ToolCallStarted { .. }
            | RunEvent::ToolCallCompleted { .. }
            | RunEvent::RunCompleted { .. } => None,
        }
    }

    /// Name of the agent that emitted the event.
    pub fn agent(&self) -> &str {
        match self {
            RunEvent::RunStarted { agent }
            | RunEvent::ToolCallStarted { agent, .. }
            | RunEvent::ToolCallCompleted { agent, .. }
            | RunEvent::RunCompleted { agent, .. } => agent,
            RunEvent::Content(chunk) => &chunk.agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_final_text_is_answer() {
        let final_text = RunEvent::Content(ContentChunk::text(
            "Booking Recommender",
            ContentStage::FinalAnswer,
            "Echo Valley",
        ));
        assert_eq!(final_text.into_answer_text(), Some("Echo Valley".to_string()));

        let intermediate = RunEvent::Content(ContentChunk::text(
            "Artist Agent",
            ContentStage::Intermediate,
            "thinking",
        ));
        assert_eq!(intermediate.into_answer_text(), None);

        let structured = RunEvent::Content(ContentChunk::structured(
            "Booking Recommender",
            ContentStage::FinalAnswer,
            serde_json::json!({"score": 72.5}),
        ));
        assert_eq!(structured.into_answer_text(), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::ToolCallStarted {
            agent: "Venue Agent".to_string(),
            name: "search_knowledge_base".to_string(),
            arguments: "{}".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "tool_call_started");
        assert_eq!(json["agent"], "Venue Agent");
        assert_eq!(event.agent(), "Venue Agent");
    }
}
