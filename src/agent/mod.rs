//! Agent system: retrieval-augmented agents and the coordinator that routes between them.
//!
//! An [`Agent`] runs a tool-calling loop against a [`ChatModel`], either to
//! completion ([`Agent::run`]) or as a stream of [`RunEvent`]s
//! ([`Agent::run_stream`]). [`answer_text`] reduces such a stream to the text
//! of the final answer.

mod events;
mod filter;
mod model;
mod runner;
mod tools;

pub use events::{ContentChunk, ContentPayload, ContentStage, RunEvent};
pub use filter::answer_text;
pub use model::{ChatModel, Message, ModelDelta, ModelTurn, OpenAIChatModel, ToolInvocation, ToolSpec};
pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use tools::{member_slug, parse_tool_call, transfer_tool_name, AgentTool};
