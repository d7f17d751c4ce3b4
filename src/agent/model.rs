//! Chat model abstraction and the OpenAI-compatible implementation.

use crate::error::{GigmatchError, Result};
use crate::openai::ApiClient;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseStream, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use tracing::debug;

/// A message in an agent conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolInvocation>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments.
    pub arguments: String,
}

/// One complete model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

/// An increment of a streamed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text(String),
    /// All tool calls of the turn, emitted once they are complete.
    ToolCalls(Vec<ToolInvocation>),
}

/// A language model that can answer with text or tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier.
    fn id(&self) -> &str;

    /// Produce one complete turn.
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn>;

    /// Produce one turn incrementally.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<BoxStream<'static, Result<ModelDelta>>>;
}

/// Chat model served over the OpenAI chat completions API.
///
/// Works against OpenAI and any compatible endpoint, including Gemini's.
pub struct OpenAIChatModel {
    client: ApiClient,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIChatModel {
    pub fn new(client: ApiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        stream: bool,
    ) -> Result<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !tools.is_empty() {
            args.tools(tools.iter().map(to_tool).collect::<Vec<_>>());
        }
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        if stream {
            args.stream(true);
        }
        args.build().map_err(|e| GigmatchError::Model(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn> {
        let request = self.request(messages, tools, false)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GigmatchError::OpenAI(format!("Chat completion failed: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GigmatchError::Model("No response from model".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ModelTurn {
            content: choice.message.content,
            tool_calls,
        })
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<BoxStream<'static, Result<ModelDelta>>> {
        let request = self.request(messages, tools, true)?;
        let chunks = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| GigmatchError::OpenAI(format!("Chat stream failed: {}", e)))?;

        Ok(delta_stream(chunks).boxed())
    }
}

/// Turn completion chunks into text deltas plus one batch of tool calls at the end.
fn delta_stream(
    mut chunks: ChatCompletionResponseStream,
) -> impl Stream<Item = Result<ModelDelta>> + Send {
    try_stream! {
        // Tool call fragments arrive keyed by index and are joined here.
        let mut partial: BTreeMap<u32, ToolInvocation> = BTreeMap::new();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk
                .map_err(|e| GigmatchError::OpenAI(format!("Chat stream failed: {}", e)))?;
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };

            if let Some(text) = choice.delta.content {
                if !text.is_empty() {
                    yield ModelDelta::Text(text);
                }
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let call = partial.entry(fragment.index).or_insert_with(|| ToolInvocation {
                    id: String::new(),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(id) = fragment.id {
                    call.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }
        }

        if !partial.is_empty() {
            debug!("Model streamed {} tool calls", partial.len());
            yield ModelDelta::ToolCalls(partial.into_values().collect());
        }
    }
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let build_error = |e: async_openai::error::OpenAIError| GigmatchError::Model(e.to_string());

    let message = match message {
        Message::System(content) => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(build_error)?
            .into(),
        Message::User(content) => ChatCompletionRequestUserMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(build_error)?
            .into(),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(content) = content {
                args.content(content.clone());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build().map_err(build_error)?.into()
        }
        Message::Tool { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id.clone())
            .content(content.clone())
            .build()
            .map_err(build_error)?
            .into(),
    };
    Ok(message)
}

fn to_tool(spec: &ToolSpec) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters: Some(spec.parameters.clone()),
            strict: None,
        },
    }
}
