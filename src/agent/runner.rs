//! Agent runner with tool calling loop.

use super::events::{ContentChunk, ContentStage, RunEvent};
use super::model::{ChatModel, Message, ModelDelta, ToolInvocation, ToolSpec};
use super::tools::{
    match_score_tool, member_slug, parse_tool_call, search_knowledge_tool, transfer_tool,
    AgentTool,
};
use crate::config::{AgentRole, AgentSettings, InstructionScript, Prompts, RagPrompts};
use crate::error::{GigmatchError, Result};
use crate::knowledge::{format_hits_for_prompt, KnowledgeBase};
use crate::scoring::{self, ScoredMatch, ScoringWeights};
use async_stream::try_stream;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// An agent: a model with instructions, optional knowledge and optional team members.
///
/// With a knowledge base it answers from retrieved records. With members and an
/// instruction script it coordinates them through transfer tools.
pub struct Agent {
    name: String,
    role: String,
    instructions: Vec<String>,
    model: Arc<dyn ChatModel>,
    knowledge: Option<Arc<KnowledgeBase>>,
    members: Vec<Arc<Agent>>,
    script: Option<InstructionScript>,
    rag: RagPrompts,
    variables: HashMap<String, String>,
    flags: AgentSettings,
    scoring: Option<ScoringWeights>,
    max_iterations: usize,
}

impl Agent {
    /// Create a new agent with the given name and model.
    pub fn new(name: &str, model: Arc<dyn ChatModel>) -> Self {
        Self {
            name: name.to_string(),
            role: String::new(),
            instructions: Vec::new(),
            model,
            knowledge: None,
            members: Vec::new(),
            script: None,
            rag: RagPrompts::default(),
            variables: HashMap::new(),
            flags: AgentSettings::default(),
            scoring: None,
            max_iterations: 10,
        }
    }

    /// Create an agent from a configured role.
    pub fn from_role(role: &AgentRole, model: Arc<dyn ChatModel>) -> Self {
        Self::new(&role.name, model)
            .with_role(&role.role)
            .with_instructions(role.instructions.clone())
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Bind a knowledge base.
    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Add team members, in routing order.
    pub fn with_members(mut self, members: Vec<Arc<Agent>>) -> Self {
        self.members = members;
        self
    }

    /// Use an instruction script. The agent takes the script's name.
    pub fn with_script(mut self, script: InstructionScript) -> Self {
        self.name = script.name.clone();
        self.role = script.description.clone();
        self.script = Some(script);
        self
    }

    /// Use RAG templates and custom variables from loaded prompts.
    pub fn with_prompts(mut self, prompts: &Prompts) -> Self {
        self.rag = prompts.rag.clone();
        self.variables = prompts.variables.clone();
        self
    }

    pub fn with_flags(mut self, flags: AgentSettings) -> Self {
        self.flags = flags;
        self
    }

    /// Enable the match scoring tool.
    pub fn with_scoring(mut self, weights: ScoringWeights) -> Self {
        self.scoring = Some(weights);
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn members(&self) -> &[Arc<Agent>] {
        &self.members
    }

    pub fn knowledge(&self) -> Option<&Arc<KnowledgeBase>> {
        self.knowledge.as_ref()
    }

    /// Tools offered to the model.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        let mut tools = Vec::new();
        if let Some(knowledge) = &self.knowledge {
            if self.flags.search_knowledge {
                tools.push(search_knowledge_tool(knowledge.collection()));
            }
        }
        for member in &self.members {
            tools.push(transfer_tool(&member.name, &member.role));
        }
        if self.scoring.is_some() {
            tools.push(match_score_tool());
        }
        tools
    }

    /// Assemble the system prompt.
    pub fn system_prompt(&self) -> String {
        let mut sections = Vec::new();

        match &self.script {
            Some(script) => {
                sections.push(script.description.clone());
                sections.push(format!("Your task: {}", script.task));
                sections.push(numbered("Instructions:", &script.instructions));
            }
            None => {
                sections.push(format!("Your name is {}. {}", self.name, self.role));
                sections.push(bulleted("Instructions:", &self.instructions));
            }
        }

        if let Some(knowledge) = &self.knowledge {
            sections.push(self.render(&self.rag.grounding, &[("collection", knowledge.collection())]));
        }

        if !self.members.is_empty() {
            let roster: Vec<String> = self
                .members
                .iter()
                .map(|m| format!("{}: {}", m.name, m.role))
                .collect();
            sections.push(bulleted(
                "You lead a team. Delegate each sub-task to exactly one member with its transfer tool:",
                &roster,
            ));
        }

        if self.flags.markdown {
            sections.push(self.rag.markdown.clone());
        }

        sections.retain(|s| !s.trim().is_empty());
        sections.join("\n\n")
    }

    fn render(&self, template: &str, vars: &[(&str, &str)]) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.to_string(), value.to_string());
        }
        Prompts::render(template, &merged)
    }

    async fn initial_messages(&self, query: &str) -> Result<Vec<Message>> {
        let mut user_message = query.to_string();

        if self.flags.add_references {
            if let Some(knowledge) = &self.knowledge {
                let hits = knowledge.search(query, None).await?;
                debug!("Injecting {} references into the prompt", hits.len());
                let references = format_hits_for_prompt(&hits);
                user_message = self.render(
                    &self.rag.references,
                    &[
                        ("query", query),
                        ("collection", knowledge.collection()),
                        ("references", &references),
                    ],
                );
            }
        }

        Ok(vec![
            Message::System(self.system_prompt()),
            Message::User(user_message),
        ])
    }

    fn check_iterations(&self, iterations: usize) -> Result<()> {
        if iterations > self.max_iterations {
            return Err(GigmatchError::Agent(format!(
                "{} exceeded maximum iterations ({})",
                self.name, self.max_iterations
            )));
        }
        Ok(())
    }

    /// Run the agent on a query and return the complete response.
    #[instrument(skip(self, query), fields(agent = %self.name))]
    pub async fn run(&self, query: &str) -> Result<AgentResponse> {
        let mut messages = self.initial_messages(query).await?;
        let tools = self.tool_specs();

        let mut iterations = 0;
        let mut content = String::new();
        let mut tool_calls_made = Vec::new();
        let mut matches = Vec::new();

        loop {
            iterations += 1;
            self.check_iterations(iterations)?;
            debug!("Agent iteration {}", iterations);

            let turn = self.model.complete(&messages, &tools).await?;
            if let Some(text) = &turn.content {
                content.push_str(text);
            }

            if turn.tool_calls.is_empty() {
                return Ok(AgentResponse {
                    content,
                    tool_calls: tool_calls_made,
                    iterations,
                    matches,
                });
            }

            messages.push(Message::Assistant {
                content: turn.content.filter(|c| !c.is_empty()),
                tool_calls: turn.tool_calls.clone(),
            });

            for call in &turn.tool_calls {
                let outcome = self.execute_tool_call(call).await?;

                messages.push(Message::Tool {
                    call_id: call.id.clone(),
                    content: outcome.result.clone(),
                });

                tool_calls_made.push(ToolCallRecord {
                    agent: self.name.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: outcome.result,
                });
                if let Some(member) = outcome.member {
                    tool_calls_made.extend(member.response.tool_calls);
                    matches.extend(member.response.matches);
                }
                if let Some(scored) = outcome.scored {
                    matches.push(scored);
                }
            }
        }
    }

    /// Boxed form of [`Agent::run`], used when a coordinator runs its members.
    pub fn run_boxed<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<AgentResponse>> {
        Box::pin(self.run(query))
    }

    /// Run the agent on a query, emitting events as they are produced.
    ///
    /// The agent's own text is final-answer content. Member answers are
    /// intermediate content. Tool-call events are emitted only when
    /// `show_tool_calls` is set.
    pub fn run_stream<'a>(&'a self, query: &'a str) -> BoxStream<'a, Result<RunEvent>> {
        self.events(query).boxed()
    }

    fn events<'a>(&'a self, query: &'a str) -> impl Stream<Item = Result<RunEvent>> + Send + 'a {
        try_stream! {
            yield RunEvent::RunStarted { agent: self.name.clone() };

            let mut messages = self.initial_messages(query).await?;
            let tools = self.tool_specs();
            let show_tool_calls = self.flags.show_tool_calls;
            let mut iterations = 0;

            loop {
                iterations += 1;
                self.check_iterations(iterations)?;
                debug!("Agent stream iteration {}", iterations);

                let mut deltas = self.model.stream(&messages, &tools).await?;
                let mut text = String::new();
                let mut calls: Vec<ToolInvocation> = Vec::new();

                while let Some(delta) = deltas.next().await {
                    match delta? {
                        ModelDelta::Text(fragment) => {
                            if fragment.is_empty() {
                                continue;
                            }
                            text.push_str(&fragment);
                            yield RunEvent::Content(ContentChunk::text(
                                &self.name,
                                ContentStage::FinalAnswer,
                                fragment,
                            ));
                        }
                        ModelDelta::ToolCalls(mut batch) => calls.append(&mut batch),
                    }
                }

                if calls.is_empty() {
                    break;
                }

                messages.push(Message::Assistant {
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: calls.clone(),
                });

                for call in &calls {
                    if show_tool_calls {
                        yield RunEvent::ToolCallStarted {
                            agent: self.name.clone(),
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        };
                    }

                    let outcome = self.execute_tool_call(call).await?;

                    if let Some(member) = &outcome.member {
                        if show_tool_calls {
                            for record in &member.response.tool_calls {
                                yield RunEvent::ToolCallStarted {
                                    agent: record.agent.clone(),
                                    name: record.name.clone(),
                                    arguments: record.arguments.clone(),
                                };
                                yield RunEvent::ToolCallCompleted {
                                    agent: record.agent.clone(),
                                    name: record.name.clone(),
                                    result: record.result.clone(),
                                };
                            }
                        }
                        yield RunEvent::Content(ContentChunk::text(
                            &member.agent,
                            ContentStage::Intermediate,
                            member.response.content.clone(),
                        ));
                    }

                    if let Some(scored) = &outcome.scored {
                        yield RunEvent::Content(ContentChunk::structured(
                            &self.name,
                            ContentStage::FinalAnswer,
                            serde_json::to_value(scored)?,
                        ));
                    }

                    if show_tool_calls {
                        yield RunEvent::ToolCallCompleted {
                            agent: self.name.clone(),
                            name: call.name.clone(),
                            result: outcome.result.clone(),
                        };
                    }

                    messages.push(Message::Tool {
                        call_id: call.id.clone(),
                        content: outcome.result,
                    });
                }
            }

            yield RunEvent::RunCompleted {
                agent: self.name.clone(),
                iterations,
            };
        }
    }

    /// Execute a single tool call.
    ///
    /// Malformed calls are reported back to the model as text. Failures of the
    /// knowledge base or of a member run fail the whole run.
    async fn execute_tool_call(&self, call: &ToolInvocation) -> Result<ToolOutcome> {
        info!(
            "{} calling tool: {} with args: {}",
            self.name, call.name, call.arguments
        );

        let tool = match parse_tool_call(&call.name, &call.arguments) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("Rejected tool call from {}: {}", self.name, e);
                return Ok(ToolOutcome::text(format!("Failed to parse tool call: {}", e)));
            }
        };

        match tool {
            AgentTool::SearchKnowledgeBase { query, limit } => {
                let Some(knowledge) = self.knowledge.as_ref().filter(|_| self.flags.search_knowledge)
                else {
                    return Ok(ToolOutcome::text(
                        "Tool error: no knowledge base is available to search".to_string(),
                    ));
                };
                let hits = knowledge.search(&query, limit).await?;
                Ok(ToolOutcome::text(format_hits_for_prompt(&hits)))
            }

            AgentTool::TransferTask {
                member,
                task_description,
                expected_output,
            } => {
                let Some(agent) = self.members.iter().find(|m| member_slug(&m.name) == member)
                else {
                    return Ok(ToolOutcome::text(format!(
                        "Tool error: no team member called {}",
                        member
                    )));
                };

                let task = match expected_output {
                    Some(expected) => format!("{}\n\nExpected output: {}", task_description, expected),
                    None => task_description,
                };
                let response = agent.run_boxed(&task).await?;
                info!(
                    "{} finished with {} tool calls in {} iterations",
                    agent.name,
                    response.tool_calls.len(),
                    response.iterations
                );

                Ok(ToolOutcome {
                    result: response.content.clone(),
                    member: Some(MemberRun {
                        agent: agent.name.clone(),
                        response,
                    }),
                    scored: None,
                })
            }

            AgentTool::CalculateMatchScore {
                artist,
                venue,
                factors,
            } => {
                let Some(weights) = &self.scoring else {
                    return Ok(ToolOutcome::text(
                        "Tool error: match scoring is not enabled".to_string(),
                    ));
                };
                match scoring::score(&factors, weights) {
                    Ok(score) => Ok(ToolOutcome {
                        result: format!(
                            "{} at {}: {:.1}/100 ({})",
                            artist, venue, score.value, score.grade
                        ),
                        member: None,
                        scored: Some(ScoredMatch {
                            artist,
                            venue,
                            factors,
                            score,
                        }),
                    }),
                    Err(e) => Ok(ToolOutcome::text(format!("Tool error: {}", e))),
                }
            }
        }
    }
}

fn numbered(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect();
    format!("{}\n{}", heading, lines.join("\n"))
}

fn bulleted(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = items.iter().map(|item| format!("- {}", item)).collect();
    format!("{}\n{}", heading, lines.join("\n"))
}

struct ToolOutcome {
    /// Text returned to the model.
    result: String,
    member: Option<MemberRun>,
    scored: Option<ScoredMatch>,
}

impl ToolOutcome {
    fn text(result: String) -> Self {
        Self {
            result,
            member: None,
            scored: None,
        }
    }
}

struct MemberRun {
    agent: String,
    response: AgentResponse,
}

/// Response from an agent run.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The response text.
    pub content: String,
    /// Every tool call made during the run, including those of team members.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (model calls) used.
    pub iterations: usize,
    /// Match scores computed during the run.
    pub matches: Vec<ScoredMatch>,
}

/// Record of a tool call made by an agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Agent that made the call.
    pub agent: String,
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
