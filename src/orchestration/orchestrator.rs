// Orchestrator - routes queries to sub-agents and writes the final reply

use super::agents::{AgentError, AgentRegistry};
use super::context::{ConversationContext, Session, extract_preferences, suggestions_from};
use super::parse::{ModelReply, extract_structured_data};
use super::types::{
    AgentKind, AgentResponse, Analysis, ExecutionMode, OrchestratorConfig, RoutingDecision, TurnReport,
};
use crate::config::AdvisorConfig;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, LlmError, OllamaClient};
use futures_util::future::join_all;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

const CLARIFY_PREFIX: &str = "I'd love to help you find the perfect outdoor activity! ";
const EMPTY_QUERY_PROMPT: &str = "What kind of outdoor activity are you looking for, and where and when would you like to go?";
const FALLBACK_PREAMBLE: &str = "I'd be happy to help you plan your outdoor adventure!";
const APOLOGY: &str = "I apologize, but I encountered an error while processing your request. \
Let me try to help you anyway. Could you tell me what kind of outdoor activity you're interested in?";

const CALENDAR_TERMS: &[&str] = &[
    "calendar", "schedul", "meeting", "appointment", "busy", "free", "availab", "event", "today",
    "tomorrow", "tonight", "week", "morning", "afternoon", "evening", "monday", "tuesday",
    "wednesday", "thursday", "friday", "saturday", "sunday", "date",
];
// Matched as whole words so "marmolada" or "decide" stay out of the calendar
const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];
const WEATHER_TERMS: &[&str] = &[
    "weather", "forecast", "rain", "snow", "sunn", "sunrise", "sunset", "temperat", "wind", "storm",
    "cloud", "cold", "hot", "warm",
];
const ACTIVITY_TERMS: &[&str] = &[
    "activit", "hik", "bik", "cycl", "trail", "route", "climb", "trek", "walk", "recommend",
    "outdoor", "adventure", "tour",
];

// ISO dates, 07/06 or 07/06/2025, 07.06.2025 or 07-06-25, and ordinals like 7th
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}(/\d{2,4})?|\d{1,2}[.-]\d{1,2}[.-]\d{2,4}|\d{1,2}(st|nd|rd|th))\b",
    )
    .expect("valid date regex")
});

/// Routing decision as the model writes it
#[derive(Debug, Deserialize)]
struct RawRoutingDecision {
    #[serde(default)]
    agents_to_call: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    clarifying_questions: Vec<String>,
    #[serde(default)]
    sufficient_info: bool,
}

/// Main orchestrator. Stateless across sessions; all conversation state lives
/// in the [`Session`] passed to each turn.
pub struct Orchestrator {
    config: OrchestratorConfig,
    model: Arc<dyn ChatModel>,
    registry: AgentRegistry,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>, registry: AgentRegistry) -> Self {
        Self::with_config(OrchestratorConfig::default(), model, registry)
    }

    pub fn with_config(config: OrchestratorConfig, model: Arc<dyn ChatModel>, registry: AgentRegistry) -> Self {
        Self {
            config,
            model,
            registry,
        }
    }

    /// Build the model client and every agent the configuration allows
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, OrchestratorError> {
        let model: Arc<dyn ChatModel> = Arc::new(OllamaClient::new(&config.ollama)?);
        let registry = AgentRegistry::from_config(config, model.clone())?;
        tracing::info!(model = %model.name(), "orchestrator ready");
        Ok(Self::with_config(config.orchestrator.clone(), model, registry))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Fresh session sized to this orchestrator's memory window
    pub fn new_session(&self) -> Session {
        Session::new(self.config.memory_window)
    }

    /// Clear the session and any state the agents keep between calls
    pub async fn reset(&self, session: &mut Session) {
        session.clear();
        for kind in self.registry.kinds() {
            if let Some(agent) = self.registry.get(kind) {
                agent.reset().await;
            }
        }
    }

    /// Answer one user query
    pub async fn run(&self, session: &mut Session, query: &str) -> String {
        self.run_turn(session, query).await.reply
    }

    /// Answer one user query and return every intermediate result
    pub async fn run_turn(&self, session: &mut Session, query: &str) -> TurnReport {
        let query = query.trim();
        if query.is_empty() {
            let reply = format!("{}{}", CLARIFY_PREFIX, EMPTY_QUERY_PROMPT);
            session.record_turn(query, &reply);
            return TurnReport {
                reply,
                decision: None,
                responses: Vec::new(),
                analysis: None,
            };
        }

        let decision = self.route(session, query).await;
        tracing::info!(agents = ?decision.agents, reasoning = %decision.reasoning, "routing decision");

        if decision.needs_clarification() {
            let reply = format!("{}{}", CLARIFY_PREFIX, decision.clarifying_questions.join(" "));
            session.record_turn(query, &reply);
            return TurnReport {
                reply,
                decision: Some(decision),
                responses: Vec::new(),
                analysis: None,
            };
        }

        let responses = self.call_agents(query, &decision.agents, &session.context).await;

        let reply;
        let analysis;
        if responses.iter().any(|r| r.success) {
            analysis = self.reason(query, &session.context, &responses).await;
            reply = self.synthesize(session, query, &analysis, &responses).await;
        } else {
            tracing::warn!("no agent produced a usable result");
            analysis = fallback_analysis(&responses, "no agent produced a usable result");
            reply = APOLOGY.to_string();
        }

        update_context(&mut session.context, query, &responses, &analysis);
        session.record_turn(query, &reply);

        TurnReport {
            reply,
            decision: Some(decision),
            responses,
            analysis: Some(analysis),
        }
    }

    /// Ask the model which agents to call
    async fn route(&self, session: &Session, query: &str) -> RoutingDecision {
        let request = ChatRequest::new(vec![
            ChatMessage::system(self.build_routing_prompt(session)),
            ChatMessage::user(query),
        ])
        .json();

        let raw = match self.model.chat(request).await {
            Ok(message) => message.content,
            Err(e) => {
                tracing::warn!(error = %e, "routing call failed, using keyword routing");
                return RoutingDecision {
                    agents: keyword_route(query),
                    reasoning: format!("Error in routing: {}", e),
                    clarifying_questions: Vec::new(),
                    sufficient_info: false,
                };
            }
        };

        match ModelReply::<RawRoutingDecision>::from_text(&raw) {
            ModelReply::Parsed(parsed) => RoutingDecision {
                agents: normalize_agents(&parsed.agents_to_call),
                reasoning: parsed.reasoning,
                clarifying_questions: parsed
                    .clarifying_questions
                    .into_iter()
                    .filter(|q| !q.trim().is_empty())
                    .collect(),
                sufficient_info: parsed.sufficient_info,
            },
            ModelReply::ParseFailed(raw) => {
                tracing::warn!("routing reply was not valid JSON, scanning it for agent names");
                RoutingDecision {
                    agents: agents_mentioned(&raw),
                    reasoning: "Fallback parsing used".to_string(),
                    clarifying_questions: Vec::new(),
                    sufficient_info: false,
                }
            }
        }
    }

    fn build_routing_prompt(&self, session: &Session) -> String {
        let agents: String = self
            .registry
            .kinds()
            .iter()
            .map(|k| format!("- {}: {}\n", k, k.description()))
            .collect();

        format!(
            r#"You are an intelligent router for an Adventure Advisor system. Your goal is to help users find suitable outdoor activities.

CONVERSATION HISTORY:
{history}

CURRENT CONTEXT:
{context}

AVAILABLE AGENTS:
{agents}
ROUTING LOGIC:
1. If the user mentions dates or times, include "calendar"
2. If the user mentions weather concerns or outdoor plans, include "weather"
3. If the user asks for activity recommendations, always include "database"
4. If the information is too incomplete for good recommendations, ask clarifying questions

Return your decision as a JSON object:
{{
    "agents_to_call": ["agent1", "agent2"],
    "reasoning": "Why you chose these agents",
    "clarifying_questions": ["question1", "question2"],
    "sufficient_info": true
}}

The user's input follows."#,
            history = session.memory.format_recent(self.config.routing_history),
            context = session.context.to_prompt_json(),
            agents = agents,
        )
    }

    /// Invoke the selected agents. Failures are recorded, never propagated.
    async fn call_agents(
        &self,
        query: &str,
        agents: &[AgentKind],
        context: &ConversationContext,
    ) -> Vec<AgentResponse> {
        match self.config.execution {
            ExecutionMode::Parallel => join_all(agents.iter().map(|kind| self.invoke(*kind, query, context)))
                .await
                .into_iter()
                .flatten()
                .collect(),
            ExecutionMode::Sequential => {
                let mut responses = Vec::with_capacity(agents.len());
                for kind in agents {
                    if let Some(response) = self.invoke(*kind, query, context).await {
                        responses.push(response);
                    }
                }
                responses
            }
        }
    }

    async fn invoke(&self, kind: AgentKind, query: &str, context: &ConversationContext) -> Option<AgentResponse> {
        let Some(agent) = self.registry.get(kind) else {
            tracing::warn!(agent = %kind, "agent not available, skipping");
            return None;
        };

        match agent.run(query, context).await {
            Ok(output) => {
                tracing::info!(agent = %kind, tools = ?output.tools_used, "agent finished");
                let data = extract_structured_data(&output.output);
                Some(AgentResponse::success(kind, output.output, data))
            }
            Err(e) => {
                tracing::warn!(agent = %kind, error = %e, "agent failed");
                Some(AgentResponse::failed(kind, e.to_string()))
            }
        }
    }

    /// Read all agent outputs together
    async fn reason(&self, query: &str, context: &ConversationContext, responses: &[AgentResponse]) -> Analysis {
        let mut agent_text = String::new();
        for response in responses {
            let status = if response.success { "SUCCESS" } else { "FAILED" };
            agent_text.push_str(&format!(
                "\n{} ({}):\n{}\n",
                response.agent.as_str().to_uppercase(),
                status,
                response.raw_output
            ));
            if let Some(error) = &response.error {
                agent_text.push_str(&format!("Error: {}\n", error));
            }
        }

        let prompt = format!(
            r#"You are analyzing sub-agent responses to provide intelligent recommendations.

CONVERSATION CONTEXT:
{context}

AGENT RESPONSES:
{agent_text}
TASKS:
1. Extract the key information from each agent response
2. Identify conflicts or missing information
3. Describe the user's situation
4. Decide whether there is enough information for good recommendations

Provide your analysis as JSON:
{{
    "key_info": {{"<agent>": "summary of what it found"}},
    "user_situation": "short description of the user's situation",
    "missing_info": ["what information is still needed"],
    "recommendations_ready": true,
    "reasoning": "your step-by-step analysis"
}}

The user's query follows."#,
            context = context.to_prompt_json(),
        );

        let request = ChatRequest::new(vec![ChatMessage::system(prompt), ChatMessage::user(query)]).json();
        match self.model.chat(request).await {
            Ok(message) => match ModelReply::<Analysis>::from_text(&message.content) {
                ModelReply::Parsed(analysis) => analysis,
                ModelReply::ParseFailed(_) => {
                    tracing::warn!("analysis reply was not valid JSON, using fallback analysis");
                    fallback_analysis(responses, "analysis reply could not be parsed")
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "analysis call failed, using fallback analysis");
                fallback_analysis(responses, &e.to_string())
            }
        }
    }

    /// Write the conversational reply
    async fn synthesize(
        &self,
        session: &Session,
        query: &str,
        analysis: &Analysis,
        responses: &[AgentResponse],
    ) -> String {
        let agent_data: BTreeMap<AgentKind, &serde_json::Value> = responses
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.data.as_ref().map(|d| (r.agent, d)))
            .collect();

        let prompt = format!(
            r#"You are a helpful Adventure Advisor assistant. Write a natural, conversational reply.

CONVERSATION HISTORY:
{history}

ANALYSIS:
{analysis}

AGENT DATA:
{agent_data}

RESPONSE GUIDELINES:
1. Be conversational and helpful
2. When recommending activities, explain why they fit
3. Include relevant weather and calendar considerations
4. If information is missing, ask specific follow-up questions
5. Acknowledge earlier parts of the conversation

The user's query follows."#,
            history = session.memory.format_recent(self.config.synthesis_history),
            analysis = serde_json::to_string_pretty(analysis).unwrap_or_default(),
            agent_data = serde_json::to_string_pretty(&agent_data).unwrap_or_default(),
        );

        let request = ChatRequest::new(vec![ChatMessage::system(prompt), ChatMessage::user(query)]);
        match self.model.chat(request).await {
            Ok(message) if !message.content.trim().is_empty() => message.content,
            Ok(_) => {
                tracing::warn!("empty reply from model, using fallback reply");
                fallback_reply(responses, analysis)
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply call failed, using fallback reply");
                fallback_reply(responses, analysis)
            }
        }
    }
}

/// Map model-written agent names to known agents, dropping unknown names and
/// duplicates. Never empty.
fn normalize_agents(names: &[String]) -> Vec<AgentKind> {
    let mut agents = Vec::new();
    for kind in names.iter().filter_map(|n| AgentKind::from_name(n)) {
        if !agents.contains(&kind) {
            agents.push(kind);
        }
    }
    if agents.is_empty() {
        agents.push(AgentKind::Database);
    }
    agents
}

/// Agents named anywhere in a free-text routing reply
fn agents_mentioned(raw: &str) -> Vec<AgentKind> {
    let raw = raw.to_lowercase();
    let mut agents = Vec::new();
    if raw.contains("calendar") {
        agents.push(AgentKind::Calendar);
    }
    if raw.contains("weather") {
        agents.push(AgentKind::Weather);
    }
    if raw.contains("database") || raw.contains("activities") {
        agents.push(AgentKind::Database);
    }
    if agents.is_empty() {
        agents.push(AgentKind::Database);
    }
    agents
}

/// Route on the user's own words when the model is unreachable
fn keyword_route(query: &str) -> Vec<AgentKind> {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mentions = |terms: &[&str]| words.iter().any(|w| terms.iter().any(|t| w.starts_with(t)));

    let mut agents = Vec::new();
    let names_month = words.iter().any(|w| MONTHS.contains(w));
    if mentions(CALENDAR_TERMS) || names_month || DATE_PATTERN.is_match(&lower) {
        agents.push(AgentKind::Calendar);
    }
    if mentions(WEATHER_TERMS) {
        agents.push(AgentKind::Weather);
    }
    if mentions(ACTIVITY_TERMS) {
        agents.push(AgentKind::Database);
    }
    if agents.is_empty() {
        agents.push(AgentKind::Database);
    }
    agents
}

fn fallback_analysis(responses: &[AgentResponse], reason: &str) -> Analysis {
    Analysis {
        key_info: responses
            .iter()
            .filter(|r| r.success)
            .map(|r| (r.agent.to_string(), serde_json::Value::String(r.raw_output.clone())))
            .collect(),
        user_situation: "Unable to fully analyze the agent responses".to_string(),
        missing_info: Vec::new(),
        recommendations_ready: responses
            .iter()
            .any(|r| r.success && r.agent == AgentKind::Database),
        reasoning: format!("Fallback analysis: {}", reason),
    }
}

fn fallback_reply(responses: &[AgentResponse], analysis: &Analysis) -> String {
    let mut parts = vec![FALLBACK_PREAMBLE.to_string()];
    for response in responses.iter().filter(|r| r.success && !r.raw_output.is_empty()) {
        parts.push(format!("\n{}", response.raw_output));
    }
    if !analysis.missing_info.is_empty() {
        parts.push(format!(
            "\nTo give you better recommendations, could you tell me more about: {}",
            analysis.missing_info.join(", ")
        ));
    }
    parts.join("\n")
}

fn update_context(
    context: &mut ConversationContext,
    query: &str,
    responses: &[AgentResponse],
    analysis: &Analysis,
) {
    for response in responses.iter().filter(|r| r.success) {
        let Some(data) = &response.data else { continue };
        context.gathered_info.insert(response.agent, data.clone());

        if response.agent == AgentKind::Database {
            let suggestions = suggestions_from(data);
            if !suggestions.is_empty() {
                context.last_activity_suggestions = suggestions;
            }
        }
    }

    context.user_preferences.merge(&extract_preferences(query));
    context.pending_clarifications = analysis.missing_info.clone();
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Model client error: {0}")]
    Llm(#[from] LlmError),

    #[error("Agent setup failed: {0}")]
    Agents(#[from] AgentError),
}
