// Core types for the orchestration system

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sub-agent specializations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Calendar,
    Weather,
    Database,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Calendar, AgentKind::Weather, AgentKind::Database];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Calendar => "calendar",
            AgentKind::Weather => "weather",
            AgentKind::Database => "database",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Calendar => "Check user's schedule, availability for specific dates",
            AgentKind::Weather => "Get weather forecasts for locations and dates",
            AgentKind::Database => "Query outdoor activities database (hiking, biking, etc.)",
        }
    }

    /// Parse an agent name as written by the model
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "calendar" => Some(AgentKind::Calendar),
            "weather" => Some(AgentKind::Weather),
            "database" | "activities" => Some(AgentKind::Database),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How selected agents are dispatched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Parallel,
    #[default]
    Sequential,
}

/// Routing decision for one query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDecision {
    pub agents: Vec<AgentKind>,
    pub reasoning: String,
    pub clarifying_questions: Vec<String>,
    pub sufficient_info: bool,
}

impl RoutingDecision {
    /// Whether the turn should stop and ask the user instead of invoking agents
    pub fn needs_clarification(&self) -> bool {
        !self.clarifying_questions.is_empty() && !self.sufficient_info
    }
}

/// Outcome of one sub-agent call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: AgentKind,
    pub success: bool,
    /// Best-effort structured view of `raw_output`
    pub data: Option<serde_json::Value>,
    pub raw_output: String,
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn success(agent: AgentKind, raw_output: String, data: serde_json::Value) -> Self {
        Self {
            agent,
            success: true,
            data: Some(data),
            raw_output,
            error: None,
        }
    }

    pub fn failed(agent: AgentKind, error: String) -> Self {
        Self {
            agent,
            success: false,
            data: None,
            raw_output: String::new(),
            error: Some(error),
        }
    }
}

/// Aggregated reading of all agent responses for one turn
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Analysis {
    #[serde(default)]
    pub key_info: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub user_situation: String,
    #[serde(default)]
    pub missing_info: Vec<String>,
    #[serde(default)]
    pub recommendations_ready: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// Activity shown to the user in a recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivitySuggestion {
    pub title: String,
    pub location: Option<String>,
    pub length: Option<String>,
    pub difficulty: Option<String>,
}

/// Everything produced during one orchestrator turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub reply: String,
    pub decision: Option<RoutingDecision>,
    pub responses: Vec<AgentResponse>,
    pub analysis: Option<Analysis>,
}

/// Configuration for the orchestration pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Exchanges kept in conversation memory
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,

    /// Recent messages shown to the router
    #[serde(default = "default_routing_history")]
    pub routing_history: usize,

    /// Recent messages shown to the response writer
    #[serde(default = "default_synthesis_history")]
    pub synthesis_history: usize,

    #[serde(default)]
    pub execution: ExecutionMode,

    /// Upper bound on model/tool round trips inside one sub-agent call
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_memory_window() -> usize {
    10
}

fn default_routing_history() -> usize {
    6
}

fn default_synthesis_history() -> usize {
    4
}

fn default_max_tool_rounds() -> usize {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            memory_window: default_memory_window(),
            routing_history: default_routing_history(),
            synthesis_history: default_synthesis_history(),
            execution: ExecutionMode::default(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_names() {
        assert_eq!(AgentKind::from_name(" Weather "), Some(AgentKind::Weather));
        assert_eq!(AgentKind::from_name("activities"), Some(AgentKind::Database));
        assert_eq!(AgentKind::from_name("email"), None);
        for kind in AgentKind::ALL {
            assert_eq!(AgentKind::from_name(kind.as_str()), Some(kind));
            assert!(!kind.description().is_empty());
        }
    }

    #[test]
    fn test_clarification_needed_only_when_insufficient() {
        let mut decision = RoutingDecision {
            agents: vec![AgentKind::Database],
            reasoning: String::new(),
            clarifying_questions: vec!["Where?".to_string()],
            sufficient_info: false,
        };
        assert!(decision.needs_clarification());

        decision.sufficient_info = true;
        assert!(!decision.needs_clarification());

        decision.sufficient_info = false;
        decision.clarifying_questions.clear();
        assert!(!decision.needs_clarification());
    }

    #[test]
    fn test_analysis_tolerates_missing_fields() {
        let analysis: Analysis = serde_json::from_str(r#"{"missing_info": ["region"]}"#).unwrap();
        assert_eq!(analysis.missing_info, vec!["region"]);
        assert!(!analysis.recommendations_ready);
    }
}
