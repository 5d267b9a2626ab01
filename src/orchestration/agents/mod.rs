// Sub-agent implementations

mod calendar;
mod database;
mod tool_agent;
mod weather;

pub use calendar::CalendarAgent;
pub use database::DatabaseAgent;
pub use tool_agent::{Tool, ToolAgent};
pub use weather::WeatherAgent;

use super::context::ConversationContext;
use super::types::AgentKind;
use crate::config::AdvisorConfig;
use crate::llm::{ChatModel, LlmError};
use crate::tools::{GoogleCalendar, SupabaseStore, ToolError, WttrProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Base trait for all sub-agents
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer a natural-language query
    async fn run(&self, query: &str, context: &ConversationContext) -> Result<AgentOutput, AgentError>;

    fn kind(&self) -> AgentKind;

    fn capabilities(&self) -> &str;

    /// Drop any state kept between calls
    async fn reset(&self) {}
}

/// Final text of a sub-agent call
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub output: String,
    /// Tool names called while producing the output, in order
    pub tools_used: Vec<String>,
}

/// Append known preferences to the query so the sub-agent can use them
pub(crate) fn with_preference_hint(query: &str, context: &ConversationContext) -> String {
    let prefs = context.user_preferences.describe();
    if prefs.is_empty() {
        query.to_string()
    } else {
        format!("{}\n\n(Known user preferences: {})", query, prefs)
    }
}

/// Registry for managing sub-agents
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Build every agent whose backing service is configured. An agent that
    /// cannot start is logged and left out; the rest still register.
    pub fn from_config(config: &AdvisorConfig, model: Arc<dyn ChatModel>) -> Result<Self, AgentError> {
        let mut registry = Self::new();
        let rounds = config.orchestrator.max_tool_rounds;

        match WttrProvider::new(&config.weather) {
            Ok(provider) => registry.register(Arc::new(WeatherAgent::new(
                model.clone(),
                Arc::new(provider),
                rounds,
            ))),
            Err(e) => tracing::error!(error = %e, "Failed to initialize weather agent"),
        }

        match GoogleCalendar::new(&config.calendar) {
            Ok(provider) => registry.register(Arc::new(CalendarAgent::new(
                model.clone(),
                Arc::new(provider),
                rounds,
            ))),
            Err(e) => tracing::error!(error = %e, "Failed to initialize calendar agent"),
        }

        match SupabaseStore::new(&config.database) {
            Ok(store) => registry.register(Arc::new(DatabaseAgent::new(
                model.clone(),
                Arc::new(store),
                rounds,
            ))),
            Err(e) => tracing::error!(error = %e, "Failed to initialize database agent"),
        }

        if registry.is_empty() {
            return Err(AgentError::NoAgents);
        }

        tracing::info!(agents = ?registry.kinds(), "agents initialized");
        Ok(registry)
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.kind(), agent);
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn Agent>> {
        self.agents.get(&kind).cloned()
    }

    /// Registered kinds in a stable order
    pub fn kinds(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|k| self.agents.contains_key(k))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("No answer after {0} tool rounds")]
    ToolRoundsExceeded(usize),

    #[error("No agents could be initialized")]
    NoAgents,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::orchestration::context::UserPreferences;

    #[test]
    fn test_registry_skips_agents_without_credentials() {
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(vec![]));
        let registry = AgentRegistry::from_config(&AdvisorConfig::default(), model).unwrap();

        assert_eq!(registry.kinds(), vec![AgentKind::Weather]);
        assert!(registry.get(AgentKind::Calendar).is_none());
    }

    #[test]
    fn test_registry_with_all_credentials() {
        let mut config = AdvisorConfig::default();
        config.calendar.access_token = Some("token".to_string());
        config.database.url = Some("https://example.supabase.co".to_string());
        config.database.api_key = Some("key".to_string());

        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(vec![]));
        let registry = AgentRegistry::from_config(&config, model).unwrap();
        assert_eq!(registry.kinds(), AgentKind::ALL.to_vec());
    }

    #[test]
    fn test_preference_hint() {
        let mut context = ConversationContext::default();
        assert_eq!(with_preference_hint("hi", &context), "hi");

        context.user_preferences = UserPreferences {
            duration_hours: Some(3),
            ..Default::default()
        };
        assert!(with_preference_hint("hi", &context).contains("duration: 3 hours"));
    }
}
