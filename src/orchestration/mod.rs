// Orchestration module - routes user queries to sub-agents and merges their answers

pub mod agents;
pub mod context;
pub mod orchestrator;
pub mod parse;
pub mod types;

pub use agents::{Agent, AgentError, AgentOutput, AgentRegistry};
pub use context::{ConversationContext, ConversationMemory, Session, UserPreferences, extract_preferences};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use parse::ModelReply;
pub use types::{
    ActivitySuggestion, AgentKind, AgentResponse, Analysis, ExecutionMode, OrchestratorConfig, RoutingDecision,
    TurnReport,
};
