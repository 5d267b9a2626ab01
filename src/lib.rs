//! Adventure Advisor
//!
//! Routes natural-language questions about outdoor activities, weather and
//! calendar availability to LLM-backed sub-agents and turns their answers
//! into a single conversational reply.

pub mod config;
pub mod llm;
pub mod orchestration;
pub mod preferences;
pub mod tools;

pub use config::AdvisorConfig;
pub use orchestration::{Orchestrator, Session};
