// Calendar Agent - schedule and availability lookups

use super::{Agent, AgentError, AgentOutput, Tool, ToolAgent, with_preference_hint};
use crate::llm::{ChatMessage, ChatModel, ToolDefinition};
use crate::orchestration::context::ConversationContext;
use crate::orchestration::types::AgentKind;
use crate::tools::{CalendarProvider, ToolError, parse_date};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Calendar agent. Remembers its previous exchanges so events fetched earlier
/// in the session can be reused without another lookup.
pub struct CalendarAgent {
    inner: ToolAgent,
    history: Mutex<Vec<ChatMessage>>,
    today: Option<NaiveDate>,
}

impl CalendarAgent {
    pub fn new(model: Arc<dyn ChatModel>, provider: Arc<dyn CalendarProvider>, max_rounds: usize) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(GetEvents { provider })];
        Self {
            inner: ToolAgent::new(model, tools, max_rounds),
            history: Mutex::new(Vec::new()),
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn build_prompt(&self) -> String {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        format!(
            r#"Today is {today} ({weekday}).
You are a helpful assistant that helps users check their calendar.

If the user asks about appointments, availability, or events on a specific day:
- Check whether the events for that date already appear in the conversation so far.
- If they do, use that data.
- If not, extract the date from the input, convert it to YYYY-MM-DD, then call the
  `get_events` tool with the extracted date. Call it once per day when several days are asked for.

Example:
User: "What appointments do I have on the 6th of June?"
-> Extracted date: "{year}-06-06"
-> Call tool: get_events(date="{year}-06-06")

Include all events of the day in your answer. Events without a start or end time run
from 00:00 to 23:59. Events spanning several days count as all-day events on every day
between their start and end.

Return the result as a JSON object in this format:
{{
  "action": "return_scheduled_events",
  "data": {{
    "date": "<actual date in YYYY-MM-DD>",
    "events": [{{"start": "<HH:MM>", "end": "<HH:MM>", "summary": "<summary>"}}]
  }}
}}"#,
            today = today.format("%Y-%m-%d"),
            weekday = today.format("%A"),
            year = today.format("%Y"),
        )
    }
}

#[async_trait]
impl Agent for CalendarAgent {
    async fn run(&self, query: &str, context: &ConversationContext) -> Result<AgentOutput, AgentError> {
        let query = with_preference_hint(query, context);
        let mut history = self.history.lock().await;

        let output = self.inner.run(self.build_prompt(), &history, &query).await?;

        history.push(ChatMessage::user(query));
        history.push(ChatMessage::assistant(output.output.clone()));
        Ok(output)
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Calendar
    }

    fn capabilities(&self) -> &str {
        "Reads the user's calendar to find events and free time on given days"
    }

    async fn reset(&self) {
        self.history.lock().await.clear();
    }
}

struct GetEvents {
    provider: Arc<dyn CalendarProvider>,
}

#[derive(Deserialize)]
struct GetEventsArgs {
    date: String,
}

#[async_trait]
impl Tool for GetEvents {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "get_events",
            "Get the events stored in the user's calendar for one day.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Day to look up, in YYYY-MM-DD format"
                    }
                },
                "required": ["date"]
            }),
        )
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: GetEventsArgs =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let schedule = self.provider.events_on(parse_date(&args.date)?).await?;
        serde_json::to_value(schedule).map_err(|e| ToolError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{Role, ToolCall};
    use crate::tools::{CalendarEvent, DaySchedule};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCalendar {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CalendarProvider for CountingCalendar {
        async fn events_on(&self, date: NaiveDate) -> Result<DaySchedule, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DaySchedule {
                date: date.to_string(),
                events: vec![CalendarEvent {
                    start: "09:00".to_string(),
                    end: "10:00".to_string(),
                    summary: "Standup".to_string(),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_history_carries_between_calls() {
        let calendar = Arc::new(CountingCalendar::default());
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatMessage::assistant("").with_tool_calls(vec![ToolCall::new(
                "get_events",
                serde_json::json!({"date": "2025-06-07"}),
            )])),
            Ok(ChatMessage::assistant("Standup 09:00-10:00")),
            Ok(ChatMessage::assistant("Still just the standup.")),
        ]));
        let agent = CalendarAgent::new(model.clone(), calendar.clone(), 3)
            .with_today(NaiveDate::from_ymd_opt(2025, 6, 6).unwrap());
        let context = ConversationContext::default();

        agent.run("Am I free tomorrow?", &context).await.unwrap();
        let second = agent.run("And in the morning?", &context).await.unwrap();

        assert_eq!(second.output, "Still just the standup.");
        assert!(second.tools_used.is_empty());
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);

        let last_request = model.requests().pop().unwrap();
        let roles: Vec<Role> = last_request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);

        agent.reset().await;
        assert!(agent.history.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_is_not_remembered() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let agent = CalendarAgent::new(model, Arc::new(CountingCalendar::default()), 3);

        let result = agent.run("Am I free?", &ConversationContext::default()).await;
        assert!(result.is_err());
        assert!(agent.history.lock().await.is_empty());
    }
}
