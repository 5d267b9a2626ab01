// Database Agent - searches the outdoor activities store

use super::{Agent, AgentError, AgentOutput, Tool, ToolAgent, with_preference_hint};
use crate::llm::{ChatModel, ToolDefinition};
use crate::orchestration::context::ConversationContext;
use crate::orchestration::types::AgentKind;
use crate::tools::{ActivityFilter, ActivityStore, ToolError};
use async_trait::async_trait;
use std::sync::Arc;

const CATEGORIES: &[&str] = &[
    "Long distance cycling",
    "Winter hiking",
    "Alpine tour",
    "MTB Transalp",
    "Trail running",
    "Cycle routes",
    "Mountainbiking",
    "Gravel Bike",
    "Hiking with kids",
    "Long distance hiking trail",
    "Mountain tour",
    "Alpine climbing",
    "Hiking trail",
];

pub struct DatabaseAgent {
    inner: ToolAgent,
}

impl DatabaseAgent {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn ActivityStore>, max_rounds: usize) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(QueryActivities { store })];
        Self {
            inner: ToolAgent::new(model, tools, max_rounds),
        }
    }

    fn build_prompt(&self) -> String {
        r#"You are a database query generator. Given a natural language request, use the
`query_activities` tool to retrieve hiking, biking and other outdoor activities.

Your job has two steps:
1. Extract the relevant filters from the request (category, difficulty, duration, region, ...)
   and pass them as arguments to the tool. Only pass filters the user actually mentioned,
   translating natural language where needed (e.g. 'easy' is 0, 'hard' is 3, '3 hours' is
   duration_min 180).
2. Turn the rows returned by the tool into the final JSON output.

Example request: 'I want to go for a long hike in the Brenta Dolomites with medium difficulty
and around 3 hours long.'
Extracted filters:
- category: 'Hiking'
- difficulty: 1
- duration_min: 180
- region: 'Brenta'

Return a JSON object in the following format:
{
  "action": "return_activities",
  "data": [
    {
      "title": "<title of the activity>",
      "location": "<region or primary_region>",
      "length": "<length_m>",
      "difficulty": "<difficulty>"
    }
  ]
}"#
        .to_string()
    }
}

#[async_trait]
impl Agent for DatabaseAgent {
    async fn run(&self, query: &str, context: &ConversationContext) -> Result<AgentOutput, AgentError> {
        self.inner
            .run(self.build_prompt(), &[], &with_preference_hint(query, context))
            .await
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Database
    }

    fn capabilities(&self) -> &str {
        "Searches the activities database by category, difficulty, duration, length, altitude and region"
    }
}

struct QueryActivities {
    store: Arc<dyn ActivityStore>,
}

#[async_trait]
impl Tool for QueryActivities {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "query_activities",
            "Query the outdoor activities database. All parameters are optional.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "category": {"type": "string", "description": format!("One of: {}", CATEGORIES.join(", "))},
                    "difficulty": {"type": "integer", "enum": [0, 1, 2, 3]},
                    "duration_min": {"type": "integer", "description": "Minimum duration in minutes"},
                    "length_m": {"type": "integer", "description": "Minimum length in meters"},
                    "ascent_m": {"type": "integer", "description": "Minimum ascent in meters"},
                    "descent_m": {"type": "integer", "description": "Maximum descent in meters"},
                    "min_altitude": {"type": "integer", "description": "Lowest point, at least this many meters"},
                    "max_altitude": {"type": "integer", "description": "Highest point, at most this many meters"},
                    "experience": {"type": "integer", "enum": [0, 1, 2, 3, 4, 5, 6]},
                    "region": {"type": "string"},
                    "primary_region": {"type": "string"},
                    "limit": {"type": "integer", "description": "Maximum number of results"}
                }
            }),
        )
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let filter: ActivityFilter = if arguments.is_null() {
            ActivityFilter::default()
        } else {
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))?
        };

        let rows = self.store.query(&filter).await?;
        Ok(serde_json::Value::Array(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{ChatMessage, ToolCall};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        filters: Mutex<Vec<ActivityFilter>>,
    }

    #[async_trait]
    impl ActivityStore for RecordingStore {
        async fn query(&self, filter: &ActivityFilter) -> Result<Vec<serde_json::Value>, ToolError> {
            self.filters.lock().unwrap().push(filter.clone());
            Ok(vec![serde_json::json!({
                "title": "Sentiero del Ponale",
                "region": "Garda",
                "length_m": 9800,
                "difficulty": 1
            })])
        }
    }

    #[tokio::test]
    async fn test_filter_passed_to_store() {
        let store = Arc::new(RecordingStore::default());
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatMessage::assistant("").with_tool_calls(vec![ToolCall::new(
                "query_activities",
                serde_json::json!({"category": "Hiking", "difficulty": 1, "duration_min": 240, "region": "Garda"}),
            )])),
            Ok(ChatMessage::assistant(
                r#"{"action": "return_activities", "data": [{"title": "Sentiero del Ponale", "location": "Garda"}]}"#,
            )),
        ]));
        let agent = DatabaseAgent::new(model.clone(), store.clone(), 3);

        let output = agent
            .run(
                "Medium hike around Garda for up to 4 hours",
                &ConversationContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(output.tools_used, vec!["query_activities"]);
        let filters = store.filters.lock().unwrap();
        assert_eq!(filters[0].duration_min, Some(240));
        assert_eq!(filters[0].region.as_deref(), Some("Garda"));
        assert!(model.requests()[1].messages.last().unwrap().content.contains("Sentiero del Ponale"));
    }

    #[tokio::test]
    async fn test_wrongly_typed_arguments() {
        let tool = QueryActivities {
            store: Arc::new(RecordingStore::default()),
        };
        let result = tool.call(serde_json::json!({"difficulty": "hard"})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
