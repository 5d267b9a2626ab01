// Weather Agent - forecasts for a location and day

use super::{Agent, AgentError, AgentOutput, Tool, ToolAgent, with_preference_hint};
use crate::llm::{ChatModel, ToolDefinition};
use crate::orchestration::context::ConversationContext;
use crate::orchestration::types::AgentKind;
use crate::tools::{ToolError, WeatherProvider, parse_date};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;

pub struct WeatherAgent {
    inner: ToolAgent,
    today: Option<NaiveDate>,
}

impl WeatherAgent {
    pub fn new(model: Arc<dyn ChatModel>, provider: Arc<dyn WeatherProvider>, max_rounds: usize) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(GetWeather { provider })];
        Self {
            inner: ToolAgent::new(model, tools, max_rounds),
            today: None,
        }
    }

    /// Pin the date relative expressions are resolved against
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn build_prompt(&self) -> String {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        format!(
            r#"Today is {today} ({weekday}).
You look up weather forecasts for outdoor activities.

Extract the date and location from the user's request. Convert the date to YYYY-MM-DD,
resolving relative dates such as "tomorrow" or "next Saturday" against today. Then call
the `get_weather` tool with the extracted location and date.

Example:
User: "What will the weather be like on 6th of June in Berlin?"
-> Extracted date: "{year}-06-06"
-> Extracted location: "Berlin"
-> Call tool: get_weather(location="Berlin", date="{year}-06-06")

If no location is given, use the user's preferred location when it is known.

Return the result as a valid JSON object in this format:
{{
  "action": "return_weather",
  "data": {{
    "date": "<actual date in YYYY-MM-DD>",
    "location": "<location>",
    "forecast": [<returned weather information>]
  }}
}}"#,
            today = today.format("%Y-%m-%d"),
            weekday = today.format("%A"),
            year = today.format("%Y"),
        )
    }
}

#[async_trait]
impl Agent for WeatherAgent {
    async fn run(&self, query: &str, context: &ConversationContext) -> Result<AgentOutput, AgentError> {
        self.inner
            .run(self.build_prompt(), &[], &with_preference_hint(query, context))
            .await
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Weather
    }

    fn capabilities(&self) -> &str {
        "Weather forecasts (temperatures, precipitation, snowfall, sunrise, sunset) for a location and date"
    }
}

struct GetWeather {
    provider: Arc<dyn WeatherProvider>,
}

#[derive(Deserialize)]
struct GetWeatherArgs {
    location: String,
    date: String,
}

#[async_trait]
impl Tool for GetWeather {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "get_weather",
            "Get the weather forecast (high, low and average temperature, precipitation, snowfall, \
             sunrise, sunset) for a location and date.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City or region, e.g. 'Trento'"
                    },
                    "date": {
                        "type": "string",
                        "description": "Date in YYYY-MM-DD format"
                    }
                },
                "required": ["location", "date"]
            }),
        )
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: GetWeatherArgs =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let date = parse_date(&args.date)?;

        match self.provider.forecast(&args.location, date).await? {
            Some(forecast) => {
                serde_json::to_value(forecast).map_err(|e| ToolError::ParseError(e.to_string()))
            }
            None => Ok(serde_json::json!({ "error": "No forecast found for this date." })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{ChatMessage, Role, ToolCall};
    use crate::tools::Forecast;

    struct FixedWeather;

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn forecast(&self, location: &str, date: NaiveDate) -> Result<Option<Forecast>, ToolError> {
            if date != NaiveDate::from_ymd_opt(2025, 6, 7).unwrap() {
                return Ok(None);
            }
            Ok(Some(Forecast {
                date: date.to_string(),
                location: location.to_string(),
                avg_temperature: 17.0,
                highest_temperature: 22.0,
                lowest_temperature: 11.0,
                snowfall: 0.0,
                precipitation: 0.2,
                sunrise: "05:13 AM".to_string(),
                sunset: "09:04 PM".to_string(),
            }))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 6).unwrap()
    }

    #[tokio::test]
    async fn test_forecast_reaches_model() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatMessage::assistant("").with_tool_calls(vec![ToolCall::new(
                "get_weather",
                serde_json::json!({"location": "Trento", "date": "2025-06-07"}),
            )])),
            Ok(ChatMessage::assistant(
                r#"{"action": "return_weather", "data": {"date": "2025-06-07", "location": "Trento"}}"#,
            )),
        ]));
        let agent = WeatherAgent::new(model.clone(), Arc::new(FixedWeather), 3).with_today(today());

        let output = agent
            .run("Weather in Trento tomorrow?", &ConversationContext::default())
            .await
            .unwrap();
        assert!(output.output.contains("return_weather"));

        let requests = model.requests();
        assert!(requests[0].messages[0].content.contains("Today is 2025-06-06 (Friday)"));
        let tool_message = requests[1].messages.last().unwrap();
        assert_eq!(tool_message.role, Role::Tool);
        assert!(tool_message.content.contains("\"highest_temperature\":22.0"));
    }

    #[tokio::test]
    async fn test_unknown_day_and_bad_date() {
        let tool = GetWeather {
            provider: Arc::new(FixedWeather),
        };

        let missing = tool
            .call(serde_json::json!({"location": "Trento", "date": "2025-08-01"}))
            .await
            .unwrap();
        assert_eq!(missing["error"], "No forecast found for this date.");

        let bad = tool
            .call(serde_json::json!({"location": "Trento", "date": "tomorrow"}))
            .await;
        assert!(matches!(bad, Err(ToolError::InvalidArguments(_))));
    }
}
