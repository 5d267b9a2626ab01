// Tool-calling loop shared by all sub-agents

use super::{AgentError, AgentOutput};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolCall, ToolDefinition};
use crate::tools::ToolError;
use async_trait::async_trait;
use std::sync::Arc;

/// A function the model may call
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// Binds a model and a tool list into one invokable unit
pub struct ToolAgent {
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    max_rounds: usize,
}

impl ToolAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>, max_rounds: usize) -> Self {
        Self {
            model,
            tools,
            max_rounds: max_rounds.max(1),
        }
    }

    /// Run the model until it answers without requesting a tool
    pub async fn run(
        &self,
        system_prompt: String,
        history: &[ChatMessage],
        query: &str,
    ) -> Result<AgentOutput, AgentError> {
        let definitions: Vec<ToolDefinition> = self.tools.iter().map(|t| t.definition()).collect();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(query));

        let mut tools_used = Vec::new();

        for _ in 0..self.max_rounds {
            let request = ChatRequest::new(messages.clone()).with_tools(definitions.clone());
            let reply = self.model.chat(request).await?;

            if reply.tool_calls.is_empty() {
                return Ok(AgentOutput {
                    output: reply.content,
                    tools_used,
                });
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in &calls {
                tools_used.push(call.function.name.clone());
                let result = self.dispatch(call).await;
                messages.push(ChatMessage::tool(result.to_string()));
            }
        }

        Err(AgentError::ToolRoundsExceeded(self.max_rounds))
    }

    /// Execute one tool call. Failures are reported back to the model as data.
    async fn dispatch(&self, call: &ToolCall) -> serde_json::Value {
        let name = &call.function.name;
        let Some(tool) = self.tools.iter().find(|t| t.definition().name() == name) else {
            tracing::warn!(tool = %name, "model requested unknown tool");
            return serde_json::json!({ "error": format!("Unknown tool: {}", name) });
        };

        tracing::info!(tool = %name, arguments = %call.function.arguments, "calling tool");
        match tool.call(call.function.arguments.clone()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool call failed");
                serde_json::json!({ "error": e.to_string() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::llm::testing::ScriptedModel;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function("echo", "Echo the input", serde_json::json!({"type": "object"}))
        }

        async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            if arguments.get("fail").is_some() {
                return Err(ToolError::ServiceError("boom".to_string()));
            }
            Ok(serde_json::json!({ "echo": arguments }))
        }
    }

    fn call(name: &str, args: serde_json::Value) -> Result<ChatMessage, crate::llm::LlmError> {
        Ok(ChatMessage::assistant("").with_tool_calls(vec![ToolCall::new(name, args)]))
    }

    #[tokio::test]
    async fn test_tool_result_is_fed_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            call("echo", serde_json::json!({"x": 1})),
            Ok(ChatMessage::assistant("done")),
        ]));
        let agent = ToolAgent::new(model.clone(), vec![Arc::new(Echo)], 3);

        let output = agent.run("system".to_string(), &[], "go").await.unwrap();
        assert_eq!(output.output, "done");
        assert_eq!(output.tools_used, vec!["echo"]);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert!(last.content.contains("\"echo\""));
        assert_eq!(requests[0].tools[0].name(), "echo");
    }

    #[tokio::test]
    async fn test_tool_errors_reach_the_model() {
        let model = Arc::new(ScriptedModel::new(vec![
            call("echo", serde_json::json!({"fail": true})),
            call("missing", serde_json::json!({})),
            Ok(ChatMessage::assistant("gave up")),
        ]));
        let agent = ToolAgent::new(model.clone(), vec![Arc::new(Echo)], 5);

        let output = agent.run("system".to_string(), &[], "go").await.unwrap();
        assert_eq!(output.output, "gave up");

        let requests = model.requests();
        assert!(requests[1].messages.last().unwrap().content.contains("boom"));
        assert!(requests[2].messages.last().unwrap().content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let model = Arc::new(ScriptedModel::new(vec![
            call("echo", serde_json::json!({})),
            call("echo", serde_json::json!({})),
        ]));
        let agent = ToolAgent::new(model, vec![Arc::new(Echo)], 2);

        let result = agent.run("system".to_string(), &[], "go").await;
        assert!(matches!(result, Err(AgentError::ToolRoundsExceeded(2))));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let agent = ToolAgent::new(model, vec![], 2);
        let result = agent.run("system".to_string(), &[], "go").await;
        assert!(matches!(result, Err(AgentError::Llm(_))));
    }
}
