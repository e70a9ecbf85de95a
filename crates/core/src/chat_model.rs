use std::fmt::{self, Debug, Formatter};

use agent_graph_model::{
    ModelMessage, ModelProvider, ModelRequest, ModelTool, ToolChoice,
};
use backoff::ExponentialBackoff;

use crate::GraphError;
use crate::conversation::Item;
use crate::model_client::{ModelClient, ModelClientResponse};

/// A model provider bound to a set of tools, usable from graph nodes.
///
/// Cloning is cheap; clones share the underlying provider.
#[derive(Clone)]
pub struct ChatModel {
    client: ModelClient,
    tools: Vec<ModelTool>,
    tool_choice: Option<ToolChoice>,
}

impl ChatModel {
    /// Creates a chat model without tools.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            client: ModelClient::new(provider),
            tools: vec![],
            tool_choice: None,
        }
    }

    /// Sets the retry policy for retryable provider errors.
    #[inline]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.client.set_backoff(backoff);
        self
    }

    /// Offers `tools` to the model on every request.
    #[inline]
    pub fn bind_tools(mut self, tools: Vec<ModelTool>) -> Self {
        self.tools = tools;
        self
    }

    /// Constrains how the model picks among the bound tools.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Returns the tools bound to this model.
    #[inline]
    pub fn tools(&self) -> &[ModelTool] {
        &self.tools
    }

    /// Sends the messages of `items` and returns the answer as a new item.
    pub async fn invoke(&self, items: &[Item]) -> Result<Item, GraphError> {
        let messages = items.iter().map(|item| item.msg.clone()).collect();
        self.invoke_messages(messages).await
    }

    /// Sends `messages` as they are and returns the answer as a new item.
    pub async fn invoke_messages(
        &self,
        messages: Vec<ModelMessage>,
    ) -> Result<Item, GraphError> {
        let resp = self.send(messages).await?;
        Ok(Item::from_response(resp))
    }

    pub(crate) async fn send(
        &self,
        messages: Vec<ModelMessage>,
    ) -> Result<ModelClientResponse, GraphError> {
        let req = ModelRequest {
            messages,
            tools: self.tools.clone(),
            tool_choice: self.tool_choice.clone(),
        };
        let resp = self.client.send_request(req).await?;
        debug!(
            "model answered with {} chars and {} tool calls ({:?})",
            resp.transcript.len(),
            resp.tool_calls.len(),
            resp.finish_reason
        );
        Ok(resp)
    }
}

impl Debug for ChatModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let tools: Vec<_> = self.tools.iter().map(|tool| &tool.name).collect();
        f.debug_struct("ChatModel")
            .field("tools", &tools)
            .field("tool_choice", &self.tool_choice)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use agent_graph_model::ToolCallRequest;
    use agent_graph_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_invoke_sends_bound_tools() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_1".to_owned(),
                name: "weather".to_owned(),
                arguments: json!({ "query": "sf" }),
            }),
        ]));
        let requests = provider.clone();

        let tool = ModelTool {
            name: "weather".to_owned(),
            description: "Call to get the weather.".to_owned(),
            parameters: json!({ "type": "object" }),
        };
        let model = ChatModel::new(provider)
            .bind_tools(vec![tool.clone()])
            .with_tool_choice(ToolChoice::Required);

        let item = model.invoke(&[Item::user("weather in sf?")]).await.unwrap();
        assert_eq!(item.tool_calls().len(), 1);
        assert_eq!(item.tool_calls()[0].name, "weather");
        assert!(matches!(item.message(), ModelMessage::Opaque(_)));

        let req = &requests.requests()[0];
        assert_eq!(req.tools, [tool]);
        assert_eq!(req.tool_choice, Some(ToolChoice::Required));
        assert_eq!(
            req.messages,
            [ModelMessage::User("weather in sf?".to_owned())]
        );
    }
}
