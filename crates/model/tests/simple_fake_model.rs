use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll};

use agent_graph_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ModelTool, ToolCallRequest,
};
use serde_json::json;

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Replies with the last user text word by word, or calls the first tool
/// with the user text as its `query`.
struct FakeModelResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeModelProviderError;

    fn poll_next_event(
        mut self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.events.pop_front()))
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;
    type Response = FakeModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let Some(text) = last_user else {
            return ready(Err(FakeModelProviderError(ErrorKind::Other)));
        };

        let mut events = VecDeque::new();
        if let Some(tool) = req.tools.first() {
            events.push_back(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: "call_0".to_owned(),
                name: tool.name.clone(),
                arguments: json!({ "query": text }),
            }));
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::ToolCalls,
            ));
        } else {
            let words: Vec<_> = text.split(' ').collect();
            for (idx, word) in words.iter().enumerate() {
                let mut delta = (*word).to_owned();
                if idx + 1 < words.len() {
                    delta.push(' ');
                }
                events.push_back(ModelResponseEvent::MessageDelta(delta));
            }
            events
                .push_back(ModelResponseEvent::Completed(ModelFinishReason::Stop));
        }
        ready(Ok(FakeModelResponse { events }))
    }
}

async fn collect(
    mut resp: FakeModelResponse,
) -> (String, Vec<ToolCallRequest>, Option<ModelFinishReason>) {
    let mut text = String::new();
    let mut tool_calls = vec![];
    let mut finish_reason = None;
    while let Some(event) =
        poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
            .await
            .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::ToolCall(req) => tool_calls.push(req),
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason)
            }
        }
    }
    (text, tool_calls, finish_reason)
}

#[tokio::test]
async fn test_text_completion() {
    let req = ModelRequest::with_messages(vec![
        ModelMessage::System("Be brief.".to_owned()),
        ModelMessage::User("what about sapporo".to_owned()),
    ]);
    let resp = FakeModelProvider.send_request(&req).await.unwrap();
    let (text, tool_calls, finish_reason) = collect(resp).await;
    assert_eq!(text, "what about sapporo");
    assert!(tool_calls.is_empty());
    assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_tool_call_completion() {
    let mut req = ModelRequest::with_messages(vec![ModelMessage::User(
        "weather in sf".to_owned(),
    )]);
    req.tools.push(ModelTool {
        name: "weather".to_owned(),
        description: "Call to get the current weather for a location."
            .to_owned(),
        parameters: json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }),
    });
    let resp = FakeModelProvider.send_request(&req).await.unwrap();
    let (text, tool_calls, finish_reason) = collect(resp).await;
    assert!(text.is_empty());
    assert_eq!(tool_calls.len(), 1);
    assert_eq!(tool_calls[0].name, "weather");
    assert_eq!(tool_calls[0].arguments, json!({ "query": "weather in sf" }));
    assert_eq!(finish_reason, Some(ModelFinishReason::ToolCalls));
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest::default();
    let err = FakeModelProvider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
}
