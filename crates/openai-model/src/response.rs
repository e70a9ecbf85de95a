use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use agent_graph_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Delta, Message, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Tool calls are only emitted once the stream moves past them, since
    // their arguments arrive in fragments. Indices into `tool_calls`.
    pending_tool_call_idx: VecDeque<usize>,
    // Cleared after the completed event is returned.
    pending_finish_reason: Option<ModelFinishReason>,
    stream_ended: bool,
}

impl PartialState {
    #[inline]
    fn finish(self) -> Option<(String, Message)> {
        let tool_calls: Vec<_> = self
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(idx, mut tool_call)| {
                tool_call.index = None;
                if tool_call.id.is_none() {
                    tool_call.id = Some(fallback_tool_call_id(idx));
                }
                tool_call.r#type.get_or_insert_with(|| "function".to_owned());
                tool_call
            })
            .collect();
        let content = if self.content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(self.content)
        };
        Some((
            self.id?,
            Message::Assistant {
                content,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                reasoning_content: self.reasoning_content,
            },
        ))
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let existing = tool_call.index.and_then(|index| {
            self.tool_calls
                .iter_mut()
                .find(|t| t.index == Some(index))
        });
        let Some(partial_tool_call) = existing else {
            self.pending_tool_call_idx.push_back(self.tool_calls.len());
            self.tool_calls.push(tool_call);
            return;
        };

        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type.get_or_insert_default().push_str(&ty);
        }
        let Some(function) = tool_call.function else {
            return;
        };
        match partial_tool_call.function {
            Some(ref mut partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial_tool_call.function = Some(function),
        }
    }

    // Returns the content delta, if any.
    fn apply_delta(&mut self, delta: Delta) -> Option<String> {
        if let Some(reasoning_content) = &delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_default()
                .push_str(reasoning_content);
        }
        for tool_call in delta.tool_calls.into_iter().flatten() {
            self.merge_tool_call(tool_call);
        }
        let content = delta.content.filter(|c| !c.is_empty())?;
        self.content.push_str(&content);
        Some(content)
    }

    fn tool_call_request(&self, idx: usize) -> ToolCallRequest {
        let tool_call = &self.tool_calls[idx];
        let function = tool_call.function.as_ref();
        let arguments = function
            .and_then(|f| f.arguments.as_deref())
            .filter(|args| !args.trim().is_empty())
            .map(|args| {
                serde_json::from_str::<Value>(args).unwrap_or_else(|err| {
                    warn!("malformed tool call arguments ({err}): {args}");
                    Value::String(args.to_owned())
                })
            })
            .unwrap_or_else(|| Value::Object(Default::default()));
        ToolCallRequest {
            id: tool_call
                .id
                .clone()
                .unwrap_or_else(|| fallback_tool_call_id(idx)),
            name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
            arguments,
        }
    }
}

// Some servers leave out tool call ids. The replayed message must carry the
// same id as the tool result answering it.
#[inline]
fn fallback_tool_call_id(idx: usize) -> String {
    format!("call_{idx}")
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            content: Default::default(),
            reasoning_content: Default::default(),
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
            stream_ended: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = partial_state.finish();
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let mut message_delta = None;

    // Nothing more is read once the finish reason has arrived; the pending
    // tool calls and the finish reason are drained first.
    let can_read = partial_state.pending_finish_reason.is_none()
        && !partial_state.stream_ended;
    while can_read {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.stream_ended = true;
                break;
            }
            Err(err) => {
                return Err(Error::new(
                    format!("broken event stream: {err:?}"),
                    ErrorKind::Unavailable,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.stream_ended = true;
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        // The trailing usage chunk has no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        message_delta = partial_state.apply_delta(choice.delta);

        if let Some(finish_reason) = choice.finish_reason {
            partial_state.pending_finish_reason = Some(match &*finish_reason {
                "tool_calls" | "function_call" => ModelFinishReason::ToolCalls,
                "length" => ModelFinishReason::Length,
                _ => ModelFinishReason::Stop,
            });
            break;
        }

        if message_delta.is_some() {
            break;
        }
    }

    // Always emit the message delta first, then pending tool calls, and
    // finally the finish reason.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    // Reaching here means the finish reason arrived or the stream ended, so
    // the tool call arguments are complete.
    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let request = partial_state.tool_call_request(idx);
        return Ok((Some(ModelResponseEvent::ToolCall(request)), partial_state));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(
        fixture: &'static [u8],
    ) -> (Vec<ModelResponseEvent>, Message) {
        let chunks =
            Chunks::from_vec_deque(vec![Bytes::from_static(fixture)].into());
        let mut resp = pin!(OpenAIResponse::from_sse(Sse::new(chunks)));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            events.push(event);
        }
        let full_msg = resp.make_opaque_message().unwrap();
        let full_msg: &Message = full_msg.to_raw().unwrap();
        (events, full_msg.clone())
    }

    #[tokio::test]
    async fn test_streamed_tool_calls() {
        let (events, full_msg) =
            collect_events(include_bytes!("../fixtures/tool_calls.txt")).await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_weather".to_owned(),
                    name: "weather".to_owned(),
                    arguments: json!({ "query": "shibuya tokyo" }),
                }),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_search".to_owned(),
                    name: "tavily_search_results_json".to_owned(),
                    arguments: json!({ "query": "shibuya weather" }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );
        let Message::Assistant {
            content,
            tool_calls,
            ..
        } = full_msg
        else {
            panic!("unexpected message: {full_msg:?}");
        };
        assert_eq!(content, None);
        let tool_calls = tool_calls.unwrap();
        assert_eq!(tool_calls.len(), 2);
        assert!(tool_calls.iter().all(|t| t.index.is_none()));
        assert_eq!(tool_calls[0].r#type.as_deref(), Some("function"));
    }

    #[tokio::test]
    async fn test_unindexed_tool_calls() {
        let (events, full_msg) = collect_events(include_bytes!(
            "../fixtures/unindexed_tool_calls.txt"
        ))
        .await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_0".to_owned(),
                    name: "weather".to_owned(),
                    arguments: json!({ "query": "sf" }),
                }),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "weather".to_owned(),
                    arguments: json!({ "query": "nyc" }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );

        // The replayed message carries the same ids as the requests.
        let Message::Assistant { tool_calls, .. } = full_msg else {
            panic!("unexpected message: {full_msg:?}");
        };
        let ids: Vec<_> = tool_calls
            .unwrap()
            .into_iter()
            .map(|t| t.id.unwrap())
            .collect();
        assert_eq!(ids, ["call_0", "call_1"]);
    }

    #[tokio::test]
    async fn test_streamed_text() {
        let (events, full_msg) =
            collect_events(include_bytes!("../fixtures/text.txt")).await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("It's 90 degrees".to_owned()),
                ModelResponseEvent::MessageDelta(" and sunny.".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
        assert_eq!(
            full_msg,
            Message::Assistant {
                content: Some("It's 90 degrees and sunny.".to_owned()),
                tool_calls: None,
                reasoning_content: None,
            }
        );
    }
}
