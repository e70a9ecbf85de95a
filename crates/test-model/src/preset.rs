use agent_graph_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a response that only says `text`.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_script_file_format() {
        let response: PresetResponse = serde_json::from_value(json!({
            "events": [
                { "type": "message_delta", "data": "Let me check." },
                {
                    "type": "tool_call",
                    "data": {
                        "id": "call_1",
                        "name": "weather",
                        "arguments": { "query": "sf" }
                    }
                }
            ]
        }))
        .unwrap();

        assert_eq!(response.failures, None);
        assert_eq!(
            response.events,
            vec![
                PresetEvent::MessageDelta("Let me check.".to_owned()),
                PresetEvent::ToolCall(ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "weather".to_owned(),
                    arguments: json!({ "query": "sf" }),
                }),
            ]
        );
    }
}
