use std::future::ready;
use std::sync::LazyLock;
use std::time::Duration;

use agent_graph_model::{ModelMessage, ToolCallRequest};
use agent_graph_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use backoff::ExponentialBackoffBuilder;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tool::{Tool, ToolResult};
use crate::{GraphError, Item, MemorySaver, ReactAgent, RunConfig};

static QUERY_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": { "query": { "type": "string" } },
        "required": ["query"]
    })
});

#[derive(Deserialize)]
struct QueryInput {
    query: String,
}

struct WeatherTool;

impl Tool for WeatherTool {
    type Input = QueryInput;

    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Call to get the current weather for a location."
    }

    fn parameter_schema(&self) -> &Value {
        &QUERY_SCHEMA
    }

    fn execute(
        &self,
        input: QueryInput,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(format!("It's sunny in {}.", input.query)))
    }
}

fn weather_call(id: &str, query: &str) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest {
        id: id.to_owned(),
        name: "weather".to_owned(),
        arguments: json!({ "query": query }),
    })
}

#[tokio::test]
async fn test_simple_message() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_response_step(PresetResponse::with_events([
        PresetEvent::MessageDelta("Hi, ".to_owned()),
        PresetEvent::MessageDelta("what can I do for you?".to_owned()),
    ]));

    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .build()
        .unwrap();
    let state = agent
        .invoke(vec![Item::user("Hello")], &RunConfig::default())
        .await
        .unwrap();

    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.last_content(), "Hi, what can I do for you?");
}

#[tokio::test]
async fn test_tool_loop() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_response_step(PresetResponse::with_events([
        weather_call("call_1", "Shibuya"),
        weather_call("call_2", "Sapporo"),
    ]));
    model_provider.add_assistant_response_step(PresetResponse::text(
        "Both places are sunny.",
    ));
    let requests = model_provider.clone();

    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .with_tool(WeatherTool)
        .build()
        .unwrap();
    let state = agent
        .invoke(
            vec![Item::user("Weather in Shibuya and Sapporo?")],
            &RunConfig::default(),
        )
        .await
        .unwrap();

    let transcripts: Vec<_> =
        state.messages().iter().map(Item::transcript).collect();
    assert_eq!(
        transcripts,
        [
            "Weather in Shibuya and Sapporo?",
            "",
            "It's sunny in Shibuya.",
            "It's sunny in Sapporo.",
            "Both places are sunny.",
        ]
    );
    assert_eq!(state.messages()[1].tool_calls().len(), 2);
    match state.messages()[3].message() {
        ModelMessage::Tool(result) => assert_eq!(result.id, "call_2"),
        msg => panic!("unexpected message: {msg:?}"),
    }

    let requests = requests.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "weather");
    assert_eq!(requests[1].messages.len(), 4);
}

#[tokio::test]
async fn test_tool_errors_are_reported_to_the_model() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_response_step(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_1".to_owned(),
            name: "forecast".to_owned(),
            arguments: json!({}),
        }),
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_2".to_owned(),
            name: "weather".to_owned(),
            arguments: json!({ "city": "sf" }),
        }),
    ]));
    model_provider
        .add_assistant_response_step(PresetResponse::text("Sorry about that."));

    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .with_tool(WeatherTool)
        .build()
        .unwrap();
    let state = agent
        .invoke(vec![Item::user("Weather?")], &RunConfig::default())
        .await
        .unwrap();

    let messages = state.messages();
    assert_eq!(messages[2].transcript(), "Error: `forecast` is not a valid tool");
    assert!(
        messages[3]
            .transcript()
            .starts_with("Error: missing field `query`")
    );
    assert_eq!(state.last_content(), "Sorry about that.");
}

#[tokio::test]
async fn test_memory_across_invocations() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_response_step(PresetResponse::text(
        "Hello Bob! How can I help?",
    ));
    model_provider
        .add_assistant_response_step(PresetResponse::text("Your name is Bob."));
    let requests = model_provider.clone();

    let saver = MemorySaver::new();
    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .with_checkpointer(saver.clone())
        .build()
        .unwrap();

    let config = RunConfig::thread("42");
    agent
        .invoke(vec![Item::user("Hi, I'm Bob.")], &config)
        .await
        .unwrap();
    let state = agent
        .invoke(vec![Item::user("What's my name?")], &config)
        .await
        .unwrap();

    assert_eq!(state.messages().len(), 4);
    assert_eq!(state.last_content(), "Your name is Bob.");
    assert_eq!(requests.requests()[1].messages.len(), 3);

    // A different thread does not see the first conversation, so the
    // scripted provider answers it with the first step again.
    let state = agent
        .invoke(vec![Item::user("Hi!")], &RunConfig::thread("1"))
        .await
        .unwrap();
    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.last_content(), "Hello Bob! How can I help?");
}

#[tokio::test]
async fn test_system_prompt() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_response_step(PresetResponse::text("Arr!"));
    let requests = model_provider.clone();

    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .with_system_prompt("Talk like a pirate.")
        .build()
        .unwrap();
    let state = agent
        .invoke(vec![Item::user("Hello")], &RunConfig::default())
        .await
        .unwrap();

    // The prompt is only sent, never stored in the thread.
    assert_eq!(state.messages().len(), 2);
    assert_eq!(
        requests.requests()[0].messages,
        [
            ModelMessage::System("Talk like a pirate.".to_owned()),
            ModelMessage::User("Hello".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_recursion_limit() {
    let mut model_provider = TestModelProvider::default();
    for idx in 0..10 {
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([weather_call(
                &format!("call_{idx}"),
                "sf",
            )]),
        );
    }

    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .with_tool(WeatherTool)
        .build()
        .unwrap();
    let config = RunConfig::default().with_recursion_limit(3);
    let err = agent
        .invoke(vec![Item::user("Loop forever")], &config)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::RecursionLimit(3)));
}

#[tokio::test]
async fn test_retry_then_stream() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_response_step(
        PresetResponse::with_events([weather_call("call_1", "sf")])
            .with_failures(1),
    );
    model_provider
        .add_assistant_response_step(PresetResponse::text("It's sunny."));

    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(1))
        .with_max_elapsed_time(Some(Duration::from_secs(1)))
        .build();
    let agent = ReactAgent::builder()
        .with_model_provider(model_provider)
        .with_tool(WeatherTool)
        .with_backoff(backoff)
        .build()
        .unwrap();

    let steps: Vec<_> = agent
        .stream(vec![Item::user("Weather in sf?")], &RunConfig::default())
        .map(|step| {
            let step = step.unwrap();
            (step.node, step.update.len())
        })
        .collect()
        .await;
    assert_eq!(
        steps,
        [
            ("agent".to_owned(), 1),
            ("tools".to_owned(), 1),
            ("agent".to_owned(), 1),
        ]
    );
}

#[tokio::test]
async fn test_non_retryable_error_fails_the_run() {
    // Nothing scripted, so the first request fails for good.
    let agent = ReactAgent::builder()
        .with_model_provider(TestModelProvider::default())
        .build()
        .unwrap();
    let err = agent
        .invoke(vec![Item::user("Hello")], &RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Model(_)));
}

#[test]
fn test_build_requires_model() {
    let err = ReactAgent::builder().build().unwrap_err();
    assert!(matches!(err, GraphError::InvalidGraph(_)));
}
