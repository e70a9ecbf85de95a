use futures_util::StreamExt;

use super::*;
use crate::MemorySaver;

#[derive(Clone, Default, Debug)]
struct Trail {
    visited: Vec<String>,
}

impl GraphState for Trail {
    type Update = String;

    fn apply(&mut self, update: Self::Update) {
        self.visited.push(update);
    }
}

fn visit(name: &'static str) -> impl Node<Trail> {
    move |_state: Trail| async move { Ok::<_, GraphError>(name.to_owned()) }
}

fn ping_pong(rounds: usize) -> StateGraph<Trail> {
    StateGraph::new()
        .add_node("ping", visit("ping"))
        .add_node("pong", visit("pong"))
        .add_edge(START, "ping")
        .add_edge("ping", "pong")
        .add_conditional_edges(
            "pong",
            move |state: &Trail| {
                let pongs =
                    state.visited.iter().filter(|name| *name == "pong").count();
                let next = if pongs < rounds { "again" } else { "done" };
                next.to_owned()
            },
            [("again", "ping"), ("done", END)],
        )
}

#[tokio::test]
async fn test_invoke_runs_until_end() {
    let graph = ping_pong(2).compile().unwrap();
    let state = graph
        .invoke("input".to_owned(), &RunConfig::default())
        .await
        .unwrap();
    assert_eq!(state.visited, ["input", "ping", "pong", "ping", "pong"]);
}

#[tokio::test]
async fn test_stream_yields_steps_in_order() {
    let graph = ping_pong(1).compile().unwrap();
    let steps: Vec<_> = graph
        .stream("input".to_owned(), &RunConfig::default())
        .map(|step| step.unwrap().node)
        .collect()
        .await;
    assert_eq!(steps, ["ping", "pong"]);
}

#[tokio::test]
async fn test_recursion_limit() {
    let graph = ping_pong(100).compile().unwrap();
    let config = RunConfig::default().with_recursion_limit(5);
    let err = graph.invoke("input".to_owned(), &config).await.unwrap_err();
    assert!(matches!(err, GraphError::RecursionLimit(5)));

    // The stream stops right after the error.
    let results: Vec<_> =
        graph.stream("input".to_owned(), &config).collect().await;
    assert_eq!(results.len(), 6);
    assert!(results[..5].iter().all(Result::is_ok));
    assert!(results[5].is_err());
}

#[tokio::test]
async fn test_default_recursion_limit() {
    let graph = ping_pong(usize::MAX).compile().unwrap();
    let config = RunConfig::default();
    assert_eq!(config.recursion_limit(), 25);
    let err = graph.invoke("input".to_owned(), &config).await.unwrap_err();
    assert!(matches!(err, GraphError::RecursionLimit(25)));
}

#[tokio::test]
async fn test_unknown_destination() {
    let graph = StateGraph::new()
        .add_node("a", visit("a"))
        .add_edge(START, "a")
        .add_conditional_edges(
            "a",
            |_: &Trail| "nowhere".to_owned(),
            Vec::<(String, String)>::new(),
        )
        .compile()
        .unwrap();
    let err = graph
        .invoke("input".to_owned(), &RunConfig::default())
        .await
        .unwrap_err();
    match err {
        GraphError::UnknownDestination { from, to } => {
            assert_eq!(from, "a");
            assert_eq!(to, "nowhere");
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[tokio::test]
async fn test_node_error_stops_the_run() {
    let graph = StateGraph::<Trail>::new()
        .add_node("fail", |_: Trail| async {
            Err::<String, _>(GraphError::Node {
                node: "fail".to_owned(),
                reason: "boom".to_owned(),
            })
        })
        .add_edge(START, "fail")
        .add_edge("fail", END)
        .compile()
        .unwrap();
    let err = graph
        .invoke("input".to_owned(), &RunConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "node `fail` failed: boom");
}

#[tokio::test]
async fn test_checkpointer_resumes_thread() {
    let saver = MemorySaver::new();
    let graph = StateGraph::new()
        .add_node("a", visit("a"))
        .add_edge(START, "a")
        .add_edge("a", END)
        .compile()
        .unwrap()
        .with_checkpointer(saver.clone());

    let config = RunConfig::thread("42");
    graph.invoke("first".to_owned(), &config).await.unwrap();
    let state = graph.invoke("second".to_owned(), &config).await.unwrap();
    assert_eq!(state.visited, ["first", "a", "second", "a"]);

    let saved = saver.get("42").await.unwrap().unwrap();
    assert_eq!(saved.visited, state.visited);

    // Other threads and runs without a thread start fresh.
    let state = graph
        .invoke("other".to_owned(), &RunConfig::thread("1"))
        .await
        .unwrap();
    assert_eq!(state.visited, ["other", "a"]);
    let state = graph
        .invoke("none".to_owned(), &RunConfig::default())
        .await
        .unwrap();
    assert_eq!(state.visited, ["none", "a"]);
}

fn compile_err(graph: StateGraph<Trail>) -> String {
    match graph.compile() {
        Ok(_) => panic!("graph should be invalid"),
        Err(err) => err.to_string(),
    }
}

#[test]
fn test_compile_validation() {
    let err = compile_err(StateGraph::new().add_node("a", visit("a")));
    assert_eq!(err, "invalid graph: no edge leaves the start node");

    let err = compile_err(
        StateGraph::new()
            .add_node("a", visit("a"))
            .add_edge(START, "a")
            .add_edge("a", "b"),
    );
    assert_eq!(err, "invalid graph: edge from `a` leads to unknown node `b`");

    let err = compile_err(
        StateGraph::new()
            .add_node("a", visit("a"))
            .add_node("b", visit("b"))
            .add_edge(START, "a")
            .add_edge("a", END),
    );
    assert_eq!(err, "invalid graph: node `b` has no outgoing edge");

    let err = compile_err(
        StateGraph::new()
            .add_node("a", visit("a"))
            .add_node("a", visit("a")),
    );
    assert_eq!(err, "invalid graph: node `a` is already present");

    let err = compile_err(StateGraph::new().add_node(END, visit("end")));
    assert_eq!(err, "invalid graph: `__end__` is a reserved node name");

    let err = compile_err(
        StateGraph::new()
            .add_node("a", visit("a"))
            .add_edge(START, "a")
            .add_edge("a", END)
            .add_edge("a", "a"),
    );
    assert_eq!(err, "invalid graph: node `a` already has an outgoing edge");
}
