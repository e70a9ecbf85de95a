//! A hand-built agent graph: a model node and a tool node joined by a
//! conditional edge, with memory.

use agent_graph_core::{
    END, GraphError, Item, MemorySaver, MessagesState, RunConfig, START,
    StateGraph, ToolNode, Toolbox,
};
use agent_graph_demos::config::required_var;
use agent_graph_demos::{DemoConfig, DemoError, exit_on_error, init};
use agent_graph_tools::{TavilySearchTool, WeatherTool};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init();
    exit_on_error(run().await);
}

/// Goes to `tools` if the model asked for tool calls, or ends the run.
fn should_continue(state: &MessagesState) -> String {
    match state.last() {
        Some(item) if !item.tool_calls().is_empty() => "tools".to_owned(),
        _ => END.to_owned(),
    }
}

async fn run() -> Result<(), DemoError> {
    let config = DemoConfig::from_env();
    let tavily_api_key = required_var("TAVILY_API_KEY")?;

    let toolbox = Toolbox::new()
        .with_tool(WeatherTool::new())
        .with_tool(TavilySearchTool::new(tavily_api_key).with_max_results(3));
    let model = config.chat_model().bind_tools(toolbox.definitions());

    let app = StateGraph::<MessagesState>::new()
        .add_node("agent", move |state: MessagesState| {
            let model = model.clone();
            async move {
                let response = model.invoke(state.messages()).await?;
                Ok::<_, GraphError>(vec![response])
            }
        })
        .add_node("tools", ToolNode::new(toolbox))
        .add_edge(START, "agent")
        .add_conditional_edges(
            "agent",
            should_continue,
            Vec::<(&str, &str)>::new(),
        )
        .add_edge("tools", "agent")
        .compile()?
        .with_checkpointer(MemorySaver::new());

    let state = app
        .invoke(
            vec![Item::user("Please Research company of SONY")],
            &RunConfig::thread("1"),
        )
        .await?;
    println!("{}", state.last_content());
    Ok(())
}
