//! Two turns with a prebuilt ReAct agent on the same thread. The second
//! question only makes sense with the first one in memory.

use agent_graph_core::{Item, MemorySaver, ReactAgent, RunConfig};
use agent_graph_demos::config::required_var;
use agent_graph_demos::{DemoConfig, DemoError, exit_on_error, init};
use agent_graph_tools::TavilySearchTool;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init();
    exit_on_error(run().await);
}

async fn run() -> Result<(), DemoError> {
    let config = DemoConfig::from_env();
    let tavily_api_key = required_var("TAVILY_API_KEY")?;

    let agent = ReactAgent::builder()
        .with_model_provider(config.provider())
        .with_tool(TavilySearchTool::new(tavily_api_key).with_max_results(3))
        .with_checkpointer(MemorySaver::new())
        .build()?;
    let thread = RunConfig::thread("42");

    let state = agent
        .invoke(
            vec![Item::user("what is the current weather in shibuya in tokyo")],
            &thread,
        )
        .await?;
    println!("{}", state.last_content());

    let state = agent
        .invoke(vec![Item::user("what about sapporo in hokkaido")], &thread)
        .await?;
    println!("{}", state.last_content());
    Ok(())
}
