//! A supervisor routing a question between a search agent and a web
//! scraping agent, printing every step as it happens.

use std::pin::pin;

use agent_graph_core::{Item, RunConfig};
use agent_graph_demos::config::required_var;
use agent_graph_demos::team::{ResearchTeamUpdate, research_team};
use agent_graph_demos::{DemoConfig, DemoError, exit_on_error, init};
use futures_util::StreamExt;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init();
    exit_on_error(run().await);
}

async fn run() -> Result<(), DemoError> {
    let config = DemoConfig::from_env();
    let tavily_api_key = required_var("TAVILY_API_KEY")?;

    let graph = research_team(config.chat_model(), tavily_api_key)?;
    let input = ResearchTeamUpdate::messages(vec![Item::user(
        "What's the price of a big mac in Argentina?",
    )]);
    let run_config = RunConfig::default().with_recursion_limit(100);

    let mut steps = pin!(graph.stream(input, &run_config));
    while let Some(step) = steps.next().await {
        let step = step?;
        println!("{}: {:#?}", step.node, step.update);
        println!("----");
    }
    Ok(())
}
