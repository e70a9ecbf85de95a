//! A single non-streaming request to the hosted chat completions API.

use agent_graph_demos::config::required_var;
use agent_graph_demos::{DemoError, exit_on_error, init};
use agent_graph_model::{ModelMessage, ModelRequest};
use agent_graph_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init();
    exit_on_error(run().await);
}

async fn run() -> Result<(), DemoError> {
    let mut builder =
        OpenAIConfigBuilder::with_api_key(required_var("OPENAI_API_KEY")?)
            .with_model("gpt-3.5-turbo")
            .with_store(true);
    if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
        builder = builder.with_base_url(base_url);
    }
    let provider = OpenAIProvider::new(builder.build());

    let completion = provider
        .create_completion(&ModelRequest::with_messages(vec![
            ModelMessage::User("write a haiku about ai".to_owned()),
        ]))
        .await?;
    println!("{{ completion: {completion:#?} }}");
    Ok(())
}
