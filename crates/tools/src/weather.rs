use std::future::ready;

use agent_graph_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

/// Arguments of [`WeatherTool`].
#[derive(Deserialize, JsonSchema)]
pub struct WeatherToolParameters {
    #[schemars(description = "The query to use in your search.")]
    query: String,
}

/// A placeholder weather tool with canned answers.
pub struct WeatherTool {
    parameter_schema: Value,
}

impl WeatherTool {
    /// Creates a new weather tool.
    #[inline]
    pub fn new() -> Self {
        WeatherTool {
            parameter_schema: schema_for!(WeatherToolParameters).to_value(),
        }
    }
}

impl Default for WeatherTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WeatherTool {
    type Input = WeatherToolParameters;

    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Call to get the current weather for a location."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: WeatherToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(forecast(&input.query).to_owned()))
    }
}

fn forecast(query: &str) -> &'static str {
    let query = query.to_lowercase();
    if query.contains("sf") || query.contains("san francisco") {
        "It's 60 degrees and foggy."
    } else {
        "It's 90 degrees and sunny."
    }
}
