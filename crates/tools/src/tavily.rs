use agent_graph_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const DEFAULT_MAX_RESULTS: u32 = 5;

/// Arguments of [`TavilySearchTool`].
#[derive(Deserialize, JsonSchema)]
pub struct TavilySearchParameters {
    #[schemars(description = "The search query.")]
    query: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    content: String,
    #[serde(default)]
    score: f64,
}

/// A tool querying the Tavily search API.
///
/// Results are returned to the model as a JSON array of
/// `{ title, url, content, score }` objects.
pub struct TavilySearchTool {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: u32,
    parameter_schema: Value,
}

impl TavilySearchTool {
    /// Creates a new search tool returning at most 5 results.
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        TavilySearchTool {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_owned(),
            max_results: DEFAULT_MAX_RESULTS,
            parameter_schema: schema_for!(TavilySearchParameters).to_value(),
        }
    }

    /// Sets the maximum number of results per search.
    #[inline]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Sends searches to `endpoint` instead of the public API.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Tool for TavilySearchTool {
    type Input = TavilySearchParameters;

    fn name(&self) -> &str {
        "tavily_search_results_json"
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted \
         results. Useful for when you need to answer questions about current \
         events. Input should be a search query."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: TavilySearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let endpoint = self.endpoint.clone();
        let max_results = self.max_results;
        async move {
            search(&client, &endpoint, &api_key, &input.query, max_results)
                .await
                .map_err(|err| {
                    ToolError::execution_error().with_reason(format!("{err}"))
                })
        }
    }
}

async fn search(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    query: &str,
    max_results: u32,
) -> Result<String, reqwest::Error> {
    debug!("searching for {query:?}");
    let resp: SearchResponse = client
        .post(endpoint)
        .json(&SearchRequest {
            api_key,
            query,
            max_results,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    trace!("got {} results", resp.results.len());
    Ok(serde_json::to_string(&resp.results)
        .unwrap_or_else(|_| "[]".to_owned()))
}
