use agent_graph_core::tool::{Error as ToolError, Tool, ToolResult};
use htmd::HtmlToMarkdown;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

/// Arguments of [`ScrapeWebpageTool`].
#[derive(Deserialize, JsonSchema)]
pub struct ScrapeWebpageParameters {
    #[schemars(description = "The URL of the webpage to scrape.")]
    url: String,
}

/// A tool fetching a webpage and returning its text content.
///
/// The page is wrapped as `<Document name="{title}">\n{text}\n</Document>`,
/// where the text is the page converted to Markdown.
pub struct ScrapeWebpageTool {
    client: reqwest::Client,
    parameter_schema: Value,
}

impl ScrapeWebpageTool {
    /// Creates a new scrape tool.
    #[inline]
    pub fn new() -> Self {
        ScrapeWebpageTool {
            client: reqwest::Client::new(),
            parameter_schema: schema_for!(ScrapeWebpageParameters).to_value(),
        }
    }
}

impl Default for ScrapeWebpageTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ScrapeWebpageTool {
    type Input = ScrapeWebpageParameters;

    fn name(&self) -> &str {
        "scrape_webpage"
    }

    fn description(&self) -> &str {
        "Scrape the contents of a webpage."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: ScrapeWebpageParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        async move {
            let html = fetch(&client, &input.url).await.map_err(|err| {
                ToolError::execution_error().with_reason(format!("{err}"))
            })?;
            let document = to_document(&html).map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("failed to parse the page: {err}"))
            })?;
            Ok(join_documents(&[document]))
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, reqwest::Error> {
    debug!("scraping {url}");
    client.get(url).send().await?.error_for_status()?.text().await
}

fn to_document(html: &str) -> Result<String, std::io::Error> {
    let title = extract_title(html).unwrap_or_default();
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["head", "script", "style", "noscript"])
        .build();
    let text = converter.convert(html)?;
    Ok(format!(
        "<Document name=\"{title}\">\n{}\n</Document>",
        text.trim()
    ))
}

fn join_documents(documents: &[String]) -> String {
    documents.join("\n\n")
}

fn extract_title(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets intact.
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_owned())
}
