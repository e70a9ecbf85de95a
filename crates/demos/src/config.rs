//! Environment configuration shared by the demos.

use std::env;
use std::path::PathBuf;

use agent_graph_core::{ChatModel, GraphError};
use agent_graph_openai_model::{
    Error as ProviderError, OpenAIConfigBuilder, OpenAIProvider,
};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_MODEL: &str = "llama3.2";

/// Errors that end a demo.
#[derive(Debug, Error)]
pub enum DemoError {
    /// A required environment variable is not set.
    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),
    /// The graph or agent failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A direct provider call failed.
    #[error("chat completion failed: {0}")]
    Provider(#[from] ProviderError),
}

/// The outcome of loading `.env`, kept until logging is installed.
#[derive(Debug)]
pub enum DotenvStatus {
    /// Variables were loaded from this file.
    Loaded(PathBuf),
    /// No `.env` file was found.
    NotFound,
    /// The file exists but could not be loaded.
    Failed(String),
}

impl DotenvStatus {
    fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(err) if err.not_found() => Self::NotFound,
            Err(err) => Self::Failed(err.to_string()),
        }
    }

    /// Reports the outcome through `tracing`.
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => {
                debug!("loaded environment from {}", path.display())
            }
            Self::NotFound => {}
            Self::Failed(err) => warn!("failed to load .env: {err}"),
        }
    }
}

/// Loads `.env` from the working directory or its parents, if present.
///
/// Nothing is logged here, since `.env` may itself set `RUST_LOG`. Call
/// [`DotenvStatus::log`] once logging is installed.
pub fn load_dotenv() -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::dotenv())
}

/// Reads a variable that the demo cannot run without.
pub fn required_var(name: &'static str) -> Result<String, DemoError> {
    lookup_required(name, |name| env::var(name).ok())
}

fn lookup_required(
    name: &'static str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, DemoError> {
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DemoError::MissingEnv(name)),
    }
}

/// Where the demo agents find their chat model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    /// `AGENT_BASE_URL`, a local Ollama server by default.
    pub base_url: String,
    /// `AGENT_MODEL`, `llama3.2` by default.
    pub model: String,
    /// `AGENT_API_KEY`, only needed by hosted endpoints.
    pub api_key: Option<String>,
}

impl DemoConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name| lookup(name).filter(|value| !value.is_empty());
        Self {
            base_url: var("AGENT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            model: var("AGENT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            api_key: var("AGENT_API_KEY"),
        }
    }

    /// Creates a provider for the configured endpoint.
    pub fn provider(&self) -> OpenAIProvider {
        let builder = match &self.api_key {
            Some(api_key) => OpenAIConfigBuilder::with_api_key(api_key),
            None => OpenAIConfigBuilder::ollama(),
        };
        let config = builder
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .build();
        debug!("using {config:?}");
        OpenAIProvider::new(config)
    }

    /// Creates a chat model for the configured endpoint.
    #[inline]
    pub fn chat_model(&self) -> ChatModel {
        ChatModel::new(self.provider())
    }
}
