use std::sync::Arc;

use agent_graph_model::{ModelMessage, ModelProvider};
use backoff::ExponentialBackoff;

use super::{AgentNode, ReactAgent, StateModifier, ToolNode, tools_condition};
use crate::GraphError;
use crate::chat_model::ChatModel;
use crate::checkpoint::Checkpointer;
use crate::conversation::{Item, MessagesState};
use crate::graph::{END, START, StateGraph};
use crate::tool::{Tool, Toolbox};

/// [`ReactAgent`] builder.
#[derive(Default)]
pub struct ReactAgentBuilder {
    model: Option<ChatModel>,
    toolbox: Toolbox,
    prompt: Option<StateModifier>,
    checkpointer: Option<Arc<dyn Checkpointer<MessagesState>>>,
    backoff: Option<ExponentialBackoff>,
}

impl ReactAgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        self,
        provider: P,
    ) -> Self {
        self.with_model(ChatModel::new(provider))
    }

    /// Uses an existing chat model. Its bound tools are replaced by the
    /// tools of this agent.
    #[inline]
    pub fn with_model(mut self, model: ChatModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.toolbox.add_tool(tool);
        self
    }

    /// Returns the names of the registered tools.
    #[inline]
    pub fn tool_names(&self) -> Vec<&str> {
        self.toolbox.names()
    }

    /// Prepends a system message to every model request.
    pub fn with_system_prompt<S: Into<String>>(self, prompt: S) -> Self {
        let prompt = prompt.into();
        self.with_prompt(move |items: &[Item]| {
            let mut messages = Vec::with_capacity(items.len() + 1);
            messages.push(ModelMessage::System(prompt.clone()));
            messages.extend(items.iter().map(|item| item.message().clone()));
            messages
        })
    }

    /// Sets the function that turns the thread into the messages sent to
    /// the model. Without one the thread is sent as it is.
    #[inline]
    pub fn with_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&[Item]) -> Vec<ModelMessage> + Send + Sync + 'static,
    {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    /// Persists every thread the agent runs on.
    #[inline]
    pub fn with_checkpointer<C>(mut self, checkpointer: C) -> Self
    where
        C: Checkpointer<MessagesState> + 'static,
    {
        self.checkpointer = Some(Arc::new(checkpointer));
        self
    }

    /// Sets the retry policy for retryable model errors.
    #[inline]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<ReactAgent, GraphError> {
        let Self {
            model,
            toolbox,
            prompt,
            checkpointer,
            backoff,
        } = self;

        let Some(mut model) = model else {
            return Err(GraphError::InvalidGraph(
                "a react agent needs a model".to_owned(),
            ));
        };
        if let Some(backoff) = backoff {
            model = model.with_backoff(backoff);
        }
        model = model.bind_tools(toolbox.definitions());
        debug!("building react agent with tools {:?}", toolbox.names());

        let mut graph = StateGraph::new()
            .add_node("agent", AgentNode { model, prompt })
            .add_node("tools", ToolNode::new(toolbox))
            .add_edge(START, "agent")
            .add_conditional_edges(
                "agent",
                tools_condition,
                [("tools", "tools"), (END, END)],
            )
            .add_edge("tools", "agent")
            .compile()?;
        if let Some(checkpointer) = checkpointer {
            graph = graph.with_checkpointer(checkpointer);
        }
        Ok(ReactAgent { graph })
    }
}
