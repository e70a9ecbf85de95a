mod builder;
#[cfg(test)]
mod tests;

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use agent_graph_model::ModelMessage;
use async_trait::async_trait;
use futures_util::Stream;
use futures_util::future::join_all;

use crate::GraphError;
use crate::chat_model::ChatModel;
use crate::conversation::{Item, MessagesState};
use crate::graph::{CompiledGraph, END, GraphStep, Node, RunConfig};
use crate::tool::Toolbox;
pub use builder::ReactAgentBuilder;

/// Turns the items of a thread into the messages sent to the model.
pub(crate) type StateModifier =
    Arc<dyn Fn(&[Item]) -> Vec<ModelMessage> + Send + Sync>;

/// Routes to the `tools` node if the latest item requested tool calls, or
/// to [`END`] otherwise.
pub fn tools_condition(state: &MessagesState) -> String {
    match state.last() {
        Some(item) if !item.tool_calls().is_empty() => "tools".to_owned(),
        _ => END.to_owned(),
    }
}

/// A graph node that runs the tool calls requested by the latest item.
///
/// Calls run concurrently, and their results are appended in the order
/// the model requested them.
#[derive(Clone)]
pub struct ToolNode {
    toolbox: Arc<Toolbox>,
}

impl ToolNode {
    /// Creates a node running tools from `toolbox`.
    #[inline]
    pub fn new(toolbox: Toolbox) -> Self {
        Self {
            toolbox: Arc::new(toolbox),
        }
    }

    /// Returns the toolbox of this node.
    #[inline]
    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }
}

impl Debug for ToolNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ToolNode").field(&self.toolbox).finish()
    }
}

#[async_trait]
impl Node<MessagesState> for ToolNode {
    async fn run(
        &self,
        state: MessagesState,
    ) -> Result<Vec<Item>, GraphError> {
        let Some(last) = state.last() else {
            return Ok(vec![]);
        };
        let calls = last.tool_calls().to_vec();
        debug!("running {} tool calls", calls.len());
        let results =
            join_all(calls.into_iter().map(|req| self.toolbox.execute(req)))
                .await;
        Ok(results.into_iter().map(Item::tool_result).collect())
    }
}

/// The node that asks the model for the next step.
struct AgentNode {
    model: ChatModel,
    prompt: Option<StateModifier>,
}

#[async_trait]
impl Node<MessagesState> for AgentNode {
    async fn run(
        &self,
        state: MessagesState,
    ) -> Result<Vec<Item>, GraphError> {
        let item = match &self.prompt {
            Some(prompt) => {
                let messages = prompt(state.messages());
                self.model.invoke_messages(messages).await?
            }
            None => self.model.invoke(state.messages()).await?,
        };
        Ok(vec![item])
    }
}

/// A prebuilt ReAct agent.
///
/// The agent is a two-node graph: `agent` asks the model what to do next,
/// and `tools` runs the tool calls it requested before handing control back
/// to `agent`. A run ends once the model answers without tool calls.
#[derive(Clone)]
pub struct ReactAgent {
    graph: CompiledGraph<MessagesState>,
}

impl ReactAgent {
    /// Creates a builder.
    #[inline]
    pub fn builder() -> ReactAgentBuilder {
        ReactAgentBuilder::default()
    }

    /// Runs the agent on `input` and returns the final state of the thread.
    #[inline]
    pub async fn invoke(
        &self,
        input: Vec<Item>,
        config: &RunConfig,
    ) -> Result<MessagesState, GraphError> {
        self.graph.invoke(input, config).await
    }

    /// Runs the agent on `input` and yields the items added by each step.
    #[inline]
    pub fn stream(
        &self,
        input: Vec<Item>,
        config: &RunConfig,
    ) -> impl Stream<Item = Result<GraphStep<Vec<Item>>, GraphError>>
    + Send
    + 'static {
        self.graph.stream(input, config)
    }

    /// Returns the underlying graph.
    #[inline]
    pub fn graph(&self) -> &CompiledGraph<MessagesState> {
        &self.graph
    }
}

impl Debug for ReactAgent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactAgent")
            .field("graph", &self.graph)
            .finish()
    }
}
