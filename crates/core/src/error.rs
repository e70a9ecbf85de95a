use agent_graph_model::ModelProviderError;
use thiserror::Error;

/// Errors raised while building or running a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph definition is inconsistent.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    /// A router chose a destination that does not exist.
    #[error("node `{from}` routed to unknown destination `{to}`")]
    UnknownDestination {
        /// The node whose outgoing edge was evaluated.
        from: String,
        /// The destination returned by the router.
        to: String,
    },
    /// The run executed more steps than allowed.
    #[error("recursion limit of {0} reached without hitting the end node")]
    RecursionLimit(usize),
    /// The model provider failed.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// The model answered in a way the caller cannot use.
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
    /// A node failed for a reason of its own.
    #[error("node `{node}` failed: {reason}")]
    Node {
        /// Name of the failing node.
        node: String,
        /// What went wrong.
        reason: String,
    },
}

impl From<Box<dyn ModelProviderError>> for GraphError {
    #[inline]
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        GraphError::Model(err)
    }
}
