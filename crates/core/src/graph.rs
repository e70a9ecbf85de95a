//! Graphs of nodes sharing one state.
//!
//! A [`StateGraph`] wires named nodes together with direct and conditional
//! edges. Each node reads the current state and returns an update, which the
//! state folds in through [`GraphState::apply`]. Compiling the graph checks
//! its wiring once, and the resulting [`CompiledGraph`] can be run any number
//! of times, optionally persisting the state per thread.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use futures_util::stream;
use tracing::Instrument;

use crate::GraphError;
use crate::checkpoint::Checkpointer;

/// The virtual node every run starts from.
pub const START: &str = "__start__";

/// The virtual node that ends a run.
pub const END: &str = "__end__";

const DEFAULT_RECURSION_LIMIT: usize = 25;

/// A state shared by the nodes of a graph.
pub trait GraphState: Default + Clone + Send + Sync + 'static {
    /// The partial update a node returns.
    type Update: Clone + Debug + Send + Sync + 'static;

    /// Folds `update` into the state.
    fn apply(&mut self, update: Self::Update);
}

/// A step of a graph.
///
/// Any async function or closure taking the state and returning an update
/// is a node.
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    /// Runs the node against a snapshot of the state.
    async fn run(&self, state: S) -> Result<S::Update, GraphError>;
}

#[async_trait]
impl<S, F, Fut> Node<S> for F
where
    S: GraphState,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S::Update, GraphError>> + Send + 'static,
{
    #[inline]
    async fn run(&self, state: S) -> Result<S::Update, GraphError> {
        (self)(state).await
    }
}

type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

enum Edge<S> {
    Direct(String),
    Conditional {
        router: Router<S>,
        path_map: HashMap<String, String>,
    },
}

impl<S> Debug for Edge<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Conditional { path_map, .. } => f
                .debug_struct("Conditional")
                .field("path_map", path_map)
                .finish_non_exhaustive(),
        }
    }
}

/// Options for a single run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    thread_id: Option<String>,
    recursion_limit: usize,
}

impl Default for RunConfig {
    #[inline]
    fn default() -> Self {
        Self {
            thread_id: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl RunConfig {
    /// Creates a config that persists its state under `thread_id`.
    #[inline]
    pub fn thread<S: Into<String>>(thread_id: S) -> Self {
        Self::default().with_thread_id(thread_id)
    }

    /// Sets the thread whose checkpoint is loaded and saved.
    #[inline]
    pub fn with_thread_id<S: Into<String>>(mut self, thread_id: S) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Sets the maximum number of node executions in one run.
    #[inline]
    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Returns the thread id, if any.
    #[inline]
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Returns the recursion limit.
    #[inline]
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }
}

/// The output of one executed node.
#[derive(Clone, Debug)]
pub struct GraphStep<U> {
    /// Name of the node.
    pub node: String,
    /// The update it returned.
    pub update: U,
}

/// [`CompiledGraph`] builder.
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    errors: Vec<String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    /// Creates an empty graph.
    #[inline]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            errors: vec![],
        }
    }

    /// Adds a node.
    pub fn add_node<N>(mut self, name: &str, node: N) -> Self
    where
        N: Node<S> + 'static,
    {
        if name.is_empty() || name == START || name == END {
            self.errors.push(format!("`{name}` is a reserved node name"));
        } else if self.nodes.contains_key(name) {
            self.errors.push(format!("node `{name}` is already present"));
        } else {
            self.nodes.insert(name.to_owned(), Arc::new(node));
        }
        self
    }

    /// Adds an edge that always goes from `from` to `to`.
    pub fn add_edge(self, from: &str, to: &str) -> Self {
        self.insert_edge(from, Edge::Direct(to.to_owned()))
    }

    /// Adds an edge whose destination is chosen by `router` after `from`
    /// has run.
    ///
    /// The router's answer is looked up in `path_map`. An empty map uses the
    /// answer as the destination directly.
    pub fn add_conditional_edges<R, I, K, V>(
        self,
        from: &str,
        router: R,
        path_map: I,
    ) -> Self
    where
        R: Fn(&S) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let path_map = path_map
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let edge = Edge::Conditional {
            router: Arc::new(router),
            path_map,
        };
        self.insert_edge(from, edge)
    }

    fn insert_edge(mut self, from: &str, edge: Edge<S>) -> Self {
        if from == END {
            self.errors.push("the end node has no outgoing edge".to_owned());
        } else if self.edges.contains_key(from) {
            self.errors
                .push(format!("node `{from}` already has an outgoing edge"));
        } else {
            self.edges.insert(from.to_owned(), edge);
        }
        self
    }

    /// Checks the wiring and returns a runnable graph.
    pub fn compile(self) -> Result<CompiledGraph<S>, GraphError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(GraphError::InvalidGraph(err));
        }
        if !self.edges.contains_key(START) {
            return Err(GraphError::InvalidGraph(
                "no edge leaves the start node".to_owned(),
            ));
        }

        let is_target =
            |name: &str| name == END || self.nodes.contains_key(name);
        for (from, edge) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(GraphError::InvalidGraph(format!(
                    "edge starts from unknown node `{from}`"
                )));
            }
            let targets: Vec<&String> = match edge {
                Edge::Direct(to) => vec![to],
                Edge::Conditional { path_map, .. } => {
                    path_map.values().collect()
                }
            };
            if let Some(to) =
                targets.into_iter().find(|to| !is_target(to.as_str()))
            {
                return Err(GraphError::InvalidGraph(format!(
                    "edge from `{from}` leads to unknown node `{to}`"
                )));
            }
        }
        if let Some(name) =
            self.nodes.keys().find(|name| !self.edges.contains_key(*name))
        {
            return Err(GraphError::InvalidGraph(format!(
                "node `{name}` has no outgoing edge"
            )));
        }

        Ok(CompiledGraph {
            inner: Arc::new(GraphInner {
                nodes: self.nodes,
                edges: self.edges,
                checkpointer: None,
            }),
        })
    }
}

impl<S: GraphState> Debug for StateGraph<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .finish_non_exhaustive()
    }
}

struct GraphInner<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    checkpointer: Option<Arc<dyn Checkpointer<S>>>,
}

impl<S: GraphState> GraphInner<S> {
    fn next_node(&self, from: &str, state: &S) -> Result<String, GraphError> {
        let unknown = |to: String| GraphError::UnknownDestination {
            from: from.to_owned(),
            to,
        };
        let to = match self.edges.get(from) {
            Some(Edge::Direct(to)) => return Ok(to.clone()),
            Some(Edge::Conditional { router, path_map }) => {
                let choice = router(state);
                if path_map.is_empty() {
                    choice
                } else {
                    match path_map.get(&choice) {
                        Some(to) => to.clone(),
                        None => return Err(unknown(choice)),
                    }
                }
            }
            None => return Err(unknown(END.to_owned())),
        };
        if to != END && !self.nodes.contains_key(&to) {
            return Err(unknown(to));
        }
        Ok(to)
    }
}

/// A validated graph, ready to run.
///
/// Cloning is cheap and clones share the checkpointer.
pub struct CompiledGraph<S: GraphState> {
    inner: Arc<GraphInner<S>>,
}

impl<S: GraphState> Clone for CompiledGraph<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: GraphState> Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.inner.nodes.keys().collect::<Vec<_>>())
            .field("checkpointer", &self.inner.checkpointer.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: GraphState> CompiledGraph<S> {
    /// Persists the state of every run that names a thread.
    pub fn with_checkpointer<C>(self, checkpointer: C) -> Self
    where
        C: Checkpointer<S> + 'static,
    {
        let inner = GraphInner {
            nodes: self.inner.nodes.clone(),
            edges: clone_edges(&self.inner.edges),
            checkpointer: Some(Arc::new(checkpointer)),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Runs the graph until it reaches [`END`] and returns the final state.
    pub async fn invoke(
        &self,
        input: S::Update,
        config: &RunConfig,
    ) -> Result<S, GraphError> {
        let mut run = Run::new(self, input, config);
        while let Some(step) = run.next_step().await {
            step?;
        }
        Ok(run.state)
    }

    /// Runs the graph and yields the update of every executed node, in
    /// order. The stream ends after the first error.
    pub fn stream(
        &self,
        input: S::Update,
        config: &RunConfig,
    ) -> impl Stream<Item = Result<GraphStep<S::Update>, GraphError>>
    + Send
    + 'static {
        let run = Run::new(self, input, config);
        stream::unfold(Some(run), |run| async move {
            let mut run = run?;
            match run.next_step().await? {
                Ok(step) => Some((Ok(step), Some(run))),
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

fn clone_edges<S>(
    edges: &HashMap<String, Edge<S>>,
) -> HashMap<String, Edge<S>> {
    edges
        .iter()
        .map(|(from, edge)| {
            let edge = match edge {
                Edge::Direct(to) => Edge::Direct(to.clone()),
                Edge::Conditional { router, path_map } => Edge::Conditional {
                    router: Arc::clone(router),
                    path_map: path_map.clone(),
                },
            };
            (from.clone(), edge)
        })
        .collect()
}

struct Run<S: GraphState> {
    graph: Arc<GraphInner<S>>,
    config: RunConfig,
    input: Option<S::Update>,
    state: S,
    current: String,
    steps: usize,
}

impl<S: GraphState> Run<S> {
    fn new(
        graph: &CompiledGraph<S>,
        input: S::Update,
        config: &RunConfig,
    ) -> Self {
        Self {
            graph: Arc::clone(&graph.inner),
            config: config.clone(),
            input: Some(input),
            state: S::default(),
            current: START.to_owned(),
            steps: 0,
        }
    }

    async fn save(&self) -> Result<(), GraphError> {
        let (Some(checkpointer), Some(thread_id)) =
            (&self.graph.checkpointer, self.config.thread_id())
        else {
            return Ok(());
        };
        checkpointer.put(thread_id, &self.state).await
    }

    async fn start(&mut self, input: S::Update) -> Result<(), GraphError> {
        if let (Some(checkpointer), Some(thread_id)) =
            (&self.graph.checkpointer, self.config.thread_id())
        {
            if let Some(saved) = checkpointer.get(thread_id).await? {
                debug!("resuming thread {thread_id}");
                self.state = saved;
            }
        }
        self.state.apply(input);
        self.save().await?;
        self.current = self.graph.next_node(START, &self.state)?;
        Ok(())
    }

    /// Executes the next node, or returns `None` once the run has ended.
    async fn next_step(
        &mut self,
    ) -> Option<Result<GraphStep<S::Update>, GraphError>> {
        if let Some(input) = self.input.take() {
            if let Err(err) = self.start(input).await {
                return Some(Err(err));
            }
        }
        if self.current == END {
            return None;
        }
        Some(self.execute_current().await)
    }

    async fn execute_current(
        &mut self,
    ) -> Result<GraphStep<S::Update>, GraphError> {
        if self.steps >= self.config.recursion_limit {
            return Err(GraphError::RecursionLimit(self.config.recursion_limit));
        }
        self.steps += 1;

        let name = std::mem::replace(&mut self.current, END.to_owned());
        let Some(node) = self.graph.nodes.get(&name) else {
            return Err(GraphError::UnknownDestination {
                from: START.to_owned(),
                to: name,
            });
        };
        let span = debug_span!("graph step", node = %name, step = self.steps);
        let update = node.run(self.state.clone()).instrument(span).await?;
        trace!("node {name} returned {update:?}");

        self.state.apply(update.clone());
        self.save().await?;
        self.current = self.graph.next_node(&name, &self.state)?;
        Ok(GraphStep { node: name, update })
    }
}
