//! A research team: a supervisor routing between a search worker and a web
//! scraping worker, each of them a ReAct agent.

use std::sync::Arc;

use agent_graph_core::{
    ChatModel, CompiledGraph, END, FINISH, GraphError, GraphState, Item,
    Node, ReactAgent, ReactAgentBuilder, RunConfig, START, StateGraph,
    Supervisor,
};
use agent_graph_model::ModelMessage;
use agent_graph_tools::{ScrapeWebpageTool, TavilySearchTool};

/// Name of the search worker.
pub const SEARCH: &str = "Search";
/// Name of the web scraping worker.
pub const WEB_SCRAPER: &str = "WebScraper";

const SUPERVISOR: &str = "supervisor";

const SUPERVISOR_PROMPT: &str = "You are a supervisor tasked with managing a \
    conversation between the following workers:  {team_members}. Given the \
    following user request, respond with the worker to act next. Each worker \
    will perform a task and respond with their results and status. When \
    finished, respond with FINISH.\n\n Select strategically to minimize the \
    number of steps taken.";

const SEARCH_PROMPT: &str = "You are a research assistant who can search for \
    up-to-date info using the tavily search engine.";

const WEB_SCRAPER_PROMPT: &str = "You are a research assistant who can scrape \
    specified urls for more detailed information using the scrapeWebpage \
    function.";

/// The state shared by the research team.
#[derive(Clone, Debug)]
pub struct ResearchTeamState {
    /// The conversation, appended to by every node.
    pub messages: Vec<Item>,
    /// Members announced to the workers, appended to.
    pub team_members: Vec<String>,
    /// Who acts next, as chosen by the supervisor.
    pub next: String,
    /// What the next worker should do.
    pub instructions: String,
}

impl Default for ResearchTeamState {
    fn default() -> Self {
        Self {
            messages: vec![],
            team_members: vec![],
            next: SUPERVISOR.to_owned(),
            instructions: "Solve the human's question.".to_owned(),
        }
    }
}

/// A partial update of [`ResearchTeamState`].
#[derive(Clone, Debug, Default)]
pub struct ResearchTeamUpdate {
    /// Items to append.
    pub messages: Vec<Item>,
    /// Members to append.
    pub team_members: Vec<String>,
    /// Replaces `next` when set.
    pub next: Option<String>,
    /// Replaces `instructions` when set.
    pub instructions: Option<String>,
}

impl ResearchTeamUpdate {
    /// Creates an update that only appends `messages`.
    #[inline]
    pub fn messages(messages: Vec<Item>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

impl GraphState for ResearchTeamState {
    type Update = ResearchTeamUpdate;

    fn apply(&mut self, update: Self::Update) {
        self.messages.extend(update.messages);
        self.team_members.extend(update.team_members);
        if let Some(next) = update.next {
            self.next = next;
        }
        if let Some(instructions) = update.instructions {
            self.instructions = instructions;
        }
    }
}

/// Builds the prompt of a worker: its role and team before the
/// conversation, a reminder of its tools after it.
pub fn agent_state_modifier(
    system_prompt: &str,
    tool_names: &[&str],
    team_members: &[String],
) -> impl Fn(&[Item]) -> Vec<ModelMessage> + Send + Sync + 'static + use<> {
    let start = ModelMessage::System(format!(
        "{system_prompt}\nWork autonomously according to your specialty, \
         using the tools available to you. Do not ask for clarification. Your \
         other team members (and other teams) will collaborate with you with \
         their own specialties. You are chosen for a reason! You are one of \
         the following team members: {}.",
        team_members.join(", ")
    ));
    let end = ModelMessage::System(format!(
        "Supervisor instructions: {system_prompt}\nRemember, you individually \
         can only use these tools: {}\n\nEnd if you have already completed \
         the requested task. Communicate the work completed.",
        tool_names.join(", ")
    ));
    move |items: &[Item]| {
        let mut messages = Vec::with_capacity(items.len() + 2);
        messages.push(start.clone());
        messages.extend(items.iter().map(|item| item.message().clone()));
        messages.push(end.clone());
        messages
    }
}

/// Runs `agent` on the team conversation and reports its final answer as a
/// message from `name`.
pub async fn run_agent_node(
    state: &ResearchTeamState,
    agent: &ReactAgent,
    name: &str,
) -> Result<ResearchTeamUpdate, GraphError> {
    let result = agent
        .invoke(state.messages.clone(), &RunConfig::default())
        .await?;
    let content = result.last_content();
    debug!("{name} reported {} chars", content.len());
    Ok(ResearchTeamUpdate::messages(vec![Item::named_user(name, content)]))
}

type ToolSetup =
    Box<dyn Fn(ReactAgentBuilder) -> ReactAgentBuilder + Send + Sync>;

/// A team member backed by a fresh ReAct agent on every turn.
struct Worker {
    name: &'static str,
    system_prompt: &'static str,
    model: ChatModel,
    setup_tools: ToolSetup,
}

impl Worker {
    async fn run(
        &self,
        state: ResearchTeamState,
    ) -> Result<ResearchTeamUpdate, GraphError> {
        let team_members = if state.team_members.is_empty() {
            vec![self.name.to_owned()]
        } else {
            state.team_members.clone()
        };
        let builder = ReactAgent::builder().with_model(self.model.clone());
        let builder = (self.setup_tools)(builder);
        let prompt = agent_state_modifier(
            self.system_prompt,
            &builder.tool_names(),
            &team_members,
        );
        let agent = builder.with_prompt(prompt).build()?;
        run_agent_node(&state, &agent, self.name).await
    }
}

/// Builds the research team graph.
///
/// The supervisor starts and picks a worker, every worker reports back to
/// the supervisor, and the run ends when the supervisor picks `FINISH`.
pub fn research_team(
    model: ChatModel,
    tavily_api_key: String,
) -> Result<CompiledGraph<ResearchTeamState>, GraphError> {
    let supervisor = Arc::new(Supervisor::new(
        model.clone(),
        SUPERVISOR_PROMPT,
        [SEARCH, WEB_SCRAPER],
    ));
    let search = Worker {
        name: SEARCH,
        system_prompt: SEARCH_PROMPT,
        model: model.clone(),
        setup_tools: Box::new(move |builder: ReactAgentBuilder| {
            builder.with_tool(TavilySearchTool::new(&tavily_api_key))
        }),
    };
    let web_scraper = Worker {
        name: WEB_SCRAPER,
        system_prompt: WEB_SCRAPER_PROMPT,
        model,
        setup_tools: Box::new(|builder: ReactAgentBuilder| {
            builder.with_tool(ScrapeWebpageTool::new())
        }),
    };

    StateGraph::<ResearchTeamState>::new()
        .add_node(SUPERVISOR, move |state: ResearchTeamState| {
            let supervisor = Arc::clone(&supervisor);
            async move {
                let decision = supervisor.route(&state.messages).await?;
                Ok::<_, GraphError>(ResearchTeamUpdate {
                    next: Some(decision.next),
                    instructions: decision.instructions,
                    ..Default::default()
                })
            }
        })
        .add_node(SEARCH, worker_node(search))
        .add_node(WEB_SCRAPER, worker_node(web_scraper))
        .add_edge(SEARCH, SUPERVISOR)
        .add_edge(WEB_SCRAPER, SUPERVISOR)
        .add_conditional_edges(
            SUPERVISOR,
            |state: &ResearchTeamState| state.next.clone(),
            [(SEARCH, SEARCH), (WEB_SCRAPER, WEB_SCRAPER), (FINISH, END)],
        )
        .add_edge(START, SUPERVISOR)
        .compile()
}

fn worker_node(worker: Worker) -> impl Node<ResearchTeamState> {
    let worker = Arc::new(worker);
    move |state: ResearchTeamState| {
        let worker = Arc::clone(&worker);
        async move { worker.run(state).await }
    }
}
