//! A model-backed router choosing which team member acts next.

use agent_graph_model::{ModelMessage, ModelTool, ToolChoice};
use serde::Deserialize;
use serde_json::json;

use crate::GraphError;
use crate::chat_model::ChatModel;
use crate::conversation::Item;

/// The option a supervisor picks when the team is done.
pub const FINISH: &str = "FINISH";

const ROUTE_TOOL: &str = "route";

/// The choice made by a [`Supervisor`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RouteDecision {
    /// A team member, or [`FINISH`].
    pub next: String,
    /// The sub-task for the chosen member, if the model gave one.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Why the model chose `next`.
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Routes a conversation between team members.
///
/// Every call sends the system prompt, the conversation and a closing
/// question to the model, forcing it to answer through a single `route`
/// tool whose `next` argument is one of [`FINISH`] or the members.
#[derive(Clone, Debug)]
pub struct Supervisor {
    model: ChatModel,
    system_prompt: String,
    options: Vec<String>,
}

impl Supervisor {
    /// Creates a supervisor for `members`.
    ///
    /// `{team_members}` in `system_prompt` is replaced by the member names.
    pub fn new<S, I, M>(model: ChatModel, system_prompt: S, members: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        let mut options = vec![FINISH.to_owned()];
        options.extend(members.into_iter().map(Into::into));
        let system_prompt = system_prompt
            .as_ref()
            .replace("{team_members}", &options[1..].join(", "));
        let model = model
            .bind_tools(vec![route_tool(&options)])
            .with_tool_choice(ToolChoice::Tool(ROUTE_TOOL.to_owned()));
        Self {
            model,
            system_prompt,
            options,
        }
    }

    /// Returns [`FINISH`] followed by the members.
    #[inline]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns the team members.
    #[inline]
    pub fn members(&self) -> &[String] {
        &self.options[1..]
    }

    /// Returns the system prompt with the members filled in.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Asks the model who should act next on `items`.
    pub async fn route(
        &self,
        items: &[Item],
    ) -> Result<RouteDecision, GraphError> {
        let mut messages = Vec::with_capacity(items.len() + 2);
        messages.push(ModelMessage::System(self.system_prompt.clone()));
        messages.extend(items.iter().map(|item| item.message().clone()));
        messages.push(ModelMessage::System(format!(
            "Given the conversation above, who should act next? Or should we \
             FINISH? Select one of: {}",
            self.options.join(", ")
        )));

        let resp = self.model.send(messages).await?;
        let Some(call) = resp.tool_calls.into_iter().next() else {
            return Err(GraphError::UnexpectedOutput(format!(
                "the supervisor answered without routing: {:?}",
                resp.transcript
            )));
        };
        let decision: RouteDecision = serde_json::from_value(call.arguments)
            .map_err(|err| {
                GraphError::UnexpectedOutput(format!(
                    "invalid `{}` arguments: {err}",
                    call.name
                ))
            })?;
        if !self.options.contains(&decision.next) {
            return Err(GraphError::UnexpectedOutput(format!(
                "`{}` is not one of: {}",
                decision.next,
                self.options.join(", ")
            )));
        }
        debug!("supervisor chose {}", decision.next);
        Ok(decision)
    }
}

fn route_tool(options: &[String]) -> ModelTool {
    ModelTool {
        name: ROUTE_TOOL.to_owned(),
        description: "Select the next role.".to_owned(),
        parameters: json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string" },
                "next": { "type": "string", "enum": options },
                "instructions": {
                    "type": "string",
                    "description": "The specific instructions of the sub-task \
                                    the next role should accomplish."
                }
            },
            "required": ["reasoning", "next", "instructions"],
            "additionalProperties": false
        }),
    }
}
