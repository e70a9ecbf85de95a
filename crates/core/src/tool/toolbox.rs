use std::fmt::{self, Debug};

use agent_graph_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{AnyTool, Error, Tool, ToolObject};

/// A set of tools, dispatching the model's tool call requests by name.
///
/// Tools keep their registration order, which is the order their
/// definitions are offered to the model.
#[derive(Default)]
pub struct Toolbox {
    tools: Vec<Box<dyn ToolObject>>,
}

impl Toolbox {
    /// Creates an empty toolbox.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let tool: Box<dyn ToolObject> = Box::new(AnyTool(tool));
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => {
                warn!("tool `{}` registered twice, keeping the last", tool.name());
                *slot = tool;
            }
            None => self.tools.push(tool),
        }
    }

    /// Registers a tool and returns the toolbox.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.add_tool(tool);
        self
    }

    /// Returns the names of the registered tools.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the definitions to send along with model requests.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs one tool call request.
    ///
    /// Failures, including unknown tools and invalid arguments, are reported
    /// to the model as the content of the result instead of aborting the
    /// run, so the model gets a chance to correct itself.
    pub fn execute(
        &self,
        req: ToolCallRequest,
    ) -> impl Future<Output = ToolCallResult> + Send + 'static {
        let span = debug_span!("tool", name = %req.name, id = %req.id);
        let fut = match self.tools.iter().find(|tool| tool.name() == req.name) {
            Some(tool) => {
                trace!(parent: &span, "args: {:?}", req.arguments);
                Some(tool.execute(req.arguments))
            }
            None => {
                warn!(parent: &span, "tool not found");
                None
            }
        };
        let id = req.id;
        let name = req.name;

        async move {
            let result = match fut {
                Some(fut) => fut.await,
                None => Err(Error::not_found()
                    .with_reason(format!("`{name}` is not a valid tool"))),
            };
            let content = match result {
                Ok(content) => content,
                Err(err) => {
                    debug!("tool failed: {err}");
                    format!("Error: {}", err.reason())
                }
            };
            ToolCallResult { id, content }
        }
        .instrument(span)
    }
}

impl Debug for Toolbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolbox")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::sync::LazyLock;

    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;
    use crate::tool::ToolResult;

    static ECHO_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    });

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool(&'static str);

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Repeats the text"
        }

        fn parameter_schema(&self) -> &Value {
            &ECHO_SCHEMA
        }

        fn execute(
            &self,
            input: EchoInput,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(input.text))
        }
    }

    fn request(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_execute() {
        let toolbox = Toolbox::new().with_tool(EchoTool("echo"));
        let result = toolbox
            .execute(request("echo", json!({ "text": "hi" })))
            .await;
        assert_eq!(
            result,
            ToolCallResult {
                id: "call_1".to_owned(),
                content: "hi".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn test_errors_become_content() {
        let toolbox = Toolbox::new().with_tool(EchoTool("echo"));

        let result = toolbox
            .execute(request("shout", json!({ "text": "hi" })))
            .await;
        assert_eq!(result.content, "Error: `shout` is not a valid tool");

        let result = toolbox.execute(request("echo", json!({}))).await;
        assert!(result.content.starts_with("Error: missing field `text`"));
    }

    #[test]
    fn test_definitions_keep_order() {
        let mut toolbox = Toolbox::new()
            .with_tool(EchoTool("b"))
            .with_tool(EchoTool("a"));
        toolbox.add_tool(EchoTool("b"));
        let names: Vec<_> =
            toolbox.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(toolbox.definitions()[1].parameters, *ECHO_SCHEMA);
    }
}
