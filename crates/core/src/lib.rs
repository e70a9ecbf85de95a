//! Core building blocks: tools, chat models, message state, state graphs,
//! checkpointers, the prebuilt ReAct agent and the team supervisor.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
mod chat_model;
pub mod checkpoint;
mod conversation;
mod error;
pub mod graph;
mod model_client;
pub mod supervisor;
pub mod tool;

pub use agent::{ReactAgent, ReactAgentBuilder, ToolNode, tools_condition};
pub use chat_model::ChatModel;
pub use checkpoint::{Checkpointer, MemorySaver};
pub use conversation::{Item, MessagesState};
pub use error::GraphError;
pub use graph::{
    CompiledGraph, END, GraphState, GraphStep, Node, RunConfig, START,
    StateGraph,
};
pub use supervisor::{FINISH, RouteDecision, Supervisor};
pub use tool::{Tool, ToolResult, Toolbox};
