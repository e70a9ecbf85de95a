//! Provider-neutral protocol between agents and language models.
//!
//! Agents, graph nodes and supervisors only ever talk to a model through the
//! types in this crate. A provider crate (for example the OpenAI-compatible
//! one, which also covers a local Ollama endpoint) maps them onto its own
//! wire format.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
