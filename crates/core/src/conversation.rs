//! Conversation-related types.

use agent_graph_model::{ModelMessage, ToolCallRequest, ToolCallResult};

use crate::graph::GraphState;
use crate::model_client::ModelClientResponse;

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) id: Option<String>,
    pub(crate) msg: ModelMessage,
    pub(crate) transcript: String,
    pub(crate) tool_calls: Vec<ToolCallRequest>,
}

impl Item {
    /// Creates a user input item.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        Self::new(ModelMessage::User(text.clone()), text)
    }

    /// Creates a user-role item attributed to `name`.
    #[inline]
    pub fn named_user<N: Into<String>, S: Into<String>>(
        name: N,
        text: S,
    ) -> Self {
        let content = text.into();
        let msg = ModelMessage::NamedUser {
            name: name.into(),
            content: content.clone(),
        };
        Self::new(msg, content)
    }

    /// Creates a plain assistant item without tool calls.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        Self::new(ModelMessage::Assistant(text.clone()), text)
    }

    /// Creates an item that carries the result of a tool call.
    #[inline]
    pub fn tool_result(result: ToolCallResult) -> Self {
        let transcript = result.content.clone();
        Self::new(ModelMessage::Tool(result), transcript)
    }

    pub(crate) fn from_response(resp: ModelClientResponse) -> Self {
        let ModelClientResponse {
            transcript,
            opaque_msg,
            tool_calls,
            ..
        } = resp;
        let msg = match opaque_msg {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
            None => ModelMessage::Assistant(transcript.clone()),
        };
        Self {
            id: None,
            msg,
            transcript,
            tool_calls,
        }
    }

    #[inline]
    fn new(msg: ModelMessage, transcript: String) -> Self {
        Self {
            id: None,
            msg,
            transcript,
            tool_calls: vec![],
        }
    }

    /// Sets the id of this item. An update carrying the id of an item
    /// already in the state replaces that item.
    #[inline]
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns the id assigned to this item, if any.
    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the message sent to the model for this item.
    #[inline]
    pub fn message(&self) -> &ModelMessage {
        &self.msg
    }

    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns the tool calls requested by this item.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.tool_calls
    }
}

/// A graph state holding a single conversation.
///
/// Updates are appended. An update item whose id matches an item already
/// in the state replaces it in place; items without an id get a fresh one.
#[derive(Clone, Default, Debug)]
pub struct MessagesState {
    messages: Vec<Item>,
    next_id: u64,
}

impl MessagesState {
    /// Returns all items, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Item] {
        &self.messages
    }

    /// Returns the latest item.
    #[inline]
    pub fn last(&self) -> Option<&Item> {
        self.messages.last()
    }

    /// Returns the transcript of the latest item, or an empty string for an
    /// empty conversation.
    #[inline]
    pub fn last_content(&self) -> &str {
        self.last().map(Item::transcript).unwrap_or_default()
    }

    pub(crate) fn push(&mut self, mut item: Item) {
        if let Some(id) = item.id.as_deref() {
            let existing = self
                .messages
                .iter_mut()
                .find(|old| old.id.as_deref() == Some(id));
            if let Some(slot) = existing {
                *slot = item;
                return;
            }
        } else {
            item.id = Some(self.fresh_id());
        }
        self.messages.push(item);
    }

    // Generated ids skip those already taken by caller-supplied ones.
    fn fresh_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("msg-{}", self.next_id);
            if !self.messages.iter().any(|m| m.id.as_deref() == Some(&*id)) {
                return id;
            }
        }
    }
}

impl GraphState for MessagesState {
    type Update = Vec<Item>;

    fn apply(&mut self, update: Self::Update) {
        for item in update {
            self.push(item);
        }
    }
}
