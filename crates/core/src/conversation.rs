//! Conversation-related types.

use mini_cursor_model::{
    ModelMessage, OpaqueMessage, ToolCallRequest, ToolCallResult,
};

/// One entry in the conversation, tagged by who produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Turn {
    /// Text typed by the user.
    User(String),
    /// A final text answer from the model.
    ModelText(String),
    /// A tool call requested by the model.
    ModelToolCall(ToolCallRequest),
    /// The result of a tool call, sent back to the model.
    ToolResult(ToolCallResult),
}

impl Turn {
    fn to_model_message(&self) -> ModelMessage {
        match self {
            Turn::User(text) => ModelMessage::User(text.clone()),
            Turn::ModelText(text) => ModelMessage::Assistant(text.clone()),
            Turn::ModelToolCall(req) => ModelMessage::ToolCall(req.clone()),
            Turn::ToolResult(result) => ModelMessage::Tool(result.clone()),
        }
    }
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    turn: Turn,
    opaque_msg: Option<OpaqueMessage>,
}

impl Item {
    /// Returns the turn of this item.
    #[inline]
    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    /// Returns the provider message this item was produced with, if any.
    #[inline]
    pub fn opaque_msg(&self) -> Option<&OpaqueMessage> {
        self.opaque_msg.as_ref()
    }
}

/// Represents a conversation.
///
/// The conversation only grows. User turns may be added by anyone, model
/// and tool turns are only added by the agent while it runs.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<Item>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user turn.
    #[inline]
    pub fn push_user<S: Into<String>>(&mut self, text: S) {
        self.push(Turn::User(text.into()), None);
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items, oldest first.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns an iterator over the turns, oldest first.
    #[inline]
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.items.iter().map(Item::turn)
    }

    pub(crate) fn push(&mut self, turn: Turn, opaque_msg: Option<OpaqueMessage>) {
        self.items.push(Item { turn, opaque_msg });
    }

    /// Converts the conversation into the messages of a model request.
    ///
    /// Consecutive items produced by the same model response share one
    /// opaque message and are sent as that message only once.
    pub(crate) fn to_model_messages(&self) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(self.items.len());
        let mut last_opaque: Option<&OpaqueMessage> = None;
        for item in &self.items {
            match &item.opaque_msg {
                Some(opaque) => {
                    if last_opaque != Some(opaque) {
                        messages.push(ModelMessage::Opaque(opaque.clone()));
                    }
                    last_opaque = Some(opaque);
                }
                None => {
                    last_opaque = None;
                    messages.push(item.turn.to_model_message());
                }
            }
        }
        messages
    }
}
