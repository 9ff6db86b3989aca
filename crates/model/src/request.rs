use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OpaqueMessage, ToolCallRequest};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// A message in the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A text answer from the model.
    Assistant(String),
    /// A tool call previously requested by the model.
    ToolCall(ToolCallRequest),
    /// The result of a tool call.
    Tool(ToolCallResult),
    /// A provider-specific message, usually a model turn recorded verbatim.
    Opaque(OpaqueMessage),
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The id of the tool call request this result answers.
    pub id: String,
    /// Name of the tool that was called.
    pub name: String,
    /// Human-readable report of the outcome.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

/// Declares a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters of the tool, as a [JSON schema](https://json-schema.org/)
    /// object.
    pub parameters: Value,
}
