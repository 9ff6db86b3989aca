//! Tool call supports.

mod error;
mod registry;

use std::pin::Pin;

use mini_cursor_model::{ModelTool, ToolCallRequest, ToolCallResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use registry::Registry;

/// The result of a tool call.
///
/// Failures are values, not panics: an `Err` is reported back to the model
/// as an error result and the conversation goes on.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// The model addresses a tool by [`name`](Tool::name) and fills in its
/// arguments according to [`parameter_schema`](Tool::parameter_schema).
/// Arguments are deserialized into [`Tool::Input`] before `execute` is
/// called, so an implementation only ever sees well-formed input.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// The returned future must not borrow from `self`. Dropping it should
    /// stop the work where possible.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn declaration(&self) -> ModelTool;

    fn call(&self, arguments: Value) -> BoxedToolFuture;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    fn declaration(&self) -> ModelTool {
        ModelTool {
            name: self.0.name().to_owned(),
            description: self.0.description().to_owned(),
            parameters: self.0.parameter_schema().clone(),
        }
    }

    fn call(&self, arguments: Value) -> BoxedToolFuture {
        match serde_json::from_value::<T::Input>(arguments) {
            Ok(input) => Box::pin(self.0.execute(input)),
            Err(err) => {
                let reason =
                    format!("invalid arguments for `{}`: {err}", self.0.name());
                Box::pin(std::future::ready(Err(
                    Error::invalid_input().with_reason(reason)
                )))
            }
        }
    }
}

/// Turns the outcome of a call into the result recorded in the conversation.
pub(crate) fn call_result(
    req: &ToolCallRequest,
    outcome: ToolResult,
) -> ToolCallResult {
    let (content, is_error) = match outcome {
        Ok(output) => (output, false),
        Err(err) => (format!("Error: {err}"), true),
    };
    ToolCallResult {
        id: req.id.clone(),
        name: req.name.clone(),
        content,
        is_error,
    }
}
