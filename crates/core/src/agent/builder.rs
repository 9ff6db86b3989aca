use std::sync::Arc;

use mini_cursor_model::{ModelProvider, ToolCallRequest, ToolCallResult};

use super::{Agent, Callbacks, DEFAULT_MAX_TURNS};
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, Registry, Tool, ToolObject};

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tools: Vec<Box<dyn ToolObject>>,
    max_turns: usize,
    callbacks: Callbacks,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            tools: vec![],
            max_turns: DEFAULT_MAX_TURNS,
            callbacks: Callbacks::default(),
        }
    }

    /// Sets the system instruction sent with every request.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    ///
    /// Registering a second tool with the same name replaces the first.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Box::new(AnyTool(tool)));
        self
    }

    /// Limits how many model turns a single run may take. Values below 1
    /// are raised to 1.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Attaches a callback receiving answer text as it streams in.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Attaches a callback invoked right before a tool is executed.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolCallRequest) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_tool_call = Some(Box::new(on_tool_call));
        self
    }

    /// Attaches a callback invoked with every tool result.
    #[inline]
    pub fn on_tool_result(
        mut self,
        on_tool_result: impl Fn(&ToolCallResult) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_tool_result = Some(Box::new(on_tool_result));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        Agent {
            model_client: self.model_client,
            system_prompt: self.system_prompt,
            tools: Registry::with_tools(self.tools),
            max_turns: self.max_turns,
            callbacks: self.callbacks,
        }
    }
}
