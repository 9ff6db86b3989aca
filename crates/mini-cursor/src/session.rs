use std::fmt::{self, Display};
use std::mem;
use std::str::FromStr;

use mini_cursor_core::conversation::Conversation;
use mini_cursor_core::{Agent, AgentBuilder, Error, RunError, RunOutput};
use mini_cursor_model::{ModelProvider, ToolCallRequest, ToolCallResult};
use tokio_util::sync::CancellationToken;

use crate::tools::*;

/// Which built-in tool a session offers to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToolKind {
    /// [`WriteFileTool`], with the website builder instructions.
    #[default]
    WriteFile,
    /// [`ShellTool`], with the command runner instructions.
    Shell,
}

impl ToolKind {
    /// Returns the system prompt for this kind of session.
    pub fn system_prompt(self) -> String {
        match self {
            ToolKind::WriteFile => {
                include_str!("./prompts/website_builder.md").to_owned()
            }
            ToolKind::Shell => include_str!("./prompts/command_runner.md")
                .replace("{{HOST_OS}}", host_os()),
        }
    }
}

impl Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::WriteFile => f.write_str("write_file"),
            ToolKind::Shell => f.write_str("shell"),
        }
    }
}

impl FromStr for ToolKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "write_file" | "writefile" => Ok(ToolKind::WriteFile),
            "shell" | "executecommand" => Ok(ToolKind::Shell),
            _ => Err(()),
        }
    }
}

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    tool_kind: ToolKind,
    stderr_policy: StderrPolicy,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        Self {
            agent_builder: AgentBuilder::with_model_provider(provider),
            tool_kind: ToolKind::default(),
            stderr_policy: StderrPolicy::default(),
        }
    }

    /// Selects the tool offered to the model.
    #[inline]
    pub fn with_tool_kind(mut self, tool_kind: ToolKind) -> Self {
        self.tool_kind = tool_kind;
        self
    }

    /// Sets how the shell tool treats stderr output.
    #[inline]
    pub fn with_stderr_policy(mut self, stderr_policy: StderrPolicy) -> Self {
        self.stderr_policy = stderr_policy;
        self
    }

    /// Limits how many model turns a single message may take.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_turns(max_turns);
        self
    }

    /// Attaches a callback to be invoked when answer text streams in.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Attaches a callback to be invoked before a tool runs.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolCallRequest) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_tool_call(on_tool_call);
        self
    }

    /// Attaches a callback to be invoked after a tool ran.
    #[inline]
    pub fn on_tool_result(
        mut self,
        on_tool_result: impl Fn(&ToolCallResult) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_tool_result(on_tool_result);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let agent_builder = self
            .agent_builder
            .with_system_prompt(self.tool_kind.system_prompt());
        let agent = match self.tool_kind {
            ToolKind::WriteFile => agent_builder.with_tool(WriteFileTool::new()),
            ToolKind::Shell => {
                agent_builder.with_tool(ShellTool::new(self.stderr_policy))
            }
        }
        .build();
        info!("session ready with the {} tool", self.tool_kind);

        Session {
            agent,
            tool_kind: self.tool_kind,
            conversation: Conversation::new(),
        }
    }
}

/// A chat session, like a window that displays messages and has an input
/// box.
///
/// The session owns the conversation of the process. Every message is
/// answered with the whole conversation so far as context, and whatever
/// happened while answering is kept, including failed attempts.
pub struct Session {
    agent: Agent,
    tool_kind: ToolKind,
    conversation: Conversation,
}

impl Session {
    /// Sends a message and waits for the final answer.
    ///
    /// # Cancel safety
    ///
    /// Use `cancel` to abort. Dropping the future loses the turns of this
    /// message.
    pub async fn send_message(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let conversation = mem::take(&mut self.conversation);
        match self.agent.ask(conversation, message, cancel).await {
            Ok(RunOutput {
                reply,
                conversation,
            }) => {
                self.conversation = conversation;
                Ok(reply)
            }
            Err(RunError {
                error,
                conversation,
            }) => {
                self.conversation = conversation;
                Err(error)
            }
        }
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the tool this session offers.
    #[inline]
    pub fn tool_kind(&self) -> ToolKind {
        self.tool_kind
    }
}

#[inline]
fn host_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "some other OS",
    }
}
