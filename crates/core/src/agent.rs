mod builder;
mod error;

use std::iter;
use std::sync::Arc;

use mini_cursor_model::{
    ModelMessage, ModelRequest, ModelTool, ToolCallRequest, ToolCallResult,
};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub use builder::AgentBuilder;
pub use error::{Error, RunError};

use crate::conversation::{Conversation, Turn};
use crate::model_client::{ModelClient, ModelReply};
use crate::tool::{self, Registry};

/// The number of model turns a run may take unless configured otherwise.
pub const DEFAULT_MAX_TURNS: usize = 50;

#[derive(Default)]
struct Callbacks {
    on_transcript: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_tool_call: Option<Box<dyn Fn(&ToolCallRequest) + Send + Sync>>,
    on_tool_result: Option<Box<dyn Fn(&ToolCallResult) + Send + Sync>>,
}

/// The final answer of a run, along with the updated conversation.
#[derive(Clone, Debug)]
pub struct RunOutput {
    /// The text the model answered with.
    pub reply: String,
    /// The conversation including the answer.
    pub conversation: Conversation,
}

/// Drives a conversation with the model until it gives a text answer.
///
/// An agent holds no conversation state of its own. Each run takes the
/// conversation by value and hands it back, either in [`RunOutput`] or in
/// [`RunError`], so one agent can serve any number of independent
/// conversations.
///
/// Within a run, every tool call the model requests is executed in order
/// and answered with exactly one result before the model is asked again.
pub struct Agent {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tools: Registry,
    max_turns: usize,
    callbacks: Callbacks,
}

impl Agent {
    /// Returns the declarations of the registered tools.
    #[inline]
    pub fn tools(&self) -> Vec<ModelTool> {
        self.tools.definitions()
    }

    /// Appends `input` as a user turn and runs the conversation.
    pub async fn ask<S: Into<String>>(
        &self,
        mut conversation: Conversation,
        input: S,
        cancel: &CancellationToken,
    ) -> Result<RunOutput, RunError> {
        conversation.push_user(input);
        self.run(conversation, cancel).await
    }

    /// Runs the conversation until the model answers with text.
    ///
    /// # Cancel safety
    ///
    /// Cancel through `cancel` rather than by dropping the future: only then
    /// is the conversation handed back with every pending tool call
    /// answered.
    pub async fn run(
        &self,
        mut conversation: Conversation,
        cancel: &CancellationToken,
    ) -> Result<RunOutput, RunError> {
        for turn in 1..=self.max_turns {
            let request = self.make_request(&conversation);
            debug!("model turn {turn}, {} messages", request.messages.len());

            let reply = select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancelled while waiting for the model");
                    return Err(RunError::new(Error::Cancelled, conversation));
                }
                reply = self.model_client.send(request, self.transcript_sink()) => reply,
            };
            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    return Err(RunError::new(Error::Model(err), conversation));
                }
            };

            if reply.tool_calls.is_empty() {
                if reply.text.is_empty() {
                    warn!("the model returned neither text nor a tool call");
                    return Err(RunError::new(
                        Error::EmptyResponse,
                        conversation,
                    ));
                }
                conversation
                    .push(Turn::ModelText(reply.text.clone()), reply.opaque_msg);
                return Ok(RunOutput {
                    reply: reply.text,
                    conversation,
                });
            }

            if let Err(err) =
                self.run_tool_calls(&mut conversation, reply, cancel).await
            {
                return Err(RunError::new(err, conversation));
            }
        }

        warn!("gave up after {} model turns", self.max_turns);
        Err(RunError::new(
            Error::TurnLimitExceeded(self.max_turns),
            conversation,
        ))
    }

    fn make_request(&self, conversation: &Conversation) -> ModelRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ModelMessage::System(prompt.clone()));
        }
        messages.extend(conversation.to_model_messages());
        ModelRequest {
            messages,
            tools: self.tools.definitions(),
        }
    }

    fn transcript_sink(&self) -> impl Fn(&str) + Send + 'static {
        let on_transcript = self.callbacks.on_transcript.clone();
        move |delta| {
            if let Some(on_transcript) = &on_transcript {
                on_transcript(delta);
            }
        }
    }

    async fn run_tool_calls(
        &self,
        conversation: &mut Conversation,
        reply: ModelReply,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let ModelReply {
            tool_calls,
            opaque_msg,
            ..
        } = reply;
        for req in &tool_calls {
            conversation.push(Turn::ModelToolCall(req.clone()), opaque_msg.clone());
        }

        let mut pending = tool_calls.into_iter();
        while let Some(req) = pending.next() {
            if let Some(on_tool_call) = &self.callbacks.on_tool_call {
                on_tool_call(&req);
            }

            let span = info_span!("tool call", name = %req.name, id = %req.id);
            let outcome = select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.tools.call(&req).instrument(span) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                info!("cancelled while running `{}`", req.name);
                for req in iter::once(req).chain(pending) {
                    let result =
                        tool::call_result(&req, Err(tool::Error::cancelled()));
                    conversation.push(Turn::ToolResult(result), None);
                }
                return Err(Error::Cancelled);
            };

            if let Err(err) = &outcome {
                debug!("`{}` failed: {err}", req.name);
            }
            let result = tool::call_result(&req, outcome);
            if let Some(on_tool_result) = &self.callbacks.on_tool_result {
                on_tool_result(&result);
            }
            conversation.push(Turn::ToolResult(result), None);
        }
        Ok(())
    }
}
