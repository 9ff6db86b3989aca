use mini_cursor_model::ErrorKind;

use crate::conversation::Conversation;
use crate::model_client::BoxedModelError;

/// Why a run ended without a final answer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model service failed or returned a broken response.
    #[error("{0}")]
    Model(BoxedModelError),
    /// The model returned neither text nor a tool call.
    #[error("the model returned an empty response")]
    EmptyResponse,
    /// The model kept calling tools past the turn limit.
    #[error("no final answer after {0} model turns")]
    TurnLimitExceeded(usize),
    /// The run was cancelled by the caller.
    #[error("the request was cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the model error kind, if the model service failed.
    #[inline]
    pub fn model_error_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Model(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// A failed run, carrying the conversation as it was when the run stopped.
///
/// Nothing that happened before the failure is lost: the caller can keep
/// the conversation and try again.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunError {
    /// What went wrong.
    pub error: Error,
    /// The conversation up to the failure.
    pub conversation: Conversation,
}

impl RunError {
    #[inline]
    pub(crate) fn new(error: Error, conversation: Conversation) -> Self {
        Self {
            error,
            conversation,
        }
    }
}
