//! A scripted fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use mini_cursor_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    id: String,
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    timer: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn new(id: String, preset: PresetResponse, delay: Duration) -> Self {
        let has_tool_call = preset
            .events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)));
        let mut events: VecDeque<_> = preset
            .events
            .into_iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg)
                }
                PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
            })
            .collect();
        events.push_back(ModelResponseEvent::Completed(if has_tool_call {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        }));
        Self {
            id,
            events,
            delay,
            timer: None,
        }
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        loop {
            if let Some(timer) = &mut this.timer {
                ready!(timer.as_mut().poll(cx));
                this.timer = None;
                return Poll::Ready(Ok(this.events.pop_front()));
            }
            if this.events.is_empty() {
                return Poll::Ready(Ok(None));
            }
            // Every event is delayed, so the response behaves like a stream.
            this.timer = Some(Box::pin(sleep(this.delay)));
        }
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        Some(OpaqueMessage::new(self.id.clone(), self.id.clone()))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    failed_attempts: u64,
    served: u64,
    requests: Vec<ModelRequest>,
}

impl Script {
    fn next_response(&mut self) -> Result<(u64, PresetResponse), Error> {
        let Some(front) = self.responses.front() else {
            return Err(Error {
                message: "the script has no more responses",
                kind: ErrorKind::Other,
            });
        };
        let failing = match front.failures {
            Some(0) => true,
            Some(n) => self.failed_attempts < n,
            None => false,
        };
        if failing {
            self.failed_attempts += 1;
            return Err(Error {
                message: "scripted failure",
                kind: ErrorKind::Other,
            });
        }

        self.failed_attempts = 0;
        self.served += 1;
        let preset = self.responses.pop_front().unwrap_or_default();
        Ok((self.served, preset))
    }
}

/// A local fake model for testing purpose.
///
/// Responses are served in the order they were pushed, one per request,
/// regardless of what the request contains. Every request is recorded so
/// tests can inspect exactly what the agent sent. When the script runs out,
/// requests fail.
///
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn push_response(&self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    /// Sets the delay before each streamed event, 1ms by default.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of responses not served yet.
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.lock();
        script.requests.push(req.clone());
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let result = script.next_response().map(|(served, preset)| {
            TestModelResponse::new(format!("msg:{served}"), preset, delay)
        });
        ready(result)
    }
}
