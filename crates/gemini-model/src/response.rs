use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

use mini_cursor_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::{Value, json};

use crate::Error;
use crate::io::Sse;
use crate::proto::{Content, GenerateContentResponse, Part};

/// Finish reasons meaning the candidate was withheld by safety filters.
const BLOCKED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
    "IMAGE_SAFETY",
];

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_local_id(prefix: &str) -> String {
    let n = NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{n}")
}

struct PartialState {
    sse: Sse,
    response_id: Option<String>,
    // The model turn as it will be replayed in later requests.
    parts: Vec<Part>,
    pending_events: VecDeque<ModelResponseEvent>,
    has_tool_call: bool,
    finished: bool,
}

impl PartialState {
    fn absorb_chunk(
        &mut self,
        chunk: GenerateContentResponse,
    ) -> Result<(), Error> {
        if self.response_id.is_none() {
            self.response_id = chunk.response_id;
        }
        if let Some(reason) =
            chunk.prompt_feedback.and_then(|feedback| feedback.block_reason)
        {
            return Err(Error::new(
                format!("prompt blocked: {reason}"),
                ErrorKind::Moderated,
            ));
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(());
        };
        if let Some(content) = candidate.content {
            for part in content.parts {
                self.absorb_part(part);
            }
        }

        let Some(finish_reason) = candidate.finish_reason else {
            return Ok(());
        };
        if BLOCKED_FINISH_REASONS.contains(&finish_reason.as_str()) {
            return Err(Error::new(
                format!("response blocked: {finish_reason}"),
                ErrorKind::Moderated,
            ));
        }
        if finish_reason == "MALFORMED_FUNCTION_CALL" {
            // Nothing usable was produced; the caller sees an empty turn.
            warn!("model produced a malformed function call");
        }
        self.finish();
        Ok(())
    }

    fn absorb_part(&mut self, part: Part) {
        if let Some(call) = &part.function_call {
            let arguments = match &call.args {
                Value::Null => json!({}),
                args => args.clone(),
            };
            let request = ToolCallRequest {
                id: call.id.clone().unwrap_or_else(|| next_local_id("call")),
                name: call.name.clone(),
                arguments,
            };
            self.has_tool_call = true;
            self.pending_events
                .push_back(ModelResponseEvent::ToolCall(request));
            self.parts.push(part);
            return;
        }

        let Some(text) = &part.text else {
            self.parts.push(part);
            return;
        };
        if !part.is_thought() && !text.is_empty() {
            self.pending_events
                .push_back(ModelResponseEvent::MessageDelta(text.clone()));
        }

        // Streamed text arrives in many small parts; keep them as one.
        if part.thought_signature.is_none() {
            if let Some(last) = self.parts.last_mut() {
                if last.function_call.is_none()
                    && last.is_thought() == part.is_thought()
                {
                    if let Some(last_text) = &mut last.text {
                        last_text.push_str(text);
                        return;
                    }
                }
            }
        }
        self.parts.push(part);
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.pending_events.push_back(ModelResponseEvent::Completed(
            if self.has_tool_call {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            },
        ));
    }

    fn into_message(self) -> Option<(String, Content)> {
        if self.parts.is_empty() {
            return None;
        }
        let id = self
            .response_id
            .unwrap_or_else(|| next_local_id("response"));
        Some((
            id,
            Content {
                role: Some("model".to_owned()),
                parts: self.parts,
            },
        ))
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct GeminiResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Content)>,
    }
}

impl GeminiResponse {
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            response_id: None,
            parts: vec![],
            pending_events: Default::default(),
            has_tool_call: false,
            finished: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for GeminiResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let result = ready!(next_event_fut.as_mut().poll(cx));
        *this.next_event_fut = None;
        match result {
            Ok((Some(event), partial_state)) => {
                *this.next_event_fut =
                    Some(Box::pin(next_event(partial_state)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, partial_state)) => {
                *this.full_msg = partial_state.into_message();
                Poll::Ready(Ok(None))
            }
            Err(err) => Poll::Ready(Err(err)),
        }
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, content)| OpaqueMessage::new(id, content.clone()))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.finished {
            return Ok((None, partial_state));
        }

        let data = match partial_state.sse.next_event().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                // The stream ended without a finish reason, which some
                // proxies do. Treat it as a normal completion.
                partial_state.finish();
                continue;
            }
            Err(err) => {
                return Err(Error::new(
                    format!("broken event stream: {err:?}"),
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse event: {data}");

        let chunk = serde_json::from_str::<GenerateContentResponse>(&data)
            .map_err(|err| {
                Error::new(format!("invalid chunk: {err}"), ErrorKind::Other)
            })?;
        partial_state.absorb_chunk(chunk)?;
    }
}
