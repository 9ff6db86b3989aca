use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use mini_cursor_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, ToolCallRequest,
};
use tracing::Instrument;

pub type BoxedModelError = Box<dyn ModelProviderError>;
type Transcriber = Box<dyn Fn(&str) + Send + 'static>;
type ReplyFuture =
    Pin<Box<dyn Future<Output = Result<ModelReply, BoxedModelError>> + Send>>;
type SendFn = Arc<dyn Fn(ModelRequest, Transcriber) -> ReplyFuture + Send + Sync>;

/// A type-erased handle to a model provider.
///
/// Every request goes through the same path: the streamed events are
/// drained into a [`ModelReply`], and text deltas are forwarded to the
/// caller as they arrive.
#[derive(Clone)]
pub struct ModelClient {
    send_fn: SendFn,
}

impl ModelClient {
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let send_fn: SendFn = Arc::new(
            move |req: ModelRequest, on_delta: Transcriber| -> ReplyFuture {
                let span = debug_span!(
                    "model request",
                    messages = req.messages.len(),
                    tools = req.tools.len()
                );
                let fut = provider.send_request(&req);
                Box::pin(
                    async move { drain_response::<P>(fut.await, on_delta).await }
                        .instrument(span),
                )
            },
        );
        Self { send_fn }
    }

    /// Sends a request and waits for the whole reply.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future drops the underlying
    /// response, which stops the stream.
    #[inline]
    pub async fn send(
        &self,
        req: ModelRequest,
        on_delta: impl Fn(&str) + Send + 'static,
    ) -> Result<ModelReply, BoxedModelError> {
        (self.send_fn)(req, Box::new(on_delta)).await
    }
}

/// A completely received model turn.
#[derive(Clone, Debug, Default)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub opaque_msg: Option<OpaqueMessage>,
    pub finish_reason: Option<ModelFinishReason>,
}

async fn drain_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: Transcriber,
) -> Result<ModelReply, BoxedModelError> {
    let resp = resp_or_err.map_err(|err| {
        warn!("request failed: {err}");
        Box::new(err) as BoxedModelError
    })?;

    let mut resp = pin!(resp);
    let mut reply = ModelReply::default();
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .map_err(|err| {
            warn!("response failed: {err}");
            Box::new(err) as BoxedModelError
        })?
    {
        trace!("got an event: {event:?}");
        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                on_delta(&delta);
                reply.text.push_str(&delta);
            }
            ModelResponseEvent::ToolCall(req) => reply.tool_calls.push(req),
            ModelResponseEvent::Completed(reason) => {
                reply.finish_reason = Some(reason);
            }
        }
    }
    reply.opaque_msg = resp.make_opaque_message();

    debug!(
        text_len = reply.text.len(),
        tool_calls = reply.tool_calls.len(),
        finish_reason = ?reply.finish_reason,
        "received a reply"
    );
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mini_cursor_model::{ErrorKind, ModelMessage};
    use mini_cursor_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };
    use serde_json::json;

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_send() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("How ".to_owned()),
            PresetEvent::MessageDelta("are you?".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call-1".to_owned(),
                name: "executeCommand".to_owned(),
                arguments: json!({ "command": "ls" }),
            }),
        ]));
        let client = ModelClient::new(provider);

        let deltas = Arc::new(Mutex::new(Vec::new()));
        let reply = client
            .send(request(), {
                let deltas = Arc::clone(&deltas);
                move |delta| deltas.lock().unwrap().push(delta.to_owned())
            })
            .await
            .unwrap();

        assert_eq!(reply.text, "How are you?");
        assert_eq!(*deltas.lock().unwrap(), ["How ", "are you?"]);
        assert_eq!(reply.tool_calls[0].name, "executeCommand");
        assert_eq!(reply.finish_reason, Some(ModelFinishReason::ToolCalls));
        assert_eq!(reply.opaque_msg.unwrap().id(), "msg:1");
    }

    #[tokio::test]
    async fn test_error_handling() {
        let client = ModelClient::new(TestModelProvider::default());
        let err = client.send(request(), |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
