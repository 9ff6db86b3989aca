use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll};

use mini_cursor_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ToolCallRequest, ToolCallResult,
};
use serde_json::json;

#[derive(Debug)]
struct FakeError(ErrorKind);

impl Display for FakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fake provider failed: {}", self.0)
    }
}

impl Error for FakeError {}

impl ModelProviderError for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

struct FakeResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl ModelResponse for FakeResponse {
    type Error = FakeError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}

/// Asks for a file write after a user message, and confirms once the tool
/// result comes back.
struct FakeProvider;

impl ModelProvider for FakeProvider {
    type Error = FakeError;
    type Response = FakeResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let events = match req.messages.last() {
            Some(ModelMessage::User(text)) => vec![
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call-1".to_owned(),
                    name: "writeFile".to_owned(),
                    arguments: json!({ "filePath": "notes.txt", "content": text }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ],
            Some(ModelMessage::Tool(result)) => vec![
                ModelResponseEvent::MessageDelta("Saved: ".to_owned()),
                ModelResponseEvent::MessageDelta(result.content.clone()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ],
            _ => return ready(Err(FakeError(ErrorKind::Other))),
        };
        ready(Ok(FakeResponse {
            events: events.into(),
        }))
    }
}

async fn drain(
    mut resp: FakeResponse,
) -> (String, Vec<ToolCallRequest>, Option<ModelFinishReason>) {
    let mut text = String::new();
    let mut calls = vec![];
    let mut finish = None;
    while let Some(event) =
        poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
            .await
            .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::ToolCall(call) => calls.push(call),
            ModelResponseEvent::Completed(reason) => finish = Some(reason),
        }
    }
    (text, calls, finish)
}

#[tokio::test]
async fn test_tool_round_trip() {
    let provider = FakeProvider;
    let mut req = ModelRequest {
        messages: vec![ModelMessage::User("buy milk".to_owned())],
        tools: vec![],
    };

    let resp = provider.send_request(&req).await.unwrap();
    let (text, calls, finish) = drain(resp).await;
    assert!(text.is_empty());
    assert_eq!(finish, Some(ModelFinishReason::ToolCalls));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].arguments["content"], "buy milk");

    req.messages.push(ModelMessage::ToolCall(calls[0].clone()));
    req.messages.push(ModelMessage::Tool(ToolCallResult {
        id: calls[0].id.clone(),
        name: calls[0].name.clone(),
        content: "File written successfully: notes.txt".to_owned(),
        is_error: false,
    }));
    let resp = provider.send_request(&req).await.unwrap();
    let (text, calls, finish) = drain(resp).await;
    assert_eq!(text, "Saved: File written successfully: notes.txt");
    assert!(calls.is_empty());
    assert_eq!(finish, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest {
        messages: vec![],
        tools: vec![],
    };
    let err = FakeProvider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert_eq!(err.to_string(), "fake provider failed: model service error");
}
