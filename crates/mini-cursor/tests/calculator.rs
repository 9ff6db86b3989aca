use std::fs;

use mini_cursor::core::conversation::Turn;
use mini_cursor::{Repl, SessionBuilder, ToolKind};
use mini_cursor_model::ToolCallRequest;
use mini_cursor_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_create_a_calculator_app() {
    let dir = TempDir::new().unwrap();
    let file_path = dir.path().join("calculator/index.html");
    let file_path = file_path.to_str().unwrap();

    let provider = TestModelProvider::default();
    provider.push_response(PresetResponse::tool_calls([ToolCallRequest {
        id: "call-1".to_owned(),
        name: "writeFile".to_owned(),
        arguments: json!({
            "filePath": file_path,
            "content": "<html><body>calculator</body></html>",
        }),
    }]));
    provider.push_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Your calculator ".to_owned()),
        PresetEvent::MessageDelta("is ready.".to_owned()),
    ]));

    let mut output = Vec::new();
    let turns: Vec<Turn> = {
        let builder = SessionBuilder::with_model_provider(provider.clone())
            .with_tool_kind(ToolKind::WriteFile);
        let input = "create a calculator app\nexit\n".as_bytes();
        let mut repl = Repl::new(builder, input, &mut output);
        repl.run().await.unwrap();
        repl.session().conversation().turns().cloned().collect()
    };
    let output = String::from_utf8(output).unwrap();

    assert_eq!(
        fs::read_to_string(file_path).unwrap(),
        "<html><body>calculator</body></html>"
    );
    assert!(output.contains("writeFile"));
    assert!(output.contains("Your calculator is ready."));

    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0], Turn::User("create a calculator app".to_owned()));
    let Turn::ToolResult(result) = &turns[2] else {
        panic!("expected a tool result, got {:?}", turns[2]);
    };
    assert_eq!(result.id, "call-1");
    assert_eq!(
        result.content,
        format!("File written successfully: {file_path}")
    );
    assert!(!result.is_error);
    assert_eq!(turns[3], Turn::ModelText("Your calculator is ready.".to_owned()));

    // `exit` ends the shell without another model call.
    assert_eq!(provider.requests().len(), 2);
    assert_eq!(provider.remaining(), 0);
}
