use std::fs;
use std::io;
use std::path::Path;

use mini_cursor_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

/// Input of [`WriteFileTool`].
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileParameters {
    #[schemars(description = "Path of the file (example: calculator/index.html)")]
    file_path: String,
    #[schemars(description = "Full content of the file")]
    content: String,
}

/// A tool for creating or replacing a file.
///
/// Missing parent directories are created. The file is overwritten with the
/// given content as is.
pub struct WriteFileTool {
    parameter_schema: Value,
}

impl WriteFileTool {
    /// Creates a new write file tool.
    #[inline]
    pub fn new() -> Self {
        WriteFileTool {
            parameter_schema: schema_for!(WriteFileParameters).to_value(),
        }
    }
}

impl Default for WriteFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WriteFileTool {
    type Input = WriteFileParameters;

    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        "Creates or updates a file, creating missing folders on the way. \
        Always send the full content of the file."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WriteFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            let WriteFileParameters { file_path, content } = input;
            let written = spawn_blocking({
                let file_path = file_path.clone();
                move || write_file(Path::new(&file_path), &content)
            })
            .await
            .map_err(io::Error::other)
            .and_then(|res| res);

            match written {
                Ok(()) => {
                    info!("wrote {file_path}");
                    Ok(format!("File written successfully: {file_path}"))
                }
                Err(err) => Err(ToolError::execution_error()
                    .with_reason(format!("cannot write {file_path}: {err}"))),
            }
        }
    }
}

fn write_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn params(path: &Path, content: &str) -> WriteFileParameters {
        WriteFileParameters {
            file_path: path.display().to_string(),
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_schema() {
        let tool = WriteFileTool::new();
        let schema = tool.parameter_schema();
        assert!(schema["properties"]["filePath"].is_object());
        assert!(schema["properties"]["content"].is_object());
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&Value::from("filePath")));
        assert!(required.contains(&Value::from("content")));
    }

    #[tokio::test]
    async fn test_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calculator/assets/index.html");

        let result = WriteFileTool::new()
            .execute(params(&path, "<html></html>"))
            .await
            .unwrap();

        assert_eq!(
            result,
            format!("File written successfully: {}", path.display())
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html></html>");
    }

    #[tokio::test]
    async fn test_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("style.css");
        let tool = WriteFileTool::new();

        tool.execute(params(&path, "body { color: red; }\n"))
            .await
            .unwrap();
        tool.execute(params(&path, "p {}")).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "p {}");
    }

    #[tokio::test]
    async fn test_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a folder").unwrap();
        let path = blocker.join("index.html");

        let err = WriteFileTool::new()
            .execute(params(&path, "x"))
            .await
            .unwrap_err();

        let expected = format!("cannot write {}: ", path.display());
        assert!(err.to_string().starts_with(&expected), "{err}");
    }
}
