use std::pin::Pin;

use mini_cursor_model::{ModelTool, ToolCallRequest};

use crate::tool::{Error, ToolObject, ToolResult};

/// The tools available to the model, in registration order.
pub(crate) struct Registry {
    tools: Vec<Box<dyn ToolObject>>,
}

impl Registry {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut deduped: Vec<Box<dyn ToolObject>> =
            Vec::with_capacity(tools.len());
        for tool in tools {
            if let Some(pos) =
                deduped.iter().position(|t| t.name() == tool.name())
            {
                warn!("tool `{}` registered twice, keeping the last", tool.name());
                deduped.remove(pos);
            }
            deduped.push(tool);
        }
        Self { tools: deduped }
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(|tool| tool.declaration()).collect()
    }

    /// Starts a call. The returned future does not borrow the registry.
    pub fn call(
        &self,
        req: &ToolCallRequest,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == req.name)
        else {
            warn!("tool not found: {}", req.name);
            let err = Error::not_found()
                .with_reason(format!("no tool named `{}`", req.name));
            return Box::pin(std::future::ready(Err(err)));
        };
        trace!("calling {} ({}) with args: {}", req.name, req.id, req.arguments);
        tool.call(req.arguments.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use serde_json::{Value, json};

    use super::*;
    use crate::tool::{AnyTool, ErrorKind, Tool};

    struct UpperTool {
        name: &'static str,
        schema: Value,
    }

    impl UpperTool {
        fn boxed(name: &'static str) -> Box<dyn ToolObject> {
            Box::new(AnyTool(UpperTool {
                name,
                schema: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            }))
        }
    }

    impl Tool for UpperTool {
        type Input = Value;

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Upper-cases text"
        }

        fn parameter_schema(&self) -> &Value {
            &self.schema
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            let text = input["text"].as_str().map(str::to_uppercase);
            ready(text.ok_or_else(|| {
                Error::execution_error().with_reason("`text` is not a string")
            }))
        }
    }

    fn request(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call-1".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_call() {
        let registry = Registry::with_tools(vec![UpperTool::boxed("upper")]);

        let result =
            registry.call(&request("upper", json!({ "text": "hi" }))).await;
        assert_eq!(result.unwrap(), "HI");

        let err = registry
            .call(&request("upper", json!({ "text": 1 })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);

        let err = registry
            .call(&request("lower", json!({ "text": "hi" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "no tool named `lower`");
    }

    #[test]
    fn test_definitions_keep_order_and_dedupe() {
        let registry = Registry::with_tools(vec![
            UpperTool::boxed("b"),
            UpperTool::boxed("a"),
            UpperTool::boxed("b"),
        ]);
        let names: Vec<_> =
            registry.definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
