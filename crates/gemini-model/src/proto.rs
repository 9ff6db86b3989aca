use mini_cursor_model::{ModelMessage, ModelRequest, ModelTool};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ------------------------------------
// Types shared by requests and replies
// ------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    #[inline]
    fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_thought(&self) -> bool {
        self.thought == Some(true)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub response_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

// -----------
// Conversions
// -----------

const ROLE_USER: &str = "user";
const ROLE_MODEL: &str = "model";

/// JSON schema keywords outside the OpenAPI subset Gemini accepts.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "$defs",
    "definitions",
    "title",
    "additionalProperties",
];

pub fn create_request(req: &ModelRequest) -> GenerateContentRequest {
    let mut system_texts = vec![];
    let mut contents: Vec<Content> = vec![];

    for msg in &req.messages {
        let (role, parts) = match msg {
            ModelMessage::System(text) => {
                system_texts.push(text.as_str());
                continue;
            }
            ModelMessage::User(text) => (ROLE_USER, vec![Part::text(text)]),
            ModelMessage::Assistant(text) => {
                (ROLE_MODEL, vec![Part::text(text)])
            }
            ModelMessage::ToolCall(call) => (
                ROLE_MODEL,
                vec![Part {
                    function_call: Some(FunctionCall {
                        id: None,
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Default::default()
                }],
            ),
            ModelMessage::Tool(result) => {
                let key = if result.is_error { "error" } else { "result" };
                let response = Map::from_iter([(
                    key.to_owned(),
                    Value::String(result.content.clone()),
                )]);
                (
                    ROLE_USER,
                    vec![Part {
                        function_response: Some(FunctionResponse {
                            name: result.name.clone(),
                            response: Value::Object(response),
                        }),
                        ..Default::default()
                    }],
                )
            }
            ModelMessage::Opaque(opaque) => {
                // Opaque messages from this provider always hold a `Content`.
                let Some(content) = opaque.to_raw::<Content>() else {
                    warn!("dropping a foreign opaque message: {opaque:?}");
                    continue;
                };
                (ROLE_MODEL, content.parts.clone())
            }
        };
        append_parts(&mut contents, role, parts);
    }

    let system_instruction = (!system_texts.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::text(system_texts.join("\n\n"))],
    });
    let tools = if req.tools.is_empty() {
        vec![]
    } else {
        vec![Tool {
            function_declarations: req
                .tools
                .iter()
                .map(create_declaration)
                .collect(),
        }]
    };

    GenerateContentRequest {
        contents,
        system_instruction,
        tools,
    }
}

/// Gemini expects the turns to alternate, so consecutive messages of one
/// role (e.g. several function responses) are folded into one content.
fn append_parts(contents: &mut Vec<Content>, role: &str, parts: Vec<Part>) {
    if let Some(last) = contents.last_mut() {
        if last.role.as_deref() == Some(role) {
            last.parts.extend(parts);
            return;
        }
    }
    contents.push(Content {
        role: Some(role.to_owned()),
        parts,
    });
}

#[inline]
fn create_declaration(tool: &ModelTool) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.trim().to_owned(),
        parameters: reduce_schema(&tool.parameters),
    }
}

fn reduce_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut reduced = Map::with_capacity(map.len());
            for (key, value) in map {
                if UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let value = match (key.as_str(), value) {
                    // Keys of `properties` are parameter names, not keywords.
                    ("properties", Value::Object(props)) => Value::Object(
                        props
                            .iter()
                            .map(|(name, prop)| {
                                (name.clone(), reduce_schema(prop))
                            })
                            .collect(),
                    ),
                    _ => reduce_schema(value),
                };
                reduced.insert(key.clone(), value);
            }
            Value::Object(reduced)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(reduce_schema).collect())
        }
        other => other.clone(),
    }
}
