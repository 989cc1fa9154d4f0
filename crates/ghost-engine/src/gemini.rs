//! Gemini `generateContent` wire format and blocking HTTP transport.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ghost_contracts::{
    ContentItem, MediaPart, ReasoningRequest, RemoteError, ResponsePart, ToolCallPart,
};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use crate::client::ModelEndpoint;
use crate::config::{ApiKey, AuditConfig};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiEndpoint {
    api_base: String,
    api_key: ApiKey,
    http: HttpClient,
}

impl GeminiEndpoint {
    pub fn new(api_base: &str, api_key: ApiKey, timeout: Duration) -> Result<Self, RemoteError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::fatal(format!("HTTP client setup failed: {err}")))?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    pub fn from_config(config: &AuditConfig, api_key: ApiKey) -> Result<Self, RemoteError> {
        Self::new(&config.api_base, api_key, config.request_timeout)
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ModelEndpoint for GeminiEndpoint {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, model: &str, payload: &Value) -> Result<Value, RemoteError> {
        let endpoint = self.endpoint_for_model(model);
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(payload)
            .send()
            .map_err(|err| classify_transport_error(&err, &endpoint))?;
        response_json_or_error(response)
    }
}

fn classify_transport_error(err: &reqwest::Error, endpoint: &str) -> RemoteError {
    let message = format!("Gemini request failed ({endpoint}): {err}");
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RemoteError::transient(message)
    } else {
        RemoteError::fatal(message)
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, RemoteError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| RemoteError::transient(format!("Gemini response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(RemoteError::from_status(
            code,
            format!(
                "Gemini request failed ({code}): {}",
                truncate_text(&body, 512)
            ),
        ));
    }
    serde_json::from_str(&body)
        .map_err(|err| RemoteError::fatal(format!("Gemini returned invalid JSON payload: {err}")))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Encodes a request as a complete `generateContent` body.
pub fn encode_request(request: &ReasoningRequest) -> Value {
    let parts = request
        .contents
        .iter()
        .map(encode_content_item)
        .collect::<Vec<Value>>();

    let mut payload = Map::new();
    payload.insert(
        "contents".to_string(),
        json!([{ "role": "user", "parts": parts }]),
    );
    if !request.system_instruction.trim().is_empty() {
        payload.insert(
            "systemInstruction".to_string(),
            json!({ "parts": [{ "text": request.system_instruction }] }),
        );
    }
    payload.insert(
        "generationConfig".to_string(),
        json!({
            "thinkingConfig": {
                "includeThoughts": true,
                "thinkingLevel": request.reasoning_detail.as_wire(),
            }
        }),
    );
    if !request.tools.is_empty() {
        payload.insert(
            "tools".to_string(),
            json!([{ "functionDeclarations": request.tools.declarations() }]),
        );
    }
    Value::Object(payload)
}

fn encode_content_item(item: &ContentItem) -> Value {
    match item {
        ContentItem::Text(text) => json!({ "text": text }),
        ContentItem::Image(image) => inline_data_part(&image.mime_type, &image.encoded),
        ContentItem::Media(MediaPart { media_type, bytes }) => inline_data_part(media_type, bytes),
    }
}

fn inline_data_part(mime_type: &str, bytes: &[u8]) -> Value {
    json!({
        "inlineData": {
            "mimeType": mime_type,
            "data": BASE64.encode(bytes),
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Present only when the model assigned one; echoed back on the response.
    pub id: Option<String>,
    pub call: ToolCallPart,
}

/// One decoded model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub parts: Vec<ResponsePart>,
    pub function_calls: Vec<FunctionCall>,
    /// The candidate content exactly as received, thought signatures included.
    pub content: Value,
}

/// Decodes the first candidate of a `generateContent` reply.
pub fn decode_response(payload: &Value) -> Result<ModelTurn, RemoteError> {
    let Some(candidate) = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
    else {
        let reason = payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("none given");
        return Err(RemoteError::fatal(format!(
            "Gemini returned no candidates (block reason: {reason})"
        )));
    };

    let content = candidate.get("content").cloned().unwrap_or(Value::Null);
    let raw_parts = content
        .get("parts")
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| {
            let finish = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            RemoteError::fatal(format!(
                "Gemini returned an empty candidate (finish reason: {finish})"
            ))
        })?;

    let mut parts = Vec::new();
    let mut function_calls = Vec::new();
    for raw in raw_parts {
        if let Some(function_call) = raw.get("functionCall") {
            let call = decode_function_call(function_call)?;
            parts.push(ResponsePart::ToolCall(call.call.clone()));
            function_calls.push(call);
        } else if let Some(text) = raw.get("text").and_then(Value::as_str) {
            parts.push(ResponsePart::Text {
                text: text.to_string(),
                is_thought: raw.get("thought").and_then(Value::as_bool).unwrap_or(false),
            });
        }
    }

    let mut content = content;
    if content.get("role").is_none() {
        content["role"] = Value::String("model".to_string());
    }

    Ok(ModelTurn {
        parts,
        function_calls,
        content,
    })
}

fn decode_function_call(raw: &Value) -> Result<FunctionCall, RemoteError> {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| RemoteError::fatal("Gemini function call is missing a name"))?;
    let arguments = match raw.get("args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(other) => {
            return Err(RemoteError::fatal(format!(
                "Gemini function call '{name}' has non-object args: {other}"
            )))
        }
    };
    Ok(FunctionCall {
        id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        call: ToolCallPart {
            tool_name: name.to_string(),
            arguments,
        },
    })
}

/// The `user` entry carrying one `functionResponse` per executed call.
pub fn function_response_content(results: &[(FunctionCall, Value)]) -> Value {
    let parts = results
        .iter()
        .map(|(call, result)| {
            let response = match result {
                Value::Object(_) => result.clone(),
                other => json!({ "result": other }),
            };
            let mut function_response = Map::new();
            if let Some(id) = &call.id {
                function_response.insert("id".to_string(), Value::String(id.clone()));
            }
            function_response.insert(
                "name".to_string(),
                Value::String(call.call.tool_name.clone()),
            );
            function_response.insert("response".to_string(), response);
            json!({ "functionResponse": function_response })
        })
        .collect::<Vec<Value>>();
    json!({ "role": "user", "parts": parts })
}
