use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation requested by the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// One content part as produced by the remote model, in arrival order.
///
/// `is_thought` is the model's own tag and is never re-derived locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePart {
    Text { text: String, is_thought: bool },
    ToolCall(ToolCallPart),
}

impl ResponsePart {
    pub fn thought(text: impl Into<String>) -> Self {
        ResponsePart::Text {
            text: text.into(),
            is_thought: true,
        }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        ResponsePart::Text {
            text: text.into(),
            is_thought: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub thoughts: Vec<String>,
    pub diagnosis: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallPart>,
}

impl AuditResult {
    pub fn has_answer(&self) -> bool {
        !self.diagnosis.trim().is_empty()
    }
}

/// Splits one response cycle into reasoning and answer.
///
/// Thought texts keep their arrival order; answer texts are concatenated
/// without a separator.
pub fn partition(parts: &[ResponsePart]) -> AuditResult {
    let mut result = AuditResult::default();
    for part in parts {
        match part {
            ResponsePart::Text {
                text,
                is_thought: true,
            } => result.thoughts.push(text.clone()),
            ResponsePart::Text {
                text,
                is_thought: false,
            } => result.diagnosis.push_str(text),
            ResponsePart::ToolCall(call) => result.tool_calls.push(call.clone()),
        }
    }
    result
}
