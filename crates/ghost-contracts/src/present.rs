use serde::Serialize;
use serde_json::Value;

use crate::response::AuditResult;

pub const NO_ANSWER_NOTICE: &str =
    "Audit complete, no direct answer produced. See the reasoning transcript for details.";
pub const NO_REASONING_NOTICE: &str = "No internal reasoning was exposed.";

/// The two display regions, one string each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub reasoning: String,
    pub diagnosis: String,
}

/// Pure render of one audit. Never yields an empty diagnosis region.
pub fn render(result: &AuditResult) -> Presentation {
    let mut reasoning = if result.thoughts.is_empty() {
        NO_REASONING_NOTICE.to_string()
    } else {
        result.thoughts.join("\n")
    };
    if !result.tool_calls.is_empty() {
        reasoning.push_str("\n\nTool calls:");
        for call in &result.tool_calls {
            let args = serde_json::to_string(&Value::Object(call.arguments.clone()))
                .unwrap_or_else(|_| "{}".to_string());
            reasoning.push_str(&format!("\n- {}({args})", call.tool_name));
        }
    }

    let diagnosis = if result.has_answer() {
        result.diagnosis.clone()
    } else {
        NO_ANSWER_NOTICE.to_string()
    };

    Presentation {
        reasoning,
        diagnosis,
    }
}
