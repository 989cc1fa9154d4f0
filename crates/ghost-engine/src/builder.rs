use ghost_contracts::{
    ContentItem, ImageInput, MediaPart, ReasoningDetail, ReasoningRequest, ToolRegistry,
};

pub const AUDIT_INSTRUCTION: &str =
    "Check this image against the provided service manual specifications.";
pub const AUDITOR_SYSTEM_INSTRUCTION: &str =
    "You are a mechanical auditor. Explain your reasoning deeply and use your tools if needed.";

/// Assembles one audit request.
///
/// Contents are always `[instruction, image, document]`; reasoning detail is
/// pinned to the highest level.
pub fn build(
    instruction: &str,
    image: ImageInput,
    doc: MediaPart,
    tools: ToolRegistry,
) -> ReasoningRequest {
    ReasoningRequest {
        contents: vec![
            ContentItem::Text(instruction.to_string()),
            ContentItem::Image(image),
            ContentItem::Media(doc),
        ],
        system_instruction: AUDITOR_SYSTEM_INSTRUCTION.to_string(),
        reasoning_detail: ReasoningDetail::HIGHEST,
        tools,
    }
}
