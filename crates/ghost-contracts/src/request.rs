use crate::media::{ImageInput, MediaPart};
use crate::tools::ToolRegistry;

/// One entry of the request's ordered content list.
#[derive(Debug, Clone)]
pub enum ContentItem {
    Text(String),
    Image(ImageInput),
    Media(MediaPart),
}

/// How much internal reasoning the remote model is asked to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReasoningDetail {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningDetail {
    pub const HIGHEST: ReasoningDetail = ReasoningDetail::High;

    pub fn as_wire(self) -> &'static str {
        match self {
            ReasoningDetail::Minimal => "MINIMAL",
            ReasoningDetail::Low => "LOW",
            ReasoningDetail::Medium => "MEDIUM",
            ReasoningDetail::High => "HIGH",
        }
    }
}

/// A single audit's model request. Built fresh per audit.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub contents: Vec<ContentItem>,
    pub system_instruction: String,
    pub reasoning_detail: ReasoningDetail,
    pub tools: ToolRegistry,
}
