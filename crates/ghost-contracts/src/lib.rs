pub mod error;
pub mod events;
pub mod media;
pub mod present;
pub mod request;
pub mod response;
pub mod tools;

pub use error::{AuditError, InputSlot, RemoteError, RemoteErrorKind};
pub use media::{ImageInput, MediaPart, PDF_MEDIA_TYPE};
pub use request::{ContentItem, ReasoningDetail, ReasoningRequest};
pub use response::{partition, AuditResult, ResponsePart, ToolCallPart};
pub use tools::{ToolDefinition, ToolHandler, ToolRegistry};
