use std::fmt;

use thiserror::Error;

/// Which of the two uploads an input error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    Image,
    Document,
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSlot::Image => f.write_str("component image"),
            InputSlot::Document => f.write_str("service manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Timeouts, dropped connections, rate limits and 5xx replies.
    Transient,
    /// Credentials, malformed requests and unusable replies.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Transient,
            status: None,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Fatal,
            status: None,
            message: message.into(),
        }
    }

    /// Classifies an unsuccessful HTTP reply.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            408 | 429 | 500 | 502 | 503 | 504 => RemoteErrorKind::Transient,
            _ => RemoteErrorKind::Fatal,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == RemoteErrorKind::Transient
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("missing input: {slot} was not provided or is empty")]
    MissingInput { slot: InputSlot },
    #[error("image decode failed: {reason}")]
    Decode { reason: String },
    #[error("model requested unknown tool '{name}'")]
    UnknownTool { name: String },
    #[error("tool-call loop exceeded {max_rounds} rounds")]
    ToolLoop { max_rounds: usize },
    #[error("tool '{name}' is already registered")]
    DuplicateTool { name: String },
    #[error("an audit is already in flight")]
    Busy,
    #[error("remote model call failed: {0}")]
    Remote(#[from] RemoteError),
}

impl AuditError {
    /// True only for transient remote failures. Retrying is left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuditError::Remote(err) if err.is_transient())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::MissingInput { .. } => "missing_input",
            AuditError::Decode { .. } => "decode",
            AuditError::UnknownTool { .. } => "unknown_tool",
            AuditError::ToolLoop { .. } => "tool_loop",
            AuditError::DuplicateTool { .. } => "duplicate_tool",
            AuditError::Busy => "busy",
            AuditError::Remote(err) if err.is_transient() => "remote_transient",
            AuditError::Remote(_) => "remote_fatal",
        }
    }

    /// One operator-facing sentence per failure kind.
    pub fn user_message(&self) -> String {
        match self {
            AuditError::MissingInput { .. } => {
                "Please provide both a component image and a PDF service manual.".to_string()
            }
            AuditError::Decode { .. } => {
                "The component image could not be read. Upload a JPEG or PNG photo.".to_string()
            }
            AuditError::UnknownTool { name } => {
                format!("The model asked for an action that is not available ({name}).")
            }
            AuditError::ToolLoop { max_rounds } => format!(
                "The model kept requesting actions after {max_rounds} rounds; the audit was stopped."
            ),
            AuditError::DuplicateTool { name } => {
                format!("The action '{name}' was registered twice.")
            }
            AuditError::Busy => "An audit is already running. Wait for it to finish.".to_string(),
            AuditError::Remote(err) if err.is_transient() => {
                "The reasoning service is temporarily unreachable. Try the audit again.".to_string()
            }
            AuditError::Remote(_) => {
                "The reasoning service rejected the audit request.".to_string()
            }
        }
    }
}
