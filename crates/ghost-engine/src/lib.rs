use std::sync::atomic::{AtomicBool, Ordering};

use ghost_contracts::events::EventWriter;
use ghost_contracts::{partition, AuditError, AuditResult, ImageInput, MediaPart, ToolRegistry};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::client::emit;

pub mod builder;
pub mod client;
pub mod config;
pub mod gemini;
pub mod input;
pub mod ticket;

pub use builder::{build, AUDITOR_SYSTEM_INSTRUCTION, AUDIT_INSTRUCTION};
pub use client::{ModelEndpoint, ReasoningClient};
pub use config::{ApiKey, AuditConfig};
pub use gemini::GeminiEndpoint;
pub use input::assemble;
pub use ticket::{default_tool_registry, maintenance_ticket_tool, MaintenanceTicket};

/// The whole pipeline for one audit: assemble, build, submit, partition.
///
/// Input errors return before the endpoint is contacted.
pub fn run_audit(
    client: &ReasoningClient,
    tools: &ToolRegistry,
    image_bytes: Option<&[u8]>,
    document_bytes: Option<&[u8]>,
) -> Result<AuditResult, AuditError> {
    run_pipeline(client, tools, image_bytes, document_bytes, None)
}

fn run_pipeline(
    client: &ReasoningClient,
    tools: &ToolRegistry,
    image_bytes: Option<&[u8]>,
    document_bytes: Option<&[u8]>,
    events: Option<&EventWriter>,
) -> Result<AuditResult, AuditError> {
    emit(
        events,
        "audit_started",
        json!({
            "model": client.model(),
            "endpoint": client.endpoint_name(),
            "max_tool_rounds": client.max_tool_rounds(),
            "tools": tools.names(),
        }),
    );
    let (image, document) = assemble(image_bytes, document_bytes)?;
    emit(events, "inputs_assembled", inputs_payload(&image, &document));
    let request = build(AUDIT_INSTRUCTION, image, document, tools.clone());
    let parts = client.submit_with_events(&request, events)?;
    Ok(partition(&parts))
}

/// Long-lived audit runner owning the client and the tool set.
///
/// At most one audit runs at a time; `is_running` lets a UI disable its
/// trigger meanwhile.
pub struct Auditor {
    client: ReasoningClient,
    tools: ToolRegistry,
    events: Option<EventWriter>,
    in_flight: AtomicBool,
}

impl Auditor {
    pub fn new(client: ReasoningClient, tools: ToolRegistry) -> Self {
        Self {
            client,
            tools,
            events: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn run_audit(
        &self,
        image_bytes: Option<&[u8]>,
        document_bytes: Option<&[u8]>,
    ) -> Result<AuditResult, AuditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        let events = self
            .events
            .as_ref()
            .map(|writer| writer.scoped(format!("audit-{}", Uuid::new_v4())));

        let outcome = run_pipeline(
            &self.client,
            &self.tools,
            image_bytes,
            document_bytes,
            events.as_ref(),
        );

        if let Some(events) = &events {
            let payload = match &outcome {
                Ok(result) => (
                    "audit_finished",
                    json!({
                        "thoughts": result.thoughts.len(),
                        "diagnosis_chars": result.diagnosis.chars().count(),
                        "answered": result.has_answer(),
                        "tool_calls": result.tool_calls.len(),
                    }),
                ),
                Err(err) => (
                    "audit_failed",
                    json!({
                        "error_kind": err.kind(),
                        "retryable": err.is_retryable(),
                        "message": err.to_string(),
                    }),
                ),
            };
            emit(Some(events), payload.0, payload.1);
        }
        outcome
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, AuditError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AuditError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn inputs_payload(image: &ImageInput, document: &MediaPart) -> Value {
    json!({
        "image": {
            "mime_type": image.mime_type,
            "width": image.width,
            "height": image.height,
            "bytes": image.encoded.len(),
            "sha256": sha256_hex(&image.encoded),
        },
        "document": {
            "media_type": document.media_type,
            "bytes": document.bytes.len(),
            "sha256": sha256_hex(&document.bytes),
        },
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
