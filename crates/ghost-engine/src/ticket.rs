use anyhow::{anyhow, Result};
use ghost_contracts::{AuditError, ToolDefinition, ToolRegistry};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const MAINTENANCE_TICKET_TOOL: &str = "create_maintenance_ticket";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceTicket {
    pub id: String,
    pub part_name: String,
    pub urgency: String,
    pub observation: String,
}

/// `create_maintenance_ticket(part_name, urgency, observation)`.
///
/// `notify` fires once per successful invocation. Ticket ids are synthetic
/// and nothing is stored.
pub fn maintenance_ticket_tool<F>(notify: F) -> ToolDefinition
where
    F: Fn(&MaintenanceTicket) + Send + Sync + 'static,
{
    ToolDefinition::new(
        MAINTENANCE_TICKET_TOOL,
        "Action: Logs an industrial repair ticket for a component that needs maintenance.",
        json!({
            "type": "object",
            "properties": {
                "part_name": {
                    "type": "string",
                    "description": "Name of the inspected component."
                },
                "urgency": {
                    "type": "string",
                    "description": "How soon the repair is needed, e.g. LOW, MEDIUM, HIGH or CRITICAL."
                },
                "observation": {
                    "type": "string",
                    "description": "What was observed and which manual specification it violates."
                }
            },
            "required": ["part_name", "urgency", "observation"]
        }),
        move |args| {
            let ticket = MaintenanceTicket {
                id: new_ticket_id(),
                part_name: required_string(args, "part_name")?,
                urgency: required_string(args, "urgency")?,
                observation: required_string(args, "observation")?,
            };
            notify(&ticket);
            Ok(json!({
                "status": "SUCCESS",
                "id": ticket.id,
                "part_name": ticket.part_name,
                "urgency": ticket.urgency,
            }))
        },
    )
}

/// The tool set offered to the model on every audit.
pub fn default_tool_registry<F>(notify: F) -> Result<ToolRegistry, AuditError>
where
    F: Fn(&MaintenanceTicket) + Send + Sync + 'static,
{
    let mut tools = ToolRegistry::new();
    tools.register(maintenance_ticket_tool(notify))?;
    Ok(tools)
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("argument '{key}' must be a non-empty string"))
}

fn new_ticket_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("GHOST-{}", raw[..6].to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn valid_call_notifies_and_returns_ticket() {
        let notified = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notified);
        let tool = maintenance_ticket_tool(move |ticket| sink.lock().unwrap().push(ticket.clone()));

        let result = tool.invoke(&args(json!({
            "part_name": "Main bearing",
            "urgency": "HIGH",
            "observation": "Pitting beyond 0.2 mm limit"
        })));

        assert_eq!(result["status"], json!("SUCCESS"));
        let id = result["id"].as_str().unwrap_or_default();
        assert!(id.starts_with("GHOST-"));
        assert_eq!(id.len(), "GHOST-".len() + 6);

        let notified = notified.lock().unwrap();
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].part_name, "Main bearing");
        assert_eq!(notified[0].id, id);
    }

    #[test]
    fn missing_argument_is_an_error_result_without_notification() {
        let notified = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&notified);
        let tool = maintenance_ticket_tool(move |_| *sink.lock().unwrap() += 1);

        let result = tool.invoke(&args(json!({"part_name": "gear", "urgency": 3})));

        assert_eq!(result["status"], json!("ERROR"));
        assert!(result["message"]
            .as_str()
            .unwrap_or_default()
            .contains("urgency"));
        assert_eq!(*notified.lock().unwrap(), 0);
    }

    #[test]
    fn default_registry_exposes_ticket_tool() {
        let tools = default_tool_registry(|_| {}).unwrap();
        assert_eq!(tools.names(), vec![MAINTENANCE_TICKET_TOOL]);
        let declaration = &tools.declarations()[0];
        assert_eq!(
            declaration["parameters"]["required"],
            json!(["part_name", "urgency", "observation"])
        );
    }

    #[test]
    fn ticket_ids_are_unique() {
        assert_ne!(new_ticket_id(), new_ticket_id());
    }
}
