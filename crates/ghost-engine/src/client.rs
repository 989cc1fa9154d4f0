use ghost_contracts::events::EventWriter;
use ghost_contracts::{AuditError, ReasoningRequest, RemoteError, ResponsePart, ToolDefinition};
use serde_json::{json, Value};

use crate::gemini::{self, FunctionCall};
use crate::map_object;

/// The opaque remote model boundary: one wire payload in, one reply out.
pub trait ModelEndpoint: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, model: &str, payload: &Value) -> Result<Value, RemoteError>;
}

/// Sends a request and runs the tool-call protocol until the model stops
/// asking for tools.
pub struct ReasoningClient {
    endpoint: Box<dyn ModelEndpoint>,
    model: String,
    max_tool_rounds: usize,
}

impl ReasoningClient {
    pub fn new<E: ModelEndpoint + 'static>(
        endpoint: E,
        model: impl Into<String>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            endpoint: Box::new(endpoint),
            model: model.into(),
            max_tool_rounds: max_tool_rounds.max(1),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    pub fn endpoint_name(&self) -> &str {
        self.endpoint.name()
    }

    pub fn submit(&self, request: &ReasoningRequest) -> Result<Vec<ResponsePart>, AuditError> {
        self.submit_with_events(request, None)
    }

    /// Returns every content part of the turn in arrival order, across all
    /// tool-call rounds.
    ///
    /// Rounds are strictly sequential. Every call of a round is resolved
    /// before the round limit is applied and before any handler runs, so an
    /// unknown tool name always fails with `UnknownTool` and no side effects.
    pub fn submit_with_events(
        &self,
        request: &ReasoningRequest,
        events: Option<&EventWriter>,
    ) -> Result<Vec<ResponsePart>, AuditError> {
        let mut payload = gemini::encode_request(request);
        let mut collected = Vec::new();
        let mut tool_rounds = 0usize;

        loop {
            let reply = self.endpoint.generate(&self.model, &payload)?;
            let turn = gemini::decode_response(&reply)?;
            emit(
                events,
                "remote_round",
                json!({
                    "round": tool_rounds,
                    "endpoint": self.endpoint.name(),
                    "model": self.model,
                    "parts": turn.parts.len(),
                    "thought_parts": turn
                        .parts
                        .iter()
                        .filter(|part| matches!(part, ResponsePart::Text { is_thought: true, .. }))
                        .count(),
                    "tool_calls": turn.function_calls.len(),
                }),
            );
            collected.extend(turn.parts);

            if turn.function_calls.is_empty() {
                return Ok(collected);
            }

            let resolved = turn
                .function_calls
                .iter()
                .map(|call| {
                    request
                        .tools
                        .get(&call.call.tool_name)
                        .map(|tool| (call, tool))
                        .ok_or_else(|| AuditError::UnknownTool {
                            name: call.call.tool_name.clone(),
                        })
                })
                .collect::<Result<Vec<(&FunctionCall, &ToolDefinition)>, AuditError>>()?;

            if tool_rounds >= self.max_tool_rounds {
                return Err(AuditError::ToolLoop {
                    max_rounds: self.max_tool_rounds,
                });
            }
            tool_rounds += 1;

            let mut results = Vec::with_capacity(resolved.len());
            for (call, tool) in resolved {
                emit(
                    events,
                    "tool_call",
                    json!({
                        "round": tool_rounds,
                        "tool": tool.name,
                        "arguments": call.call.arguments,
                    }),
                );
                let result = tool.invoke(&call.call.arguments);
                emit(
                    events,
                    "tool_result",
                    json!({
                        "round": tool_rounds,
                        "tool": tool.name,
                        "status": result.get("status").cloned().unwrap_or(Value::Null),
                    }),
                );
                results.push((call.clone(), result));
            }

            let Some(contents) = payload.get_mut("contents").and_then(Value::as_array_mut) else {
                return Err(RemoteError::fatal("request payload lost its contents").into());
            };
            contents.push(turn.content);
            contents.push(gemini::function_response_content(&results));
        }
    }
}

/// Logs one event when a writer is present. Failed writes drop the event.
pub(crate) fn emit(events: Option<&EventWriter>, event_type: &str, payload: Value) {
    if let Some(events) = events {
        let _ = events.emit(event_type, map_object(payload));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use ghost_contracts::{
        partition, ContentItem, ReasoningDetail, ToolCallPart, ToolDefinition, ToolRegistry,
    };
    use serde_json::Map;

    use super::*;

    /// Replays canned replies and records every payload it receives.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedEndpoint {
        replies: Arc<Mutex<VecDeque<Result<Value, RemoteError>>>>,
        repeat: Option<Value>,
        pub(crate) payloads: Arc<Mutex<Vec<Value>>>,
    }

    impl ScriptedEndpoint {
        pub(crate) fn new(replies: Vec<Result<Value, RemoteError>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                ..Self::default()
            }
        }

        pub(crate) fn repeating(reply: Value) -> Self {
            Self {
                repeat: Some(reply),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }

        pub(crate) fn payload(&self, idx: usize) -> Value {
            self.payloads.lock().unwrap()[idx].clone()
        }
    }

    impl ModelEndpoint for ScriptedEndpoint {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(&self, _model: &str, payload: &Value) -> Result<Value, RemoteError> {
            self.payloads.lock().unwrap().push(payload.clone());
            if let Some(reply) = &self.repeat {
                return Ok(reply.clone());
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteError::fatal("script exhausted")))
        }
    }

    pub(crate) fn reply(parts: Value) -> Value {
        json!({"candidates": [{"content": {"role": "model", "parts": parts}, "finishReason": "STOP"}]})
    }

    fn ticket_call(args: Value) -> Value {
        reply(json!([
            {"text": "wear beyond limit, logging a ticket", "thought": true},
            {"functionCall": {"name": "create_maintenance_ticket", "args": args}, "thoughtSignature": "c2ln"}
        ]))
    }

    fn recording_tool(seen: Arc<Mutex<Vec<Map<String, Value>>>>) -> ToolDefinition {
        ToolDefinition::new(
            "create_maintenance_ticket",
            "Logs an industrial repair ticket.",
            json!({"type": "object"}),
            move |args| {
                seen.lock().unwrap().push(args.clone());
                Ok(json!({"status": "SUCCESS", "id": "GHOST-991"}))
            },
        )
    }

    fn request_with(tools: ToolRegistry) -> ReasoningRequest {
        ReasoningRequest {
            contents: vec![ContentItem::Text("inspect".to_string())],
            system_instruction: "auditor".to_string(),
            reasoning_detail: ReasoningDetail::High,
            tools,
        }
    }

    #[test]
    fn plain_reply_needs_one_round_trip() {
        let endpoint = ScriptedEndpoint::new(vec![Ok(reply(json!([
            {"text": "checking tolerances", "thought": true},
            {"text": "bearing exceeds wear limit, replace part X"}
        ])))]);
        let client = ReasoningClient::new(endpoint.clone(), "m", 3);

        let parts = client.submit(&request_with(ToolRegistry::new())).unwrap();
        let result = partition(&parts);
        assert_eq!(result.thoughts, vec!["checking tolerances"]);
        assert_eq!(result.diagnosis, "bearing exceeds wear limit, replace part X");
        assert_eq!(endpoint.calls(), 1);
    }

    #[test]
    fn tool_call_runs_handler_once_and_resubmits_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(recording_tool(Arc::clone(&seen))).unwrap();
        let args = json!({"part_name": "bearing", "urgency": "HIGH", "observation": "scoring"});
        let endpoint = ScriptedEndpoint::new(vec![
            Ok(ticket_call(args.clone())),
            Ok(reply(json!([{"text": "Ticket GHOST-991 filed. Replace part X."}]))),
        ]);
        let client = ReasoningClient::new(endpoint.clone(), "m", 3);

        let parts = client.submit(&request_with(tools)).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(Value::Object(seen[0].clone()), args);

        assert_eq!(endpoint.calls(), 2);
        let resubmitted = endpoint.payload(1);
        let contents = resubmitted["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], json!("model"));
        assert_eq!(contents[1]["parts"][1]["thoughtSignature"], json!("c2ln"));
        assert_eq!(contents[2]["role"], json!("user"));
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"],
            json!({
                "name": "create_maintenance_ticket",
                "response": {"status": "SUCCESS", "id": "GHOST-991"}
            })
        );

        let result = partition(&parts);
        assert_eq!(result.thoughts, vec!["wear beyond limit, logging a ticket"]);
        assert_eq!(result.diagnosis, "Ticket GHOST-991 filed. Replace part X.");
        assert_eq!(
            result.tool_calls,
            vec![ToolCallPart {
                tool_name: "create_maintenance_ticket".to_string(),
                arguments: args.as_object().cloned().unwrap(),
            }]
        );
    }

    #[test]
    fn unknown_tool_fails_without_running_handlers() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invoked);
        let mut tools = ToolRegistry::new();
        tools
            .register(ToolDefinition::new("known", "", json!({}), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"status": "SUCCESS"}))
            }))
            .unwrap();
        let endpoint = ScriptedEndpoint::new(vec![Ok(reply(json!([
            {"functionCall": {"name": "known", "args": {}}},
            {"functionCall": {"name": "self_destruct", "args": {}}}
        ])))]);
        let client = ReasoningClient::new(endpoint.clone(), "m", 3);

        let err = client.submit(&request_with(tools)).unwrap_err();
        assert!(matches!(err, AuditError::UnknownTool { ref name } if name == "self_destruct"));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(endpoint.calls(), 1);
    }

    #[test]
    fn endless_tool_calls_stop_at_round_limit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(recording_tool(Arc::clone(&seen))).unwrap();
        let endpoint = ScriptedEndpoint::repeating(ticket_call(json!({"part_name": "gear"})));
        let client = ReasoningClient::new(endpoint.clone(), "m", 3);

        let err = client.submit(&request_with(tools)).unwrap_err();
        assert!(matches!(err, AuditError::ToolLoop { max_rounds: 3 }), "{err:?}");
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(endpoint.calls(), 4);
    }

    #[test]
    fn unknown_tool_past_round_limit_is_still_unknown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(recording_tool(Arc::clone(&seen))).unwrap();
        let endpoint = ScriptedEndpoint::new(vec![
            Ok(ticket_call(json!({"part_name": "gear"}))),
            Ok(reply(json!([{"functionCall": {"name": "self_destruct", "args": {}}}]))),
        ]);
        let client = ReasoningClient::new(endpoint.clone(), "m", 1);

        let err = client.submit(&request_with(tools)).unwrap_err();
        assert!(
            matches!(err, AuditError::UnknownTool { ref name } if name == "self_destruct"),
            "{err:?}"
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(endpoint.calls(), 2);
    }

    #[test]
    fn failing_handler_is_reported_to_the_model() {
        let mut tools = ToolRegistry::new();
        tools
            .register(ToolDefinition::new(
                "create_maintenance_ticket",
                "",
                json!({}),
                |_| Err(anyhow::anyhow!("ticket queue offline")),
            ))
            .unwrap();
        let endpoint = ScriptedEndpoint::new(vec![
            Ok(ticket_call(json!({"part_name": "bearing"}))),
            Ok(reply(json!([{"text": "Could not file a ticket; replace part X manually."}]))),
        ]);
        let client = ReasoningClient::new(endpoint.clone(), "m", 3);

        let parts = client.submit(&request_with(tools)).unwrap();
        assert_eq!(
            partition(&parts).diagnosis,
            "Could not file a ticket; replace part X manually."
        );
        let response = &endpoint.payload(1)["contents"][2]["parts"][0]["functionResponse"]["response"];
        assert_eq!(response["status"], json!("ERROR"));
        assert!(response["message"]
            .as_str()
            .unwrap_or_default()
            .contains("ticket queue offline"));
    }

    #[test]
    fn remote_errors_pass_through_unchanged() {
        let endpoint = ScriptedEndpoint::new(vec![Err(RemoteError::from_status(503, "busy"))]);
        let client = ReasoningClient::new(endpoint, "m", 3);
        let err = client.submit(&request_with(ToolRegistry::new())).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, AuditError::Remote(RemoteError { status: Some(503), .. })));
    }

    #[test]
    fn rounds_are_logged_when_events_are_enabled() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let events = EventWriter::new(&path, "audit-1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(recording_tool(seen)).unwrap();
        let endpoint = ScriptedEndpoint::new(vec![
            Ok(ticket_call(json!({"part_name": "bearing"}))),
            Ok(reply(json!([{"text": "done"}]))),
        ]);
        let client = ReasoningClient::new(endpoint, "m", 3);

        client.submit_with_events(&request_with(tools), Some(&events))?;

        let types = std::fs::read_to_string(&path)?
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).map(|row| row["type"].clone()))
            .collect::<Result<Vec<Value>, _>>()?;
        assert_eq!(
            types,
            vec![
                json!("remote_round"),
                json!("tool_call"),
                json!("tool_result"),
                json!("remote_round")
            ]
        );
        Ok(())
    }
}
