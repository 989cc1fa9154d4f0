use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::AuditError;

/// Local callable exposed to the remote model.
///
/// Handlers may have external side effects but must always produce a JSON
/// value; an `Err` is reported back to the model instead of aborting.
pub type ToolHandler = Arc<dyn Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: Value,
    handler: ToolHandler,
}

impl ToolDefinition {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }

    /// Runs the handler. Failures and panics become
    /// `{"status": "ERROR", "message": ...}`.
    pub fn invoke(&self, arguments: &Map<String, Value>) -> Value {
        match catch_unwind(AssertUnwindSafe(|| (self.handler)(arguments))) {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => error_result(format!("{err:#}")),
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|text| text.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                error_result(format!("tool '{}' panicked: {detail}", self.name))
            }
        }
    }

    pub fn declaration(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

fn error_result(message: String) -> Value {
    json!({ "status": "ERROR", "message": message })
}

/// Name-unique, registration-ordered tool set for one request.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), AuditError> {
        if self.tools.contains_key(&tool.name) {
            return Err(AuditError::DuplicateTool { name: tool.name });
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn declarations(&self) -> Vec<Value> {
        self.tools.values().map(ToolDefinition::declaration).collect()
    }
}
