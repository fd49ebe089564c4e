//! The engine's result object, relayed verbatim.

use crate::error::{AuditError, AuditResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Top-level keys every engine report carries.
pub const RESULT_GROUPS: &[&str] = &["violations", "passes", "incomplete", "inapplicable"];

/// An accessibility report. Opaque beyond its top-level result groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AuditReport(Value);

impl AuditReport {
    /// Accept the engine's output. Anything but a JSON object is an engine
    /// failure.
    pub fn from_value(value: Value) -> AuditResult<Self> {
        if !value.is_object() {
            return Err(AuditError::EngineRun(format!(
                "engine returned {} instead of a result object",
                json_kind(&value)
            )));
        }
        Ok(Self(value))
    }

    /// Number of entries in a result group (0 when absent).
    pub fn count(&self, group: &str) -> usize {
        self.0
            .get(group)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Rule ids with at least one violation.
    pub fn violation_ids(&self) -> BTreeSet<String> {
        self.0
            .get("violations")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| v.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Result groups missing from the report.
    pub fn missing_groups(&self) -> Vec<&'static str> {
        RESULT_GROUPS
            .iter()
            .copied()
            .filter(|g| self.0.get(g).is_none())
            .collect()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
