use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed plan document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A step argument. Only `Token` is ever resolved against the world;
/// everything else is handed to the runtime verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskArg {
    /// Equipment name, category or id, e.g. "stove" or "Sink".
    Token(String),
    /// Objects and arrays.
    Structured(Value),
    /// Numbers and booleans.
    Other(Value),
}

impl TaskArg {
    pub fn as_token(&self) -> Option<&str> {
        match self {
            TaskArg::Token(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for TaskArg {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => TaskArg::Token(s),
            v @ (Value::Object(_) | Value::Array(_)) => TaskArg::Structured(v),
            v => TaskArg::Other(v),
        }
    }
}

impl From<TaskArg> for Value {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::Token(s) => Value::String(s),
            TaskArg::Structured(v) | TaskArg::Other(v) => v,
        }
    }
}

impl From<&str> for TaskArg {
    fn from(s: &str) -> Self {
        TaskArg::Token(s.to_string())
    }
}

impl Serialize for TaskArg {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaskArg::Token(s) => serializer.serialize_str(s),
            TaskArg::Structured(v) | TaskArg::Other(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TaskArg {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(TaskArg::from)
    }
}

impl fmt::Display for TaskArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskArg::Token(s) => write!(f, "{}", s),
            TaskArg::Structured(v) | TaskArg::Other(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(rename = "type")]
    pub task_type: String,
    // `"args": null` lands here as None, same as a missing key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<TaskArg>,
}

impl PlanStep {
    pub fn new(task_type: &str, args: Option<TaskArg>) -> Self {
        Self {
            task_type: task_type.to_string(),
            args,
        }
    }

    /// Task types are case-insensitive in the document and upper-case on the wire.
    pub fn normalized_type(&self) -> String {
        self.task_type.to_uppercase()
    }
}

/// The authored plan: `{"steps": [{"type": ..., "args": ...}, ...]}`.
/// Despite the name it is a flat list executed strictly in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviourTree {
    pub steps: Vec<PlanStep>,
}

impl BehaviourTree {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn from_json(text: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }
}
