use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::plan::types::TaskArg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A fully resolved unit of work for the execution runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    /// Plan index this task was built from.
    pub step: usize,
    pub task_type: String,
    pub task_args: Option<TaskArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Failed,
    Interrupted,
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

/// The runtime could not take the task. Nothing was started, so no
/// finalization will follow.
#[derive(Debug, Error)]
#[error("handoff of task {task_id} failed: {source}")]
pub struct HandoffError {
    pub task_id: TaskId,
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl HandoffError {
    pub fn new(task_id: TaskId, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            task_id,
            source: source.into(),
        }
    }
}

/// The execution runtime that carries an assigned task out in the world.
/// It reports back through the driver; the kernel only tells it what to do
/// and when a task has been closed.
pub trait TaskRuntime {
    fn set_current_task(&mut self, task: TaskDescriptor) -> Result<(), HandoffError>;
    fn finalize_current_task(&mut self, status: TaskStatus, reason: &Value);
}

/// Keeps assignments in memory. Useful for embedding and for tests.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    pub current: Option<TaskDescriptor>,
    pub assigned: Vec<TaskDescriptor>,
    pub finalized: Vec<(TaskStatus, Value)>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRuntime for RecordingRuntime {
    fn set_current_task(&mut self, task: TaskDescriptor) -> Result<(), HandoffError> {
        self.current = Some(task.clone());
        self.assigned.push(task);
        Ok(())
    }

    fn finalize_current_task(&mut self, status: TaskStatus, reason: &Value) {
        self.current = None;
        self.finalized.push((status, reason.clone()));
    }
}
