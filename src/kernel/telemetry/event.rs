use serde::{Deserialize, Serialize};

use crate::kernel::task::{TaskId, TaskStatus};
use crate::kernel::time::Tick;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    StepIssued {
        step: usize,
        task_id: TaskId,
        task_type: String,
        tick: Tick,
    },

    StepFinalized {
        step: usize,
        task_id: TaskId,
        status: TaskStatus,
        tick: Tick,
    },

    /// The step could not be prepared; nothing was issued.
    ResolutionFailed {
        step: usize,
        tick: Tick,
    },

    /// The runtime refused the task; the step stays pending.
    HandoffFailed {
        step: usize,
        task_id: TaskId,
        tick: Tick,
    },

    /// A finalization arrived while no task was in flight.
    StrayFinalization {
        status: TaskStatus,
        tick: Tick,
    },

    PlanFinished {
        steps: usize,
        tick: Tick,
    },
}
