use serde_json::Value;

use super::task::TaskStatus;
use crate::world::state::WorldState;

/// Everything the driver feeds into the kernel.
#[derive(Debug, Clone)]
pub enum Event {
    /// Fresh snapshot from the environment. Only the newest one per tick is used.
    WorldUpdate(WorldState),
    /// The runtime closed the current task. Delivered once per assigned task.
    TaskFinalized { status: TaskStatus, reason: Value },
}

impl Event {
    pub fn finalized(status: TaskStatus, reason: impl Into<Value>) -> Self {
        Event::TaskFinalized {
            status,
            reason: reason.into(),
        }
    }
}
