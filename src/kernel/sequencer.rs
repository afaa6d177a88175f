use serde_json::Value;
use tracing::{debug, info, warn};

use super::task::{TaskDescriptor, TaskId, TaskStatus};
use crate::plan::types::BehaviourTree;
use crate::world::resolver::{resolve, ResolutionError};
use crate::world::state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InFlight,
    Exhausted,
}

/// What a finalization did to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    Advanced { step: usize },
    Retrying { step: usize },
    /// Nothing was in flight.
    Ignored,
}

/// Walks the plan one step at a time. The cursor only moves forward and
/// only on success; any other outcome re-issues the same step.
#[derive(Debug)]
pub struct Sequencer {
    plan: BehaviourTree,
    cursor: usize,
    in_flight: Option<TaskId>,
    exhausted: bool,
}

impl Sequencer {
    pub fn new(plan: BehaviourTree) -> Self {
        Self {
            plan,
            cursor: 0,
            in_flight: None,
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn plan(&self) -> &BehaviourTree {
        &self.plan
    }

    pub fn in_flight(&self) -> Option<TaskId> {
        self.in_flight
    }

    pub fn phase(&self) -> Phase {
        if self.exhausted {
            Phase::Exhausted
        } else if self.in_flight.is_some() {
            Phase::InFlight
        } else {
            Phase::Idle
        }
    }

    /// Offers the sequencer a chance to issue the next step.
    ///
    /// Returns `Ok(None)` when a task is already running or the plan is done.
    /// A resolution failure issues nothing and leaves the cursor alone, so the
    /// same step is tried again against the next snapshot.
    pub fn on_scheduling_opportunity(
        &mut self,
        state: &WorldState,
    ) -> Result<Option<TaskDescriptor>, ResolutionError> {
        if self.exhausted || self.in_flight.is_some() {
            return Ok(None);
        }

        let Some(step) = self.plan.get(self.cursor) else {
            info!("Plan finished after {} steps", self.plan.len());
            self.exhausted = true;
            return Ok(None);
        };

        let task_type = step.normalized_type();
        let task_args = match &step.args {
            Some(arg) => Some(resolve(arg, state)?),
            None => None,
        };

        let task = TaskDescriptor {
            id: TaskId::new(),
            step: self.cursor,
            task_type,
            task_args,
        };
        debug!("Step {} prepared as {} ({})", self.cursor, task.task_type, task.id);
        self.in_flight = Some(task.id);

        Ok(Some(task))
    }

    /// Forgets a task the runtime never accepted. The cursor stays put, so the
    /// same step is prepared again on the next opportunity.
    pub fn release_in_flight(&mut self) -> Option<TaskId> {
        let released = self.in_flight.take();
        if let Some(task_id) = released {
            debug!("Step {} ({}) was not handed off, will retry", self.cursor, task_id);
        }
        released
    }

    /// Closes the in-flight task. `reason` is diagnostic only.
    pub fn on_task_finalized(&mut self, status: TaskStatus, reason: &Value) -> Finalized {
        let Some(task_id) = self.in_flight.take() else {
            warn!("Finalization ({:?}) with no task in flight, ignoring", status);
            return Finalized::Ignored;
        };

        let step = self.cursor;
        if status.is_success() {
            self.cursor += 1;
            info!("Step {} ({}) succeeded", step, task_id);
            if self.cursor >= self.plan.len() {
                info!("Plan finished after {} steps", self.plan.len());
                self.exhausted = true;
            }
            Finalized::Advanced { step }
        } else {
            info!("Step {} ({}) ended {:?}: {}. Retrying", step, task_id, status, reason);
            Finalized::Retrying { step }
        }
    }
}
