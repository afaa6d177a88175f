use std::collections::HashMap;

use super::event::TelemetryEvent;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub issued: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub resolution_failures: u64,
    pub handoff_failures: u64,
    pub stray_finalizations: u64,
    /// Issues beyond the first for the same step.
    pub retries: u64,
    /// Highest number of issues any single step needed.
    pub max_attempts: u64,
    pub finished_at: Option<u64>,
}

/// Running totals. Fed every recorded event, so the counts cover the whole
/// session even after the event buffer has rolled over.
#[derive(Debug, Clone, Default)]
pub struct StepCounters {
    snap: TelemetrySnapshot,
    attempts: HashMap<usize, u64>,
}

impl StepCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &TelemetryEvent) {
        let snap = &mut self.snap;
        match event {
            TelemetryEvent::StepIssued { step, .. } => {
                snap.issued += 1;
                let attempts = self.attempts.entry(*step).or_insert(0);
                *attempts += 1;
                if *attempts > 1 {
                    snap.retries += 1;
                }
                snap.max_attempts = snap.max_attempts.max(*attempts);
            }
            TelemetryEvent::StepFinalized { status, .. } => {
                if status.is_success() {
                    snap.succeeded += 1;
                } else {
                    snap.failed += 1;
                }
            }
            TelemetryEvent::ResolutionFailed { .. } => snap.resolution_failures += 1,
            TelemetryEvent::HandoffFailed { .. } => snap.handoff_failures += 1,
            TelemetryEvent::StrayFinalization { .. } => snap.stray_finalizations += 1,
            TelemetryEvent::PlanFinished { tick, .. } => snap.finished_at = Some(tick.frame),
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snap.clone()
    }
}

/// Summary of an arbitrary event sequence.
pub fn compute_snapshot<'a>(events: impl IntoIterator<Item = &'a TelemetryEvent>) -> TelemetrySnapshot {
    let mut counters = StepCounters::new();
    for event in events {
        counters.apply(event);
    }
    counters.snapshot()
}
