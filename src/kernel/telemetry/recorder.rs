use std::collections::VecDeque;

use super::event::TelemetryEvent;
use super::metrics::{StepCounters, TelemetrySnapshot};

pub const MAX_EVENTS: usize = 10_000;

/// Keeps the most recent events for inspection and whole-session totals
/// for the summary.
#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
    counters: StepCounters,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
            counters: StepCounters::new(),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        self.counters.apply(&event);
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    /// Most recent events, at most `MAX_EVENTS`.
    pub fn events(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.buffer.iter()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.counters.snapshot()
    }

    /// Drops buffered events and resets the totals.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.counters = StepCounters::new();
    }
}
