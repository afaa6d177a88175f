use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::Event;
use super::sequencer::{Finalized, Phase, Sequencer};
use super::task::{HandoffError, TaskDescriptor, TaskRuntime};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::recorder::TelemetryRecorder;
use super::time::Tick;
use crate::config::PilotConfig;
use crate::plan::types::BehaviourTree;
use crate::world::resolver::ResolutionError;
use crate::world::state::WorldState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Log(String),
    TaskAssigned(TaskDescriptor),
    PlanFinished,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

/// A tick that could not issue its step, with whatever the tick produced
/// before that point.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StepFailure {
    pub error: StepError,
    pub effects: Vec<SideEffect>,
}

impl StepFailure {
    pub fn new(error: StepError, effects: Vec<SideEffect>) -> Self {
        Self { error, effects }
    }
}

pub struct Reactor<R: TaskRuntime> {
    pub receiver: mpsc::Receiver<Event>,
    pub sequencer: Sequencer,
    pub runtime: R,
    pub telemetry: TelemetryRecorder,
    pub tick: Tick,
    config: PilotConfig,
    // Newest snapshot seen so far
    world: Option<WorldState>,
    finish_reported: bool,
    // Step whose failure has already been logged at warn
    failing_step: Option<usize>,
}

impl<R: TaskRuntime> Reactor<R> {
    pub fn new(receiver: mpsc::Receiver<Event>, plan: BehaviourTree, runtime: R, config: PilotConfig) -> Self {
        Self {
            receiver,
            sequencer: Sequencer::new(plan),
            runtime,
            telemetry: TelemetryRecorder::new(),
            tick: Tick::new(),
            config,
            world: None,
            finish_reported: false,
            failing_step: None,
        }
    }

    pub fn config(&self) -> &PilotConfig {
        &self.config
    }

    pub fn world(&self) -> Option<&WorldState> {
        self.world.as_ref()
    }

    /// One synchronous kernel step. MUST NOT await.
    ///
    /// Events are applied in arrival order: snapshots replace the held world,
    /// finalizations go to the runtime first and then to the sequencer. After
    /// that the sequencer gets exactly one scheduling opportunity against the
    /// newest snapshot. If the step cannot be issued, the failure carries the
    /// effects already produced by this batch; its finalizations stay applied.
    pub fn tick_step(&mut self, events: Vec<Event>) -> Result<Vec<SideEffect>, StepFailure> {
        self.tick = self.tick.next();
        let mut effects = Vec::new();

        for event in events {
            match event {
                Event::WorldUpdate(state) => self.world = Some(state),
                Event::TaskFinalized { status, reason } => {
                    self.runtime.finalize_current_task(status, &reason);
                    let task_id = self.sequencer.in_flight();

                    match (self.sequencer.on_task_finalized(status, &reason), task_id) {
                        (Finalized::Advanced { step } | Finalized::Retrying { step }, Some(task_id)) => {
                            self.telemetry.record(TelemetryEvent::StepFinalized {
                                step,
                                task_id,
                                status,
                                tick: self.tick,
                            });
                            effects.push(SideEffect::Log(format!("step {} finalized: {:?}", step, status)));
                        }
                        _ => {
                            self.telemetry.record(TelemetryEvent::StrayFinalization { status, tick: self.tick });
                        }
                    }
                }
            }
        }

        if let Some(world) = &self.world {
            let step = self.sequencer.cursor();
            match self.sequencer.on_scheduling_opportunity(world) {
                Ok(Some(task)) => {
                    if let Err(e) = self.runtime.set_current_task(task.clone()) {
                        self.sequencer.release_in_flight();
                        self.telemetry.record(TelemetryEvent::HandoffFailed {
                            step,
                            task_id: task.id,
                            tick: self.tick,
                        });
                        return Err(StepFailure::new(StepError::Handoff(e), effects));
                    }
                    info!("Issued step {}: {} {:?}", task.step, task.task_type, task.task_args);
                    self.telemetry.record(TelemetryEvent::StepIssued {
                        step: task.step,
                        task_id: task.id,
                        task_type: task.task_type.clone(),
                        tick: self.tick,
                    });
                    self.failing_step = None;
                    effects.push(SideEffect::TaskAssigned(task));
                }
                Ok(None) => {}
                Err(e) => {
                    self.telemetry.record(TelemetryEvent::ResolutionFailed { step, tick: self.tick });
                    return Err(StepFailure::new(StepError::Resolution(e), effects));
                }
            }
        } else {
            debug!("No world snapshot yet, skipping scheduling");
        }

        if self.sequencer.phase() == Phase::Exhausted && !self.finish_reported {
            self.finish_reported = true;
            self.telemetry.record(TelemetryEvent::PlanFinished {
                steps: self.sequencer.plan().len(),
                tick: self.tick,
            });
            effects.push(SideEffect::PlanFinished);
        }

        Ok(effects)
    }

    /// Logs a failed step. The first failure of a step goes out at `warn`,
    /// repeats of the same step at `debug`. Returns true when it warned.
    pub fn report_failure(&mut self, failure: &StepFailure) -> bool {
        self.log_effects(&failure.effects);

        let step = self.sequencer.cursor();
        if self.failing_step == Some(step) {
            debug!("Step {} still not issued: {}", step, failure.error);
            false
        } else {
            warn!("Step {} not issued: {}", step, failure.error);
            self.failing_step = Some(step);
            true
        }
    }

    fn log_effects(&self, effects: &[SideEffect]) {
        for effect in effects {
            match effect {
                SideEffect::Log(msg) => debug!("[LOG] {}", msg),
                SideEffect::TaskAssigned(task) => debug!("Assigned {} ({})", task.task_type, task.id),
                SideEffect::PlanFinished => info!("Recipe finished"),
            }
        }
    }

    /// Async driver loop. Returns when cancelled, when every sender is gone,
    /// or (if configured) once the plan is exhausted.
    pub async fn run(&mut self, cancel: CancellationToken) -> Phase {
        info!(
            "Pilot started for player {}. Step time: {}ms, {} plan steps",
            self.config.player_id,
            self.config.step_time_ms,
            self.sequencer.plan().len()
        );

        let mut cadence = interval(self.config.step_time());
        cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Pilot cancelled at step {}", self.sequencer.cursor());
                    break;
                }
                _ = cadence.tick() => {}
            }

            let mut events = Vec::new();
            let mut closed = false;
            loop {
                match self.receiver.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }

            match self.tick_step(events) {
                Ok(effects) => self.log_effects(&effects),
                Err(failure) => {
                    self.report_failure(&failure);
                }
            }

            if self.config.exit_on_finish && self.sequencer.phase() == Phase::Exhausted {
                break;
            }
            if closed {
                info!("Event channel closed, stopping pilot");
                break;
            }
        }

        self.sequencer.phase()
    }
}
