use chefbot::kernel::event::Event;
use chefbot::driver::JsonLinesRuntime;
use chefbot::kernel::reactor::{Reactor, SideEffect, StepError};
use chefbot::kernel::sequencer::Phase;
use chefbot::kernel::task::{RecordingRuntime, TaskStatus};
use chefbot::kernel::telemetry::event::TelemetryEvent;
use chefbot::plan::types::{BehaviourTree, TaskArg};
use chefbot::world::resolver::ResolutionError;
use chefbot::world::state::{Category, EquipmentRecord, WorldState};
use chefbot::PilotConfig;
use serde_json::json;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn plan() -> BehaviourTree {
    BehaviourTree::from_json(
        r#"{"steps": [
            {"type": "goto", "args": "Sink"},
            {"type": "interact"},
            {"type": "goto", "args": "stove"}
        ]}"#,
    )
    .unwrap()
}

fn kitchen() -> WorldState {
    WorldState::new()
        .with(Category::Counters, EquipmentRecord::new("stove_0", "Stove"))
        .with(Category::Sinks, EquipmentRecord::new("sink_0", "Sink"))
}

fn fast_config() -> PilotConfig {
    PilotConfig {
        step_time_ms: 1,
        ..Default::default()
    }
}

fn reactor() -> (mpsc::Sender<Event>, Reactor<RecordingRuntime>) {
    let (tx, rx) = mpsc::channel(100);
    (tx, Reactor::new(rx, plan(), RecordingRuntime::new(), PilotConfig::default()))
}

#[tokio::test]
async fn test_no_handoff_before_first_snapshot() {
    let (_tx, mut reactor) = reactor();
    let effects = reactor.tick_step(vec![]).unwrap();
    assert!(effects.is_empty());
    assert!(reactor.runtime.assigned.is_empty());
    assert_eq!(reactor.tick.frame, 1);
}

#[tokio::test]
async fn test_snapshot_triggers_assignment() {
    let (_tx, mut reactor) = reactor();
    let effects = reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();

    assert_eq!(effects.len(), 1);
    let SideEffect::TaskAssigned(task) = &effects[0] else {
        panic!("expected an assignment, got {:?}", effects);
    };
    assert_eq!(task.task_type, "GOTO");
    assert_eq!(task.task_args, Some(TaskArg::Token("sink_0".into())));
    assert_eq!(reactor.runtime.current.as_ref(), Some(task));

    // Still running: further ticks hand nothing off
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();
    reactor.tick_step(vec![]).unwrap();
    assert_eq!(reactor.runtime.assigned.len(), 1);
}

#[tokio::test]
async fn test_finalization_reaches_runtime_then_sequencer() {
    let (_tx, mut reactor) = reactor();
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();

    // Failure and a new opportunity in the same tick: step 0 is re-issued
    reactor
        .tick_step(vec![Event::finalized(TaskStatus::Failed, "path blocked")])
        .unwrap();
    assert_eq!(reactor.runtime.finalized, vec![(TaskStatus::Failed, json!("path blocked"))]);
    assert_eq!(reactor.runtime.assigned.len(), 2);
    assert_eq!(reactor.runtime.assigned[1].step, 0);
    assert_eq!(reactor.sequencer.cursor(), 0);

    // Success moves to step 1
    reactor.tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))]).unwrap();
    assert_eq!(reactor.sequencer.cursor(), 1);
    let last = reactor.runtime.assigned.last().unwrap();
    assert_eq!(last.step, 1);
    assert_eq!(last.task_type, "INTERACT");
}

#[tokio::test]
async fn test_newest_snapshot_wins() {
    let (_tx, mut reactor) = reactor();
    let moved = WorldState::new().with(Category::Sinks, EquipmentRecord::new("sink_9", "Sink"));
    reactor
        .tick_step(vec![Event::WorldUpdate(kitchen()), Event::WorldUpdate(moved)])
        .unwrap();
    assert_eq!(
        reactor.runtime.assigned[0].task_args,
        Some(TaskArg::Token("sink_9".into()))
    );
}

#[tokio::test]
async fn test_resolution_error_surfaces_after_finalization() {
    let (_tx, mut reactor) = reactor();
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();

    // Finish steps 0 and 1, then take the stoves away before step 2 ("stove")
    reactor.tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))]).unwrap();
    let no_stoves = WorldState::new().with(Category::Sinks, EquipmentRecord::new("sink_0", "Sink"));
    let failure = reactor
        .tick_step(vec![
            Event::WorldUpdate(no_stoves),
            Event::finalized(TaskStatus::Success, json!(null)),
        ])
        .unwrap_err();

    assert!(matches!(failure.error, StepError::Resolution(ResolutionError::NoStoves)));
    assert_eq!(
        failure.effects,
        vec![SideEffect::Log("step 1 finalized: Success".to_string())],
        "effects of the batch survive the failure"
    );
    assert_eq!(reactor.sequencer.cursor(), 2, "finalization still applied");
    assert_eq!(reactor.sequencer.phase(), Phase::Idle);
    assert_eq!(reactor.runtime.assigned.len(), 2);

    let failures = reactor
        .telemetry
        .events()
        .filter(|e| matches!(e, TelemetryEvent::ResolutionFailed { step: 2, .. }))
        .count();
    assert_eq!(failures, 1);

    // A stove shows up: the step goes out
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();
    let last = reactor.runtime.assigned.last().unwrap();
    assert_eq!(last.step, 2);
    assert_eq!(last.task_args, Some(TaskArg::Token("stove_0".into())));
}

#[tokio::test]
async fn test_plan_finished_reported_once() {
    let (_tx, mut reactor) = reactor();
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();

    let mut finished = 0;
    for _ in 0..3 {
        let effects = reactor
            .tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))])
            .unwrap();
        finished += effects.iter().filter(|e| **e == SideEffect::PlanFinished).count();
    }
    for _ in 0..5 {
        let effects = reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();
        assert!(!effects.iter().any(|e| matches!(e, SideEffect::TaskAssigned(_))));
        finished += effects.iter().filter(|e| **e == SideEffect::PlanFinished).count();
    }

    assert_eq!(finished, 1);
    assert_eq!(reactor.sequencer.phase(), Phase::Exhausted);
    assert_eq!(reactor.runtime.assigned.len(), 3);
}

#[tokio::test]
async fn test_telemetry_counts_retries() {
    let (_tx, mut reactor) = reactor();
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();
    reactor.tick_step(vec![Event::finalized(TaskStatus::Failed, json!(null))]).unwrap();
    reactor.tick_step(vec![Event::finalized(TaskStatus::Interrupted, json!(null))]).unwrap();
    reactor.tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))]).unwrap();
    reactor.tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))]).unwrap();

    let snap = reactor.telemetry.snapshot();
    assert_eq!(snap.issued, 5);
    assert_eq!(snap.succeeded, 2);
    assert_eq!(snap.failed, 2);
    assert_eq!(snap.retries, 2);
    assert_eq!(snap.max_attempts, 3);
    assert_eq!(snap.stray_finalizations, 0);
    assert_eq!(snap.finished_at, None);
}

#[tokio::test]
async fn test_stray_finalization_recorded() {
    let (_tx, mut reactor) = reactor();
    reactor
        .tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))])
        .unwrap();
    assert_eq!(reactor.sequencer.cursor(), 0);
    assert_eq!(reactor.telemetry.snapshot().stray_finalizations, 1);
}

#[tokio::test]
async fn test_run_exits_when_plan_exhausted() {
    let (tx, rx) = mpsc::channel(100);
    let mut reactor = Reactor::new(rx, plan(), RecordingRuntime::new(), fast_config());

    tx.send(Event::WorldUpdate(kitchen())).await.unwrap();
    let feeder = tokio::spawn(async move {
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if tx.send(Event::finalized(TaskStatus::Success, json!(null))).await.is_err() {
                break;
            }
        }
        // Hold the sender until the reactor is done
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let phase = tokio::time::timeout(Duration::from_secs(3), reactor.run(CancellationToken::new()))
        .await
        .expect("reactor should stop on its own");
    feeder.abort();

    assert_eq!(phase, Phase::Exhausted);
    assert_eq!(reactor.sequencer.cursor(), 3);
    assert_eq!(reactor.runtime.assigned.len(), 3);
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let (tx, rx) = mpsc::channel(100);
    let mut reactor = Reactor::new(rx, plan(), RecordingRuntime::new(), fast_config());
    tx.send(Event::WorldUpdate(kitchen())).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let phase = tokio::time::timeout(Duration::from_secs(3), reactor.run(cancel))
        .await
        .expect("cancellation should stop the loop");

    assert_eq!(phase, Phase::InFlight);
    assert_eq!(reactor.runtime.assigned.len(), 1);
    drop(tx);
}

#[tokio::test]
async fn test_run_stops_when_senders_drop() {
    let (tx, rx) = mpsc::channel(100);
    let mut reactor = Reactor::new(rx, plan(), RecordingRuntime::new(), fast_config());
    tx.send(Event::WorldUpdate(kitchen())).await.unwrap();
    drop(tx);

    let phase = tokio::time::timeout(Duration::from_secs(3), reactor.run(CancellationToken::new()))
        .await
        .expect("closed channel should stop the loop");

    // The buffered snapshot is still processed on the way out
    assert_eq!(phase, Phase::InFlight);
    assert_eq!(reactor.runtime.assigned.len(), 1);
}

/// Writer that refuses every write until switched on.
struct Flaky {
    working: bool,
    written: Vec<u8>,
}

impl Write for Flaky {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.working {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_handoff_retries_step() {
    let (_tx, rx) = mpsc::channel(100);
    let out = Flaky { working: false, written: Vec::new() };
    let mut reactor = Reactor::new(rx, plan(), JsonLinesRuntime::new("0", out), PilotConfig::default());

    // 1. Every write fails: the step never counts as in flight
    let failure = reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap_err();
    assert!(matches!(failure.error, StepError::Handoff(_)));
    for _ in 0..5 {
        assert!(reactor.tick_step(vec![]).is_err());
        assert_eq!(reactor.sequencer.phase(), Phase::Idle);
        assert_eq!(reactor.sequencer.cursor(), 0);
    }
    assert!(reactor.runtime.current_task().is_none());
    assert_eq!(reactor.telemetry.snapshot().handoff_failures, 6);
    assert_eq!(reactor.telemetry.snapshot().issued, 0);

    // 2. The pipe recovers: step 0 goes out on the next tick
    reactor.runtime = JsonLinesRuntime::new("0", Flaky { working: true, written: Vec::new() });
    let effects = reactor.tick_step(vec![]).unwrap();
    assert!(matches!(&effects[0], SideEffect::TaskAssigned(task) if task.step == 0));
    assert_eq!(reactor.sequencer.phase(), Phase::InFlight);

    let out = String::from_utf8(reactor.runtime.into_inner().written).unwrap();
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("\"task_args\":\"sink_0\""));
}

#[tokio::test]
async fn test_repeated_failure_warns_once_per_step() {
    let (_tx, mut reactor) = reactor();
    let empty = WorldState::new();

    let first = reactor.tick_step(vec![Event::WorldUpdate(empty.clone())]).unwrap_err();
    assert!(reactor.report_failure(&first));
    for _ in 0..3 {
        let again = reactor.tick_step(vec![]).unwrap_err();
        assert!(!reactor.report_failure(&again), "repeats are not warnings");
    }

    // Step 0 goes out, finishes, and step 2 later fails: that is news again
    reactor.tick_step(vec![Event::WorldUpdate(kitchen())]).unwrap();
    reactor.tick_step(vec![Event::finalized(TaskStatus::Success, json!(null))]).unwrap();
    let no_stoves = WorldState::new().with(Category::Sinks, EquipmentRecord::new("sink_0", "Sink"));
    let later = reactor
        .tick_step(vec![
            Event::WorldUpdate(no_stoves),
            Event::finalized(TaskStatus::Success, json!(null)),
        ])
        .unwrap_err();
    assert!(reactor.report_failure(&later));
    assert_eq!(reactor.telemetry.snapshot().resolution_failures, 5);
}
