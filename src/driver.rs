//! JSON-lines wire used by the bundled binary.
//!
//! Inbound, one message per line:
//! `{"type":"state","state":{...}}` or
//! `{"type":"task_finished","status":"SUCCESS","reason":...}`.
//!
//! Outbound, one assignment per line:
//! `{"player_id":"0","task_id":"...","task_type":"GOTO","task_args":"Sink_1"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::kernel::event::Event;
use crate::kernel::task::{HandoffError, TaskDescriptor, TaskId, TaskRuntime, TaskStatus};
use crate::plan::types::TaskArg;
use crate::world::state::WorldState;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("malformed driver message: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("driver i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverMessage {
    State {
        state: WorldState,
    },
    TaskFinished {
        status: TaskStatus,
        #[serde(default)]
        reason: Value,
    },
}

impl From<DriverMessage> for Event {
    fn from(msg: DriverMessage) -> Self {
        match msg {
            DriverMessage::State { state } => Event::WorldUpdate(state),
            DriverMessage::TaskFinished { status, reason } => Event::TaskFinalized { status, reason },
        }
    }
}

/// Parses one inbound line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Event>, DriverError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let msg: DriverMessage = serde_json::from_str(line)?;
    Ok(Some(msg.into()))
}

/// Forwards inbound lines to the kernel until the input ends, the kernel
/// goes away, or reading fails. Malformed lines are skipped. Returns the
/// number of events forwarded; a read error (e.g. invalid UTF-8) is returned
/// so the caller can say why input stopped.
pub async fn pump_lines<R>(reader: R, tx: mpsc::Sender<Event>) -> Result<usize, DriverError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    loop {
        let Some(line) = lines.next_line().await? else {
            info!("Input closed after {} events", forwarded);
            return Ok(forwarded);
        };
        match parse_line(&line) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    return Ok(forwarded);
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Dropping input line: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub player_id: String,
    pub task_id: TaskId,
    pub task_type: String,
    pub task_args: Option<TaskArg>,
}

/// Runtime that hands every assignment to the outside world as a JSON line.
pub struct JsonLinesRuntime<W: Write> {
    player_id: String,
    out: W,
    current: Option<TaskDescriptor>,
}

impl<W: Write> JsonLinesRuntime<W> {
    pub fn new(player_id: &str, out: W) -> Self {
        Self {
            player_id: player_id.to_string(),
            out,
            current: None,
        }
    }

    pub fn current_task(&self) -> Option<&TaskDescriptor> {
        self.current.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, task: &TaskDescriptor) -> Result<(), DriverError> {
        let assignment = Assignment {
            player_id: self.player_id.clone(),
            task_id: task.id,
            task_type: task.task_type.clone(),
            task_args: task.task_args.clone(),
        };
        serde_json::to_writer(&mut self.out, &assignment)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> TaskRuntime for JsonLinesRuntime<W> {
    fn set_current_task(&mut self, task: TaskDescriptor) -> Result<(), HandoffError> {
        if let Err(e) = self.emit(&task) {
            error!("Failed to emit task {}: {}", task.id, e);
            return Err(HandoffError::new(task.id, e));
        }
        self.current = Some(task);
        Ok(())
    }

    fn finalize_current_task(&mut self, status: TaskStatus, reason: &Value) {
        match self.current.take() {
            Some(task) => info!("Task {} {} finished: {:?} ({})", task.task_type, task.id, status, reason),
            None => info!("Finalization {:?} with no current task", status),
        }
    }
}
