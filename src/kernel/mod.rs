pub mod event;
pub mod reactor;
pub mod sequencer;
pub mod task;
pub mod telemetry;
pub mod time;
