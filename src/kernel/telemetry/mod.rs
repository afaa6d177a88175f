//! Plan step telemetry.
//!
//! # INVARIANT
//! Telemetry is a read-only side-effect layer. It is never consulted by the
//! sequencer or the resolver; it exists for diagnostics and verification.

pub mod event;
pub mod metrics;
pub mod recorder;
