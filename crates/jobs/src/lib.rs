//! Job runner for the stale-shipment check.
//!
//! Invokes the detector on a fixed daily schedule, on demand through the
//! same code path, and optionally once at process start. Every run writes a
//! narrative log to its own timestamped file, flushed on success and on
//! failure. The schedule never halts on a failed run; only an explicit stop
//! ends recurring execution.

mod error;
mod log;
mod runner;
mod schedule;

pub use error::JobError;
pub use log::RunLog;
pub use runner::JobRunner;
pub use schedule::DailySchedule;
