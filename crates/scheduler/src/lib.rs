//! Periodic background jobs.
//!
//! Currently one job: the escalation sweep that force-advances complaints
//! stuck at the HOD stage past their response deadline.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, SweepExecutor, run_scheduler};
