//! Cron-driven execution of configured queries (spec §4.4).
//!
//! [`SchedulerRegistry`] owns one background task per scheduled query and a
//! shared [`tokio_util::sync::CancellationToken`] used to stop them all
//! together at shutdown.

mod backoff;
mod dateword;
mod job;
mod registry;
mod webhook;

pub use job::execute_job;
pub use registry::{ScheduledJobInfo, SchedulerRegistry};
