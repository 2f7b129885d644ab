//! Task scheduling for the stream graph
//!
//! Single-threaded and cooperative. Emitted values and I/O readiness both
//! become [`Task`]s on a FIFO [`TaskQueue`]; the [`EventLoop`] waits for
//! readiness, then drains the queue, until nothing is left to do.

pub mod event_loop;
pub mod queue;
pub mod task;

pub use event_loop::{ErrorReport, EventLoop, LoopStats};
pub use queue::TaskQueue;
pub use task::{Callback, Task, TaskId, TaskIdGenerator};

use std::time::Duration;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Longest wait for readiness when no task is pending. `None` waits
    /// indefinitely.
    pub poll_timeout: Option<Duration>,
    /// Bytes read per readiness event.
    pub read_buffer_size: usize,
    /// Tasks run between two polls; 0 drains the queue completely.
    pub max_tasks_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: None,
            read_buffer_size: 4096,
            max_tasks_per_tick: 0,
        }
    }
}

impl SchedulerConfig {
    /// Timeout argument for `poll(2)`.
    pub(crate) fn poll_timeout_ms(&self) -> i32 {
        match self.poll_timeout {
            Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests;
