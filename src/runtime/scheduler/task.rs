//! Task definitions for the event loop.
//!
//! A task is a deferred `(callback, value)` pair bound to the stream node
//! it runs against. The queue owns a task until it is popped; running it
//! consumes it.

use std::fmt;

use crate::runtime::error::RtResult;
use crate::runtime::stream::Stream;
use crate::runtime::value::Value;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Callback run by a task: the node it is bound to and the carried value.
pub type Callback = fn(&Stream, Value) -> RtResult<()>;

/// A deferred callback invocation.
pub struct Task {
    id: TaskId,
    strm: Stream,
    func: Callback,
    data: Value,
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("stream", &self.strm.id())
            .field("data", &self.data)
            .finish()
    }
}

impl Task {
    /// Create a task. Ids come from the owning loop's [`TaskIdGenerator`].
    pub fn new(
        id: TaskId,
        strm: Stream,
        func: Callback,
        data: Value,
    ) -> Self {
        Self {
            id,
            strm,
            func,
            data,
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Node the callback runs against.
    #[inline]
    pub fn stream(&self) -> &Stream {
        &self.strm
    }

    #[inline]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Run the callback, consuming the task.
    ///
    /// The node is returned alongside the outcome so the caller can attach
    /// a failure to it.
    pub fn run(self) -> (Stream, RtResult<()>) {
        let result = (self.func)(&self.strm, self.data);
        (self.strm, result)
    }
}

/// Sequential task id source.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: usize,
}

impl TaskIdGenerator {
    #[inline]
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Generate the next task ID.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        TaskId(id)
    }
}
