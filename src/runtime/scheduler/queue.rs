//! Task queue for the event loop
//!
//! Single-threaded FIFO queue. Handles are cheap to clone and share the
//! same underlying deque; tasks run in exactly the order they were pushed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use super::task::{Callback, Task, TaskId, TaskIdGenerator};
use crate::runtime::stream::Stream;
use crate::runtime::value::Value;

#[derive(Default)]
struct QueueInner {
    tasks: VecDeque<Task>,
    ids: TaskIdGenerator,
}

/// A shared FIFO of pending tasks.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Rc<RefCell<QueueInner>>,
}

impl TaskQueue {
    /// Create a new empty task queue.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a task and append it.
    pub fn push(
        &self,
        strm: &Stream,
        func: Callback,
        data: Value,
    ) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.ids.next();
        inner.tasks.push_back(Task::new(id, strm.clone(), func, data));
        id
    }

    /// Append a pre-built task.
    #[inline]
    pub fn add(
        &self,
        task: Task,
    ) {
        self.inner.borrow_mut().tasks.push_back(task);
    }

    /// Allocate an id for a task built outside the queue.
    #[inline]
    pub fn next_id(&self) -> TaskId {
        self.inner.borrow_mut().ids.next()
    }

    /// Pop a task from the front of the queue.
    #[inline]
    pub fn pop_front(&self) -> Option<Task> {
        self.inner.borrow_mut().tasks.pop_front()
    }

    /// Get the number of tasks in the queue.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().tasks.is_empty()
    }

    /// Drop every pending task.
    pub fn clear(&self) {
        let drained: Vec<Task> = self.inner.borrow_mut().tasks.drain(..).collect();
        // Dropping tasks may drop the last handle to a node; do it with
        // the queue unborrowed.
        drop(drained);
    }

    /// Whether both handles share one deque.
    pub fn ptr_eq(
        &self,
        other: &TaskQueue,
    ) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}
