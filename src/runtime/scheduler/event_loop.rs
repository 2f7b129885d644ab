//! The event loop
//!
//! Each turn the loop waits in `poll(2)` for read or write readiness of
//! the registered descriptors (the only place it blocks), turns every ready
//! descriptor into a readiness task for the stream that registered it, then
//! runs queued tasks in FIFO order. It stops once no descriptor is registered and the queue is empty.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use super::queue::TaskQueue;
use super::SchedulerConfig;
use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::stream::{run_ready, Stream, StreamId};
use crate::runtime::value::Value;

/// A node-local error recorded while running a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub stream: StreamId,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "stream {}: {}", self.stream, self.message)
    }
}

/// Loop statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Tasks executed.
    pub tasks_run: u64,
    /// Calls to `poll(2)`.
    pub polls: u64,
    /// Node-local errors recorded.
    pub errors: u64,
}

/// Readiness interest registered by a stream.
struct Watch {
    fd: RawFd,
    /// `POLLIN` or `POLLOUT`
    events: libc::c_short,
    strm: Stream,
    /// Cleared when readiness is dispatched; the stream re-arms it.
    armed: bool,
}

struct LoopInner {
    queue: TaskQueue,
    watches: RefCell<Vec<Watch>>,
    reports: RefCell<Vec<ErrorReport>>,
    config: RefCell<SchedulerConfig>,
    stats: Cell<LoopStats>,
}

/// Handle to an event loop. Clones share the loop.
#[derive(Clone)]
pub struct EventLoop(Rc<LoopInner>);

thread_local! {
    static CURRENT: EventLoop = EventLoop::new(SchedulerConfig::default());
}

impl EventLoop {
    pub fn new(config: SchedulerConfig) -> Self {
        EventLoop(Rc::new(LoopInner {
            queue: TaskQueue::new(),
            watches: RefCell::new(Vec::new()),
            reports: RefCell::new(Vec::new()),
            config: RefCell::new(config),
            stats: Cell::new(LoopStats::default()),
        }))
    }

    /// The loop of the calling thread.
    pub fn current() -> Self {
        CURRENT.with(EventLoop::clone)
    }

    /// Replace the configuration.
    pub fn configure(
        &self,
        config: SchedulerConfig,
    ) {
        *self.0.config.borrow_mut() = config;
    }

    pub fn config(&self) -> SchedulerConfig {
        self.0.config.borrow().clone()
    }

    #[inline]
    pub fn queue(&self) -> &TaskQueue {
        &self.0.queue
    }

    pub fn stats(&self) -> LoopStats {
        self.0.stats.get()
    }

    fn bump(
        &self,
        f: impl FnOnce(&mut LoopStats),
    ) {
        let mut stats = self.0.stats.get();
        f(&mut stats);
        self.0.stats.set(stats);
    }

    /// Register or re-arm read interest of `strm` in `fd`.
    ///
    /// When `fd` becomes readable the loop queues the stream's readiness
    /// callback and disarms the watch until the next call.
    pub fn watch(
        &self,
        fd: RawFd,
        strm: &Stream,
    ) {
        self.arm(fd, libc::POLLIN, strm);
    }

    /// Register or re-arm write interest of `strm` in `fd`.
    pub fn watch_write(
        &self,
        fd: RawFd,
        strm: &Stream,
    ) {
        self.arm(fd, libc::POLLOUT, strm);
    }

    fn arm(
        &self,
        fd: RawFd,
        events: libc::c_short,
        strm: &Stream,
    ) {
        let mut watches = self.0.watches.borrow_mut();
        match watches.iter_mut().find(|w| w.strm.ptr_eq(strm)) {
            Some(w) => {
                w.fd = fd;
                w.events = events;
                w.armed = true;
            }
            None => {
                debug!(fd, events, stream = %strm.id(), "watch registered");
                watches.push(Watch {
                    fd,
                    events,
                    strm: strm.clone(),
                    armed: true,
                });
            }
        }
    }

    /// Drop the watch held for `strm`, if any.
    pub fn unwatch(
        &self,
        strm: &Stream,
    ) {
        let removed: Vec<Watch> = {
            let mut watches = self.0.watches.borrow_mut();
            let (gone, kept): (Vec<Watch>, Vec<Watch>) =
                watches.drain(..).partition(|w| w.strm.ptr_eq(strm));
            *watches = kept;
            gone
        };
        if !removed.is_empty() {
            debug!(stream = %strm.id(), "watch removed");
        }
    }

    /// Number of registered watches.
    pub fn watch_count(&self) -> usize {
        self.0.watches.borrow().len()
    }

    fn armed_count(&self) -> usize {
        self.0.watches.borrow().iter().filter(|w| w.armed).count()
    }

    /// No pending task and nothing left to wait for.
    pub fn is_quiescent(&self) -> bool {
        self.0.queue.is_empty() && self.armed_count() == 0
    }

    /// Node-local errors recorded so far.
    pub fn errors(&self) -> Vec<ErrorReport> {
        self.0.reports.borrow().clone()
    }

    /// Remove and return the recorded errors.
    pub fn take_errors(&self) -> Vec<ErrorReport> {
        std::mem::take(&mut *self.0.reports.borrow_mut())
    }

    /// Run until quiescence. Returns early only on a fatal error.
    pub fn run(&self) -> RtResult<()> {
        debug!("event loop started");
        loop {
            if self.is_quiescent() {
                if self.watch_count() > 0 {
                    warn!(watches = self.watch_count(), "stopping with disarmed watches");
                }
                debug!(stats = ?self.stats(), "event loop quiescent");
                return Ok(());
            }
            if self.armed_count() > 0 {
                self.poll()?;
            }
            let limit = self.0.config.borrow().max_tasks_per_tick;
            self.run_tasks(limit)?;
        }
    }

    /// Run queued tasks to empty without polling.
    pub fn drain(&self) -> RtResult<usize> {
        self.run_tasks(0)
    }

    fn run_tasks(
        &self,
        limit: usize,
    ) -> RtResult<usize> {
        let mut ran = 0;
        while limit == 0 || ran < limit {
            let Some(task) = self.0.queue.pop_front() else {
                break;
            };
            trace!(task = %task.id(), stream = %task.stream().id(), "run task");
            let (strm, result) = task.run();
            ran += 1;
            self.bump(|s| s.tasks_run += 1);
            if let Err(err) = result {
                self.fail(&strm, err)?;
            }
        }
        Ok(ran)
    }

    /// Record a task failure. Fatal errors propagate.
    fn fail(
        &self,
        strm: &Stream,
        err: RuntimeError,
    ) -> RtResult<()> {
        if err.is_fatal() {
            error!(stream = %strm.id(), error = %err, "fatal error, aborting loop");
            return Err(err);
        }
        self.0.reports.borrow_mut().push(ErrorReport {
            stream: strm.id(),
            message: err.to_string(),
        });
        self.bump(|s| s.errors += 1);
        strm.set_error(err);
        Ok(())
    }

    /// Wait for readiness and queue a readiness task per ready watch.
    fn poll(&self) -> RtResult<()> {
        let timeout = if self.0.queue.is_empty() {
            self.0.config.borrow().poll_timeout_ms()
        } else {
            0
        };
        let (mut fds, owners): (Vec<libc::pollfd>, Vec<Stream>) = self
            .0
            .watches
            .borrow()
            .iter()
            .filter(|w| w.armed)
            .map(|w| {
                let pfd = libc::pollfd {
                    fd: w.fd,
                    events: w.events,
                    revents: 0,
                };
                (pfd, w.strm.clone())
            })
            .unzip();

        trace!(fds = fds.len(), timeout, "poll");
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
        self.bump(|s| s.polls += 1);
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(RuntimeError::Fatal(format!("poll: {}", err)));
        }

        for (pfd, strm) in fds.iter().zip(owners) {
            if pfd.revents == 0 {
                continue;
            }
            if let Some(w) = self
                .0
                .watches
                .borrow_mut()
                .iter_mut()
                .find(|w| w.strm.ptr_eq(&strm))
            {
                w.armed = false;
            }
            trace!(fd = pfd.fd, stream = %strm.id(), "fd ready");
            strm.task_push(run_ready, Value::Nil);
        }
        Ok(())
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("queued", &self.0.queue.len())
            .field("watches", &self.watch_count())
            .field("stats", &self.stats())
            .finish()
    }
}
