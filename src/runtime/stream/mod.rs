//! Stream graph
//!
//! A [`Stream`] is a vertex in the dataflow graph. Producers generate
//! values, filters transform inbound values and emit results, consumers
//! only receive. Values never reach a handler synchronously: [`Stream::emit`]
//! enqueues one task per downstream edge on the event loop, so delivery
//! order per edge is emission order.
//!
//! Lifecycle:
//!
//! ```text
//! producer | filter | consumer  --close-->  dying  --close callback-->  killed
//! ```
//!
//! `close` only marks the node dying and queues the finishing step, so
//! values already queued for it are still processed. The finishing step runs
//! the close callback once, drops the handler state and releases the edges.
//! A downstream node whose last upstream edge is released is closed in turn.

pub mod node_id;
pub mod pipeline;

pub use node_id::{StreamId, StreamIdGenerator};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::scheduler::{Callback, EventLoop, Task, TaskId};
use crate::runtime::value::Value;
use node_id::STREAM_IDS;

/// Operating mode of a node. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Producer,
    Filter,
    Consumer,
    /// Close requested; queued work still drains
    Dying,
    /// Terminal
    Killed,
}

impl StreamMode {
    /// Whether the node still accepts work normally.
    #[inline]
    pub fn is_operational(self) -> bool {
        matches!(self, StreamMode::Producer | StreamMode::Filter | StreamMode::Consumer)
    }
}

impl fmt::Display for StreamMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            StreamMode::Producer => "producer",
            StreamMode::Filter => "filter",
            StreamMode::Consumer => "consumer",
            StreamMode::Dying => "dying",
            StreamMode::Killed => "killed",
        };
        f.write_str(name)
    }
}

/// Callbacks and state of a node.
///
/// The handler is the node's private state: only its own callbacks touch
/// it, and it is dropped when the node is killed.
pub trait StreamHandler {
    /// Called once per inbound value. Producers are called with nil when
    /// started.
    fn start(
        &mut self,
        strm: &Stream,
        data: Value,
    ) -> RtResult<()>;

    /// Called when a descriptor watched for this node becomes ready.
    fn ready(
        &mut self,
        strm: &Stream,
    ) -> RtResult<()> {
        self.start(strm, Value::Nil)
    }

    /// Called once when the node finishes closing. May still emit.
    fn close(
        &mut self,
        _strm: &Stream,
        _data: Value,
    ) -> RtResult<()> {
        Ok(())
    }

    /// Whether the node can be killed once `close` has run. A handler
    /// returning false keeps the node dying and calls [`Stream::settle`]
    /// when its outstanding work is done.
    fn is_settled(&self) -> bool {
        true
    }
}

impl<F> StreamHandler for F
where
    F: FnMut(&Stream, Value) -> RtResult<()>,
{
    fn start(
        &mut self,
        strm: &Stream,
        data: Value,
    ) -> RtResult<()> {
        self(strm, data)
    }
}

/// Pin a closure to the handler signature so its argument types infer.
///
/// ```
/// use rill::runtime::stream::{stream_fn, Stream, StreamMode};
///
/// let echo = Stream::new(StreamMode::Filter, stream_fn(|strm, v| strm.emit(v, None)));
/// assert_eq!(echo.mode(), StreamMode::Filter);
/// ```
pub fn stream_fn<F>(f: F) -> F
where
    F: FnMut(&Stream, Value) -> RtResult<()> + 'static,
{
    f
}

struct StreamInner {
    id: StreamId,
    mode: Cell<StreamMode>,
    started: Cell<bool>,
    close_ran: Cell<bool>,
    handler: RefCell<Option<Box<dyn StreamHandler>>>,
    dst: RefCell<Option<Stream>>,
    rest: RefCell<SmallVec<[Stream; 2]>>,
    exc: RefCell<Option<RuntimeError>>,
    upstreams: Cell<usize>,
    event_loop: EventLoop,
}

/// A shared handle to a stream node.
#[derive(Clone)]
pub struct Stream(Rc<StreamInner>);

impl Stream {
    /// Create a node on the current thread's event loop.
    pub fn new(
        mode: StreamMode,
        handler: impl StreamHandler + 'static,
    ) -> Self {
        Stream::with_loop(&EventLoop::current(), mode, handler)
    }

    /// Create a node on `event_loop`.
    pub fn with_loop(
        event_loop: &EventLoop,
        mode: StreamMode,
        handler: impl StreamHandler + 'static,
    ) -> Self {
        debug_assert!(mode.is_operational(), "streams start operational");
        let strm = Stream(Rc::new(StreamInner {
            id: STREAM_IDS.generate(),
            mode: Cell::new(mode),
            started: Cell::new(false),
            close_ran: Cell::new(false),
            handler: RefCell::new(Some(Box::new(handler))),
            dst: RefCell::new(None),
            rest: RefCell::new(SmallVec::new()),
            exc: RefCell::new(None),
            upstreams: Cell::new(0),
            event_loop: event_loop.clone(),
        }));
        trace!(stream = %strm.id(), %mode, "stream created");
        strm
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.0.id
    }

    /// Address of the node, its pointer identity.
    #[inline]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn mode(&self) -> StreamMode {
        self.0.mode.get()
    }

    #[inline]
    pub fn is_killed(&self) -> bool {
        self.mode() == StreamMode::Killed
    }

    /// Dying or killed.
    #[inline]
    pub fn is_closing(&self) -> bool {
        !self.mode().is_operational()
    }

    /// Event loop this node schedules on.
    #[inline]
    pub fn event_loop(&self) -> &EventLoop {
        &self.0.event_loop
    }

    /// Number of live handles: bindings, upstream edges and queued tasks.
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Number of upstream edges still attached.
    pub fn upstreams(&self) -> usize {
        self.0.upstreams.get()
    }

    /// Downstream nodes, primary edge first, then in connection order.
    pub fn downstreams(&self) -> SmallVec<[Stream; 4]> {
        let mut out = SmallVec::new();
        out.extend(self.0.dst.borrow().iter().cloned());
        out.extend(self.0.rest.borrow().iter().cloned());
        out
    }

    #[inline]
    pub fn ptr_eq(
        &self,
        other: &Stream,
    ) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Add `dst` as a downstream edge of this node.
    ///
    /// The first edge becomes the primary one. A producer starts on its
    /// first connection.
    pub fn connect(
        &self,
        dst: &Stream,
    ) -> RtResult<()> {
        if self.is_closing() || dst.is_killed() {
            return Err(RuntimeError::StreamClosed);
        }
        {
            let mut primary = self.0.dst.borrow_mut();
            if primary.is_none() {
                *primary = Some(dst.clone());
            } else {
                self.0.rest.borrow_mut().push(dst.clone());
            }
        }
        dst.0.upstreams.set(dst.0.upstreams.get() + 1);
        debug!(src = %self.id(), dst = %dst.id(), "stream connected");

        if self.mode() == StreamMode::Producer {
            self.start();
        }
        Ok(())
    }

    /// Queue the first start call of a producer. Later calls do nothing.
    pub fn start(&self) {
        if self.mode() != StreamMode::Producer || self.0.started.replace(true) {
            return;
        }
        trace!(stream = %self.id(), "producer start queued");
        self.task_push(run_start, Value::Nil);
    }

    /// Hand `data` to every downstream edge.
    ///
    /// Each live destination gets its own task, primary edge first. `done`
    /// is queued behind them and runs against this node once the value
    /// has been handed off.
    pub fn emit(
        &self,
        data: Value,
        done: Option<Callback>,
    ) -> RtResult<()> {
        if self.is_killed() {
            return Err(RuntimeError::StreamClosed);
        }
        for target in self.downstreams() {
            if target.is_killed() {
                continue;
            }
            target.task_push(run_start, data.clone());
        }
        if let Some(done) = done {
            self.task_push(done, data);
        }
        Ok(())
    }

    /// Request shutdown. Closing a dying or killed node does nothing.
    pub fn close(&self) {
        if self.is_closing() {
            return;
        }
        debug!(stream = %self.id(), from = %self.mode(), "stream dying");
        self.0.mode.set(StreamMode::Dying);
        self.task_push(finish_close, Value::Nil);
    }

    /// Queue the finishing step again for a dying node whose handler was
    /// not settled when its close callback ran.
    pub fn settle(&self) {
        if self.mode() == StreamMode::Dying && self.0.close_ran.get() {
            trace!(stream = %self.id(), "settled, finishing close");
            self.task_push(finish_close, Value::Nil);
        }
    }

    /// Attach a raised message to this node.
    pub fn raise(
        &self,
        msg: impl Into<String>,
    ) {
        self.set_error(RuntimeError::raised(msg));
    }

    /// Attach an error to this node, replacing any previous one.
    pub fn set_error(
        &self,
        err: RuntimeError,
    ) {
        warn!(stream = %self.id(), error = %err, "stream raised");
        *self.0.exc.borrow_mut() = Some(err);
    }

    pub fn has_error(&self) -> bool {
        self.0.exc.borrow().is_some()
    }

    /// Message of the pending error.
    pub fn error_message(&self) -> Option<String> {
        self.0.exc.borrow().as_ref().map(|e| e.to_string())
    }

    /// Remove and return the pending error.
    pub fn take_error(&self) -> Option<RuntimeError> {
        self.0.exc.borrow_mut().take()
    }

    /// Queue `func(self, data)` on this node's event loop.
    pub fn task_push(
        &self,
        func: Callback,
        data: Value,
    ) -> TaskId {
        self.event_loop().queue().push(self, func, data)
    }

    /// Queue a pre-built task.
    pub fn task_add(
        &self,
        task: Task,
    ) {
        self.event_loop().queue().add(task);
    }

    fn kill(&self) {
        self.0.mode.set(StreamMode::Killed);
        self.event_loop().unwatch(self);
        let primary = self.0.dst.borrow_mut().take();
        let rest = std::mem::take(&mut *self.0.rest.borrow_mut());
        debug!(stream = %self.id(), "stream killed");

        for dst in primary.into_iter().chain(rest) {
            let left = dst.0.upstreams.get().saturating_sub(1);
            dst.0.upstreams.set(left);
            if left == 0 {
                dst.close();
            }
        }
    }
}

/// Deliver `data` to the node's start callback.
pub(crate) fn run_start(
    strm: &Stream,
    data: Value,
) -> RtResult<()> {
    if strm.is_killed() {
        trace!(stream = %strm.id(), "dropping value for killed stream");
        return Ok(());
    }
    let mut slot = strm
        .0
        .handler
        .try_borrow_mut()
        .map_err(|_| RuntimeError::Fatal(format!("stream {} re-entered", strm.id())))?;
    match slot.as_mut() {
        Some(handler) => handler.start(strm, data),
        None => Ok(()),
    }
}

/// Deliver a readiness event to the node's handler.
pub(crate) fn run_ready(
    strm: &Stream,
    _data: Value,
) -> RtResult<()> {
    if strm.is_killed() {
        return Ok(());
    }
    let mut slot = strm
        .0
        .handler
        .try_borrow_mut()
        .map_err(|_| RuntimeError::Fatal(format!("stream {} re-entered", strm.id())))?;
    match slot.as_mut() {
        Some(handler) => handler.ready(strm),
        None => Ok(()),
    }
}

/// Last step of `close`: run the close callback once, then drop state and
/// kill unless the handler still has work outstanding.
fn finish_close(
    strm: &Stream,
    data: Value,
) -> RtResult<()> {
    if strm.is_killed() {
        return Ok(());
    }
    let handler = strm.0.handler.borrow_mut().take();
    let Some(mut handler) = handler else {
        strm.kill();
        return Ok(());
    };
    let result = if strm.0.close_ran.replace(true) {
        Ok(())
    } else {
        handler.close(strm, data)
    };
    if !handler.is_settled() {
        trace!(stream = %strm.id(), "close waiting for handler");
        *strm.0.handler.borrow_mut() = Some(handler);
        return result;
    }
    drop(handler);
    strm.kill();
    result
}

impl fmt::Debug for Stream {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "<stream {} {}>", self.id(), self.mode())
    }
}
