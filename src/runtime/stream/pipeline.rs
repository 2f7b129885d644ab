//! Value-level connections
//!
//! Lets values that are not streams take part in a pipeline: an array
//! becomes a producer of its elements and a callable becomes a filter
//! emitting what it returns for each inbound value.
//!
//! ```
//! use rill::runtime::scheduler::{EventLoop, SchedulerConfig};
//! use rill::runtime::stream::pipeline;
//! use rill::runtime::value::{Array, Value};
//! use rill::RtResult;
//!
//! fn double(args: &[Value]) -> RtResult<Value> {
//!     Ok(Value::from_int(args[0].to_int() * 2))
//! }
//!
//! let lp = EventLoop::new(SchedulerConfig::default());
//! let src = Value::Array(Array::new(&[Value::from_int(1), Value::from_int(2)]));
//! let last = pipeline::chain(&lp, &[src, Value::from_cfunc(double)]).unwrap();
//! lp.run().unwrap();
//! assert!(last.is_killed());
//! ```

use tracing::trace;

use super::{Stream, StreamHandler, StreamMode};
use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::scheduler::EventLoop;
use crate::runtime::value::{Array, Value};

/// Producer emitting the elements of an array, then closing.
pub struct ArrayProducer {
    items: Array,
}

impl ArrayProducer {
    pub fn new(items: Array) -> Self {
        Self { items }
    }
}

impl StreamHandler for ArrayProducer {
    fn start(
        &mut self,
        strm: &Stream,
        _data: Value,
    ) -> RtResult<()> {
        trace!(stream = %strm.id(), len = self.items.len(), "array producer");
        for v in self.items.iter() {
            strm.emit(v.clone(), None)?;
        }
        strm.close();
        Ok(())
    }
}

/// Filter emitting `func(value)` for each inbound value. A nil result
/// emits nothing.
pub struct MapFilter {
    func: Value,
}

impl MapFilter {
    pub fn new(func: Value) -> Self {
        Self { func }
    }
}

impl StreamHandler for MapFilter {
    fn start(
        &mut self,
        strm: &Stream,
        data: Value,
    ) -> RtResult<()> {
        let out = self.func.call(std::slice::from_ref(&data))?;
        if out.is_nil() {
            return Ok(());
        }
        strm.emit(out, None)
    }
}

/// Producer node for the elements of `items`.
pub fn array_stream(
    event_loop: &EventLoop,
    items: Array,
) -> Stream {
    Stream::with_loop(event_loop, StreamMode::Producer, ArrayProducer::new(items))
}

/// Filter node applying `func`. Fails unless `func` is callable.
pub fn map_stream(
    event_loop: &EventLoop,
    func: Value,
) -> RtResult<Stream> {
    if !func.is_cfunc() {
        return Err(RuntimeError::NotCallable(func.kind_name().to_string()));
    }
    Ok(Stream::with_loop(event_loop, StreamMode::Filter, MapFilter::new(func)))
}

/// Turn the value at `index` of a pipeline into a node.
///
/// Only the head of a pipeline may be an array.
fn node_of(
    event_loop: &EventLoop,
    v: &Value,
    index: usize,
) -> RtResult<Stream> {
    match v {
        Value::Stream(s) => Ok(s.clone()),
        Value::CFunc(_) => map_stream(event_loop, v.clone()),
        Value::Array(a) if index == 0 => Ok(array_stream(event_loop, a.clone())),
        other => Err(RuntimeError::ArgType {
            index,
            expected: if index == 0 {
                "stream, array or function"
            } else {
                "stream or function"
            },
            found: other.kind_name(),
        }),
    }
}

/// Connect `values` in order and return the last node.
///
/// Streams are used as they are, arrays and callables are wrapped. An
/// empty pipeline is an argument error.
pub fn chain(
    event_loop: &EventLoop,
    values: &[Value],
) -> RtResult<Stream> {
    let (head, tail) = values.split_first().ok_or_else(|| RuntimeError::ArgCount {
        expected: "1+".to_string(),
        given: 0,
    })?;
    let mut last = node_of(event_loop, head, 0)?;
    for (i, v) in tail.iter().enumerate() {
        let next = node_of(event_loop, v, i + 1)?;
        last.connect(&next)?;
        last = next;
    }
    Ok(last)
}

/// Connect `src` to `dst` and return the destination node as a value.
///
/// Non-stream values are wrapped on the loop of whichever side is
/// already a stream, or the current thread's loop.
pub fn pipe(
    src: &Value,
    dst: &Value,
) -> RtResult<Value> {
    let event_loop = src
        .as_stream()
        .or_else(|| dst.as_stream())
        .map(|s| s.event_loop().clone())
        .unwrap_or_else(EventLoop::current);
    let last = chain(&event_loop, &[src.clone(), dst.clone()])?;
    Ok(Value::Stream(last))
}
