//! Scheduler 单元测试
//!
//! 测试任务队列、事件循环的排序、错误记录和就绪等待


use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::scheduler::EventLoop;
use crate::runtime::stream::{stream_fn, Stream, StreamMode};
use crate::runtime::value::Value;

/// Consumer on `lp` that records every value it receives.
pub(crate) fn collector(lp: &EventLoop) -> (Stream, Rc<RefCell<Vec<Value>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let strm = Stream::with_loop(
        lp,
        StreamMode::Consumer,
        stream_fn(move |_, v| {
            sink.borrow_mut().push(v);
            Ok(())
        }),
    );
    (strm, seen)
}

/// Filter on `lp` that forwards every value unchanged.
pub(crate) fn forwarder(lp: &EventLoop) -> Stream {
    Stream::with_loop(lp, StreamMode::Filter, stream_fn(|strm, v| strm.emit(v, None)))
}
