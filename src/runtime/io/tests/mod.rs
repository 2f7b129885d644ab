//! Io 单元测试

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use crate::runtime::error::RuntimeError;
use crate::runtime::io::{Io, IoMode};
use crate::runtime::scheduler::{EventLoop, SchedulerConfig};
use crate::runtime::stream::{pipeline, stream_fn, Stream, StreamMode};
use crate::runtime::value::{Array, Value};

fn collector(lp: &EventLoop) -> (Stream, Rc<RefCell<Vec<Value>>>) {
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

fn strs(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::from(*s)).collect()
}

#[test]
fn test_io_mode_flags() {
    let rw = IoMode::READ | IoMode::WRITE;
    assert!(rw.contains(IoMode::READ));
    assert!(rw.contains(IoMode::WRITE));
    assert!(!IoMode::READ.contains(IoMode::WRITE));
    assert_eq!(rw.to_string(), "rw");
    assert_eq!(IoMode::WRITE.to_string(), "w");
}

#[test]
fn test_stream_requires_opened_direction() {
    let lp = EventLoop::new(SchedulerConfig::default());
    let io = Io::with_loop(&lp, 0, IoMode::READ);
    assert!(matches!(
        io.stream(IoMode::WRITE),
        Err(RuntimeError::InvalidIoMode("writing"))
    ));
    assert!(matches!(
        io.stream(IoMode::READ | IoMode::WRITE),
        Err(RuntimeError::InvalidIoMode(_))
    ));
}

#[test]
fn test_stream_is_cached() {
    let lp = EventLoop::new(SchedulerConfig::default());
    let io = Io::with_loop(&lp, 1, IoMode::WRITE);
    let a = io.stream(IoMode::WRITE).unwrap();
    let b = io.stream(IoMode::WRITE).unwrap();
    assert!(a.ptr_eq(&b));
    assert_eq!(a.mode(), StreamMode::Consumer);
}

#[test]
fn test_io_display() {
    let lp = EventLoop::new(SchedulerConfig::default());
    let io = Io::with_loop(&lp, 0, IoMode::READ);
    assert_eq!(Value::from(io.clone()).to_string(), "<io: fd=0 mode=r>");
    assert_eq!(format!("{:?}", io), "<io: fd=0 mode=r>");
}

#[test]
fn test_read_lines_from_file() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"alpha\nbeta\ngamma").unwrap();
    let file = File::open(tmp.path()).unwrap();

    let lp = EventLoop::current();
    let io = Io::from_file(file, IoMode::READ);
    let reader = io.stream(IoMode::READ).unwrap();
    assert_eq!(reader.mode(), StreamMode::Producer);
    let (sink, seen) = collector(&lp);
    reader.connect(&sink).unwrap();

    lp.run().unwrap();
    assert_eq!(*seen.borrow(), strs(&["alpha", "beta", "gamma"]));
    assert!(reader.is_killed());
    assert!(sink.is_killed());
    assert_eq!(lp.watch_count(), 0);
}

#[test]
fn test_read_lines_across_small_chunks() {
    let lp = EventLoop::new(SchedulerConfig {
        read_buffer_size: 3,
        ..SchedulerConfig::default()
    });
    let (mut writer, reader_end) = UnixStream::pair().unwrap();
    writer.write_all(b"hello\nworld\n").unwrap();
    drop(writer);

    let io = Io::with_loop(&lp, reader_end.as_raw_fd(), IoMode::READ);
    let reader = io.stream(IoMode::READ).unwrap();
    let (sink, seen) = collector(&lp);
    reader.connect(&sink).unwrap();

    lp.run().unwrap();
    assert_eq!(*seen.borrow(), strs(&["hello", "world"]));
    assert!(lp.stats().polls >= 4);
    drop(reader_end);
}

#[test]
fn test_write_display_forms() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let file = File::create(tmp.path()).unwrap();

    let lp = EventLoop::current();
    let io = Io::from_file(file, IoMode::WRITE);
    let writer = io.stream(IoMode::WRITE).unwrap();
    let src = Stream::with_loop(&lp, StreamMode::Filter, stream_fn(|strm, v| strm.emit(v, None)));
    src.connect(&writer).unwrap();

    src.emit(Value::from_int(1), None).unwrap();
    src.emit(Value::from("x"), None).unwrap();
    src.emit(Value::from_float(2.5), None).unwrap();
    src.emit(
        Value::from(Array::from_vec(vec![Value::from_int(1), Value::from("b")])),
        None,
    )
    .unwrap();
    src.close();
    lp.run().unwrap();

    assert!(writer.is_killed());
    let written = fs::read_to_string(tmp.path()).unwrap();
    assert_eq!(written, "1\nx\n2.5\n[1, \"b\"]\n");
}

fn is_nonblocking(fd: RawFd) -> bool {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    assert!(flags >= 0);
    flags & libc::O_NONBLOCK != 0
}

#[test]
fn test_borrowed_descriptor_flags_restored() {
    let lp = EventLoop::new(SchedulerConfig::default());
    let (mut writer, reader_end) = UnixStream::pair().unwrap();
    writer.write_all(b"one\n").unwrap();
    drop(writer);
    assert!(!is_nonblocking(reader_end.as_raw_fd()));

    let io = Io::with_loop(&lp, reader_end.as_raw_fd(), IoMode::READ);
    let reader = io.stream(IoMode::READ).unwrap();
    let (sink, seen) = collector(&lp);
    reader.connect(&sink).unwrap();
    lp.run().unwrap();

    assert_eq!(*seen.borrow(), strs(&["one"]));
    assert!(reader.is_killed());
    assert!(!is_nonblocking(reader_end.as_raw_fd()));
}

#[test]
fn test_writer_waits_in_loop_for_full_pipe() {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    let read_end = unsafe { File::from_raw_fd(fds[0]) };
    let write_end = unsafe { File::from_raw_fd(fds[1]) };

    // Start draining only after the pipe has had time to fill up.
    let drainer = thread::spawn(move || {
        let mut read_end = read_end;
        thread::sleep(Duration::from_millis(200));
        let mut got = Vec::new();
        read_end.read_to_end(&mut got).unwrap();
        got
    });

    let lp = EventLoop::new(SchedulerConfig {
        poll_timeout: Some(Duration::from_millis(100)),
        ..SchedulerConfig::default()
    });
    let line = "x".repeat(127);
    let lines: Vec<Value> = (0..4000).map(|_| Value::from(line.as_str())).collect();
    let io = Io::from_file_on(&lp, write_end, IoMode::WRITE);
    let writer = io.stream(IoMode::WRITE).unwrap();
    pipeline::chain(&lp, &[Value::from(Array::from_vec(lines)), Value::Stream(writer.clone())]).unwrap();

    lp.run().unwrap();
    assert!(writer.is_killed());
    assert_eq!(lp.watch_count(), 0);
    // The full pipe was waited on by the loop's own poll.
    assert!(lp.stats().polls >= 1);
    assert!(lp.errors().is_empty());

    drop(writer);
    drop(io);
    let got = drainer.join().unwrap();
    assert_eq!(got.len(), 4000 * 128);
    assert!(got.chunks(128).all(|l| l[..127].iter().all(|&b| b == b'x') && l[127] == b'\n'));
}
