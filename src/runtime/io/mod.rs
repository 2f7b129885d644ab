//! I/O endpoints
//!
//! An [`Io`] pairs a file descriptor with up to two stream nodes: a line
//! reading producer and a line writing consumer. Both switch the descriptor
//! to non-blocking mode and rely on the event loop's readiness wait.
//! Writing is buffered and flushed when the buffer fills and when the
//! consumer closes; bytes the descriptor refuses stay buffered until the
//! loop reports it writable, and the consumer is killed only once its
//! buffer is empty. A borrowed descriptor gets its original flags back
//! when the node using it is dropped.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io;
use std::ops::BitOr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::scheduler::EventLoop;
use crate::runtime::stream::{Stream, StreamHandler, StreamMode};
use crate::runtime::value::{Displayable, Str, Value};

/// Direction mask of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoMode(u8);

impl IoMode {
    pub const READ: IoMode = IoMode(1);
    pub const WRITE: IoMode = IoMode(2);

    #[inline]
    pub fn contains(
        self,
        other: IoMode,
    ) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for IoMode {
    type Output = IoMode;

    fn bitor(
        self,
        rhs: IoMode,
    ) -> IoMode {
        IoMode(self.0 | rhs.0)
    }
}

impl fmt::Display for IoMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.contains(IoMode::READ) {
            f.write_str("r")?;
        }
        if self.contains(IoMode::WRITE) {
            f.write_str("w")?;
        }
        Ok(())
    }
}

struct IoInner {
    fd: RawFd,
    mode: IoMode,
    /// Owned descriptor, closed on drop.
    file: Option<File>,
    read: RefCell<Option<Stream>>,
    write: RefCell<Option<Stream>>,
    event_loop: EventLoop,
}

/// A descriptor-backed endpoint.
#[derive(Clone)]
pub struct Io(Rc<IoInner>);

impl Io {
    fn alloc(
        event_loop: &EventLoop,
        fd: RawFd,
        mode: IoMode,
        file: Option<File>,
    ) -> Self {
        debug!(fd, %mode, "io opened");
        Io(Rc::new(IoInner {
            fd,
            mode,
            file,
            read: RefCell::new(None),
            write: RefCell::new(None),
            event_loop: event_loop.clone(),
        }))
    }

    /// Wrap a descriptor owned elsewhere, e.g. stdin.
    pub fn open(
        fd: RawFd,
        mode: IoMode,
    ) -> Self {
        Io::alloc(&EventLoop::current(), fd, mode, None)
    }

    /// Like [`Io::open`] on an explicit loop.
    pub fn with_loop(
        event_loop: &EventLoop,
        fd: RawFd,
        mode: IoMode,
    ) -> Self {
        Io::alloc(event_loop, fd, mode, None)
    }

    /// Take ownership of `file`; it is closed with the endpoint.
    pub fn from_file(
        file: File,
        mode: IoMode,
    ) -> Self {
        Io::from_file_on(&EventLoop::current(), file, mode)
    }

    /// Like [`Io::from_file`] on an explicit loop.
    pub fn from_file_on(
        event_loop: &EventLoop,
        file: File,
        mode: IoMode,
    ) -> Self {
        Io::alloc(event_loop, file.as_raw_fd(), mode, Some(file))
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.0.fd
    }

    #[inline]
    pub fn mode(&self) -> IoMode {
        self.0.mode
    }

    /// Whether the descriptor is owned elsewhere.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        self.0.file.is_none()
    }

    /// Address of the endpoint, its pointer identity.
    #[inline]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// The node driving one direction of this endpoint.
    ///
    /// `IoMode::READ` yields a producer of lines, `IoMode::WRITE` a
    /// consumer writing the display form of each value plus a newline.
    /// Repeated calls return the same node.
    pub fn stream(
        &self,
        mode: IoMode,
    ) -> RtResult<Stream> {
        let (slot, label) = if mode == IoMode::READ {
            (&self.0.read, "reading")
        } else if mode == IoMode::WRITE {
            (&self.0.write, "writing")
        } else {
            return Err(RuntimeError::InvalidIoMode("a single direction"));
        };
        if !self.mode().contains(mode) {
            return Err(RuntimeError::InvalidIoMode(label));
        }
        if let Some(strm) = slot.borrow().as_ref() {
            return Ok(strm.clone());
        }

        let chunk = self.0.event_loop.config().read_buffer_size.max(1);
        let strm = if mode == IoMode::READ {
            let reader = LineReader {
                io: self.clone(),
                pending: Vec::new(),
                chunk: vec![0; chunk],
                nonblock: None,
            };
            Stream::with_loop(&self.0.event_loop, StreamMode::Producer, reader)
        } else {
            let writer = LineWriter {
                io: self.clone(),
                buf: Vec::with_capacity(chunk),
                limit: chunk,
                nonblock: None,
                waiting: false,
            };
            Stream::with_loop(&self.0.event_loop, StreamMode::Consumer, writer)
        };
        *slot.borrow_mut() = Some(strm.clone());
        Ok(strm)
    }
}

impl fmt::Debug for Io {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "<io: fd={} mode={}>", self.fd(), self.mode())
    }
}

// ============================================================================
// Descriptor helpers
// ============================================================================

/// `O_NONBLOCK` set on a descriptor for as long as this lives.
///
/// A borrowed descriptor gets its previous flags back on drop.
struct NonBlocking {
    fd: RawFd,
    restore: Option<libc::c_int>,
}

impl NonBlocking {
    fn enable(io: &Io) -> io::Result<Self> {
        let fd = io.fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if flags & libc::O_NONBLOCK != 0 {
            return Ok(NonBlocking { fd, restore: None });
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        let restore = io.is_borrowed().then_some(flags);
        Ok(NonBlocking { fd, restore })
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        if let Some(flags) = self.restore {
            trace!(fd = self.fd, "restoring descriptor flags");
            unsafe { libc::fcntl(self.fd, libc::F_SETFL, flags) };
        }
    }
}

fn read_fd(
    fd: RawFd,
    buf: &mut [u8],
) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

fn write_fd(
    fd: RawFd,
    buf: &[u8],
) -> io::Result<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ============================================================================
// Reading
// ============================================================================

/// Producer emitting each line read from the descriptor.
struct LineReader {
    io: Io,
    /// Bytes after the last newline seen.
    pending: Vec<u8>,
    chunk: Vec<u8>,
    /// Set once reading has started.
    nonblock: Option<NonBlocking>,
}

impl LineReader {
    fn emit_lines(
        &mut self,
        strm: &Stream,
    ) -> RtResult<()> {
        let mut start = 0;
        while let Some(pos) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let line = Str::new(&self.pending[start..start + pos]);
            strm.emit(Value::Str(line), None)?;
            start += pos + 1;
        }
        self.pending.drain(..start);
        Ok(())
    }
}

impl StreamHandler for LineReader {
    fn start(
        &mut self,
        strm: &Stream,
        _data: Value,
    ) -> RtResult<()> {
        let fd = self.io.fd();
        if self.nonblock.is_none() {
            match NonBlocking::enable(&self.io) {
                Ok(guard) => self.nonblock = Some(guard),
                Err(err) => {
                    strm.close();
                    return Err(err.into());
                }
            }
            strm.event_loop().watch(fd, strm);
            return Ok(());
        }

        match read_fd(fd, &mut self.chunk) {
            Ok(0) => {
                debug!(fd, stream = %strm.id(), "eof");
                strm.event_loop().unwatch(strm);
                strm.close();
                Ok(())
            }
            Ok(n) => {
                trace!(fd, bytes = n, "read");
                self.pending.extend_from_slice(&self.chunk[..n]);
                strm.event_loop().watch(fd, strm);
                self.emit_lines(strm)
            }
            Err(err) if is_transient(&err) => {
                strm.event_loop().watch(fd, strm);
                Ok(())
            }
            Err(err) => {
                strm.event_loop().unwatch(strm);
                strm.close();
                Err(err.into())
            }
        }
    }

    fn close(
        &mut self,
        strm: &Stream,
        _data: Value,
    ) -> RtResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rest = Str::new(std::mem::take(&mut self.pending));
        strm.emit(Value::Str(rest), None)
    }
}

// ============================================================================
// Writing
// ============================================================================

/// Consumer writing one value per line.
struct LineWriter {
    io: Io,
    buf: Vec<u8>,
    limit: usize,
    nonblock: Option<NonBlocking>,
    /// Write interest is registered for the rest of `buf`.
    waiting: bool,
}

impl LineWriter {
    /// Write as much of the buffer as the descriptor accepts. Returns
    /// whether the buffer was drained; if not, write interest is armed.
    fn flush(
        &mut self,
        strm: &Stream,
    ) -> RtResult<bool> {
        if self.nonblock.is_none() {
            match NonBlocking::enable(&self.io) {
                Ok(guard) => self.nonblock = Some(guard),
                Err(err) => {
                    self.buf.clear();
                    return Err(err.into());
                }
            }
        }
        let fd = self.io.fd();
        while !self.buf.is_empty() {
            match write_fd(fd, &self.buf) {
                Ok(n) => {
                    self.buf.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    trace!(fd, pending = self.buf.len(), "write would block");
                    self.waiting = true;
                    strm.event_loop().watch_write(fd, strm);
                    return Ok(false);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.buf.clear();
                    self.stop_waiting(strm);
                    return Err(err.into());
                }
            }
        }
        self.stop_waiting(strm);
        Ok(true)
    }

    fn stop_waiting(
        &mut self,
        strm: &Stream,
    ) {
        if self.waiting {
            self.waiting = false;
            strm.event_loop().unwatch(strm);
        }
    }
}

impl StreamHandler for LineWriter {
    fn start(
        &mut self,
        strm: &Stream,
        data: Value,
    ) -> RtResult<()> {
        let text = data.to_display();
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(b'\n');
        if !self.waiting && self.buf.len() >= self.limit {
            self.flush(strm)?;
        }
        Ok(())
    }

    fn ready(
        &mut self,
        strm: &Stream,
    ) -> RtResult<()> {
        let result = self.flush(strm);
        if !matches!(result, Ok(false)) {
            strm.settle();
        }
        result.map(|_| ())
    }

    fn close(
        &mut self,
        strm: &Stream,
        _data: Value,
    ) -> RtResult<()> {
        self.flush(strm).map(|_| ())
    }

    fn is_settled(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests;
