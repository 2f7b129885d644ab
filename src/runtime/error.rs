//! Runtime errors

use thiserror::Error;

/// Runtime result
pub type RtResult<T> = Result<T, RuntimeError>;

/// Runtime errors
///
/// Errors fall into two groups. Node-local errors (argument contract
/// violations, data mismatches found mid-stream, raised messages) are
/// attached to the stream that produced them and never stop the event
/// loop. Fatal errors (see [`RuntimeError::is_fatal`]) unwind to
/// [`EventLoop::run`](crate::runtime::scheduler::EventLoop::run).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("wrong number of arguments (given {given}, expected {expected})")]
    ArgCount {
        /// Human readable arity, e.g. `1`, `1..2`, `2+`
        expected: String,
        /// Number of arguments actually passed
        given: usize,
    },

    #[error("argument {index}: expected {expected}, got {found}")]
    ArgType {
        /// Zero-based argument position
        index: usize,
        /// Expected value kind
        expected: &'static str,
        /// Actual value kind
        found: &'static str,
    },

    #[error("{0}")]
    Raised(String),

    #[error("stream is closed")]
    StreamClosed,

    #[error("value is not callable: {0}")]
    NotCallable(String),

    #[error("unbound variable: {0}")]
    Unbound(String),

    #[error("variable already defined: {0}")]
    AlreadyDefined(String),

    #[error("namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("namespace cannot create instances: {0}")]
    NotInstantiable(String),

    #[error("headers already set on this array")]
    HeadersAlreadySet,

    #[error("I/O endpoint not opened for {0}")]
    InvalidIoMode(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Fatal: {0}")]
    Fatal(String),
}

impl RuntimeError {
    /// Build a node-local error from a message.
    pub fn raised(msg: impl Into<String>) -> Self {
        RuntimeError::Raised(msg.into())
    }

    /// Whether this error must abort the event loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::OutOfMemory | RuntimeError::Fatal(_))
    }
}

impl From<std::collections::TryReserveError> for RuntimeError {
    fn from(_: std::collections::TryReserveError) -> Self {
        RuntimeError::OutOfMemory
    }
}
