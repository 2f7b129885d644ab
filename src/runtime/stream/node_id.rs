//! Stream node identifiers
//!
//! Every node gets a process-unique id at creation. Ids are only used for
//! logging and diagnostics; node identity is the handle itself.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A unique identifier for a stream node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub usize);

impl StreamId {
    /// Returns the inner value of the id.
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generator for creating unique stream ids.
///
/// ```
/// use rill::runtime::stream::StreamIdGenerator;
///
/// let generator = StreamIdGenerator::new();
/// let id1 = generator.generate();
/// let id2 = generator.generate();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug, Default)]
pub struct StreamIdGenerator {
    next_id: AtomicUsize,
}

impl StreamIdGenerator {
    #[inline]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
        }
    }

    /// Generate a new unique id.
    #[inline]
    pub fn generate(&self) -> StreamId {
        StreamId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Id source shared by every node in the process.
pub(crate) static STREAM_IDS: StreamIdGenerator = StreamIdGenerator::new();
