//! Rill dataflow runtime
//!
//! Tagged values, a reference-counted stream graph and a cooperative,
//! single-threaded event loop. Programs are pipelines of stream nodes:
//! producers generate values, filters transform them, consumers receive
//! them. Values move between nodes as queued tasks; descriptor readiness
//! wakes the producers that wait on I/O.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use rill::{decode_file, Format, Result};
//! use rill::runtime::scheduler::SchedulerConfig;
//!
//! fn main() -> Result<()> {
//!     let records = decode_file(Path::new("data.csv"), Format::Csv, SchedulerConfig::default())?;
//!     for record in records {
//!         println!("{:?}", record);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod filters;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use runtime::error::{RtResult, RuntimeError};

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use tracing::debug;

use runtime::io::{Io, IoMode};
use runtime::scheduler::{EventLoop, SchedulerConfig};
use runtime::stream::{stream_fn, Stream, StreamMode};
use runtime::value::Value;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "Rill";

/// Record format of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
    Ltsv,
    /// Plain lines, not decoded
    Lines,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "ltsv" => Ok(Format::Ltsv),
            "lines" => Ok(Format::Lines),
            other => Err(format!("unknown format: {} (expected csv, tsv, ltsv or lines)", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Format::Csv => "csv",
            Format::Tsv => "tsv",
            Format::Ltsv => "ltsv",
            Format::Lines => "lines",
        };
        f.write_str(name)
    }
}

impl Format {
    /// Decoding node for this format, if it needs one.
    pub fn decoder(
        self,
        event_loop: &EventLoop,
    ) -> Option<Stream> {
        match self {
            Format::Csv => Some(filters::csv::sv_filter(event_loop, b',')),
            Format::Tsv => Some(filters::csv::sv_filter(event_loop, b'\t')),
            Format::Ltsv => Some(filters::csv::ltsv_filter(event_loop)),
            Format::Lines => None,
        }
    }
}

/// Connect the reading side of `input` to a decoder for `format` and
/// return the node emitting the records.
pub fn decode(
    input: &Io,
    format: Format,
    event_loop: &EventLoop,
) -> RtResult<Stream> {
    let reader = input.stream(IoMode::READ)?;
    match format.decoder(event_loop) {
        Some(decoder) => {
            reader.connect(&decoder)?;
            debug!(%format, fd = input.fd(), "decoder attached");
            Ok(decoder)
        }
        None => {
            reader.start();
            Ok(reader)
        }
    }
}

/// Decode a whole file on a fresh event loop and return its records.
pub fn decode_file(
    path: &Path,
    format: Format,
    config: SchedulerConfig,
) -> Result<Vec<Value>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let event_loop = EventLoop::new(config);
    let input = Io::from_file_on(&event_loop, file, IoMode::READ);

    let records = Rc::new(RefCell::new(Vec::new()));
    let sink = records.clone();
    let collect = Stream::with_loop(
        &event_loop,
        StreamMode::Consumer,
        stream_fn(move |_, v| {
            sink.borrow_mut().push(v);
            Ok(())
        }),
    );
    decode(&input, format, &event_loop)?.connect(&collect)?;
    event_loop.run()?;

    let out = records.borrow().clone();
    Ok(out)
}
