//! Runtime system
//!
//! This module contains the value model, namespaces, the stream graph and
//! the event loop that drives it.

pub mod args;
pub mod error;
pub mod io;
pub mod namespace;
pub mod scheduler;
pub mod stream;
pub mod value;

pub use error::{RtResult, RuntimeError};
