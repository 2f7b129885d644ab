//! Core value types for Rill
//!
//! This module provides the tagged [`Value`] representation, its NaN-boxed
//! [`Word`] projection, strings, arrays and textual conversion.

pub mod array;
pub mod display;
pub mod runtime_value;
pub mod string;
pub mod tag;

pub use array::{ary_eq, Array};
pub use display::{dump_str, format_float, Displayable};
pub use runtime_value::*;
pub use string::{interned_count, str_eq, Str};
pub use tag::{Tag, Word};

#[cfg(test)]
mod tests;
