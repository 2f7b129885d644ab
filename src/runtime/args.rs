//! Argument contract checking for native functions
//!
//! Native functions validate their argument list against a short format
//! string before acting:
//!
//! | char | accepts | binds |
//! |------|---------|-------|
//! | `v`  | any value | the value |
//! | `S`  | string | the string |
//! | `s`  | string or nil | the string, or nothing |
//! | `A`  | array or struct | the array |
//! | `a`  | array, struct or nil | the array, or nothing |
//! | `N`  | int or float | the number unchanged |
//! | `i`  | int or float | an int (floats truncate) |
//! | `f`  | int or float | a float (ints widen) |
//! | `b`  | bool or nil | a bool |
//! | `|`  | - | following specs are optional |
//! | `*`  | rest | the remaining arguments |
//!
//! ```
//! use rill::runtime::args::parse_args;
//! use rill::runtime::value::Value;
//!
//! let argv = [Value::from("sep"), Value::from_float(2.9)];
//! let args = parse_args(&argv, "S|i").unwrap();
//! assert_eq!(args.int(1), Some(2));
//! ```

use smallvec::SmallVec;

use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::value::{Array, Int, Str, Value};

/// Arguments bound by [`parse_args`].
#[derive(Debug, Default)]
pub struct Args<'a> {
    slots: SmallVec<[Option<Value>; 6]>,
    rest: &'a [Value],
}

impl<'a> Args<'a> {
    /// Value bound to slot `i`; `None` for absent optional slots.
    pub fn value(
        &self,
        i: usize,
    ) -> Option<&Value> {
        self.slots.get(i)?.as_ref()
    }

    pub fn str(
        &self,
        i: usize,
    ) -> Option<&Str> {
        self.value(i)?.as_str()
    }

    pub fn array(
        &self,
        i: usize,
    ) -> Option<&Array> {
        self.value(i)?.as_array()
    }

    pub fn int(
        &self,
        i: usize,
    ) -> Option<Int> {
        match self.value(i)? {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn float(
        &self,
        i: usize,
    ) -> Option<f64> {
        match self.value(i)? {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn bool(
        &self,
        i: usize,
    ) -> Option<bool> {
        match self.value(i)? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Arguments captured by `*`.
    pub fn rest(&self) -> &'a [Value] {
        self.rest
    }

    /// Number of format slots, bound or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Check `args` against `fmt` and bind them.
pub fn parse_args<'a>(
    args: &'a [Value],
    fmt: &str,
) -> RtResult<Args<'a>> {
    let (required, optional, variadic) = arity(fmt);
    if args.len() < required || (!variadic && args.len() > required + optional) {
        return Err(RuntimeError::ArgCount {
            expected: arity_label(required, optional, variadic),
            given: args.len(),
        });
    }

    let mut out = Args::default();
    let mut idx = 0;
    for spec in fmt.chars() {
        match spec {
            '|' => {}
            '*' => {
                out.rest = &args[idx.min(args.len())..];
                idx = args.len();
            }
            _ => {
                let slot = match args.get(idx) {
                    Some(v) => check(idx, spec, v)?,
                    None => None,
                };
                out.slots.push(slot);
                idx += 1;
            }
        }
    }
    Ok(out)
}

fn arity(fmt: &str) -> (usize, usize, bool) {
    let mut required = 0;
    let mut optional = 0;
    let mut in_optional = false;
    let mut variadic = false;
    for c in fmt.chars() {
        match c {
            '|' => in_optional = true,
            '*' => variadic = true,
            _ if in_optional => optional += 1,
            _ => required += 1,
        }
    }
    (required, optional, variadic)
}

fn arity_label(
    required: usize,
    optional: usize,
    variadic: bool,
) -> String {
    if variadic {
        format!("{}+", required)
    } else if optional > 0 {
        format!("{}..{}", required, required + optional)
    } else {
        required.to_string()
    }
}

fn check(
    index: usize,
    spec: char,
    v: &Value,
) -> RtResult<Option<Value>> {
    let mismatch = |expected: &'static str| RuntimeError::ArgType {
        index,
        expected,
        found: v.kind_name(),
    };
    let bound = match spec {
        'v' => Some(v.clone()),
        'S' | 's' => match v {
            Value::Str(_) => Some(v.clone()),
            Value::Nil if spec == 's' => None,
            _ => return Err(mismatch("string")),
        },
        'A' | 'a' => match v {
            Value::Array(_) | Value::Struct(_) => Some(v.clone()),
            Value::Nil if spec == 'a' => None,
            _ => return Err(mismatch("array")),
        },
        'N' if v.is_number() => Some(v.clone()),
        'i' if v.is_number() => Some(Value::from_int(v.to_int())),
        'f' if v.is_number() => Some(Value::from_float(v.to_float())),
        'N' | 'i' | 'f' => return Err(mismatch("number")),
        'b' => match v {
            Value::Bool(_) | Value::Nil => Some(Value::from_bool(v.to_bool())),
            _ => return Err(mismatch("bool")),
        },
        other => return Err(RuntimeError::Fatal(format!("unknown argument spec '{}'", other))),
    };
    Ok(bound)
}
