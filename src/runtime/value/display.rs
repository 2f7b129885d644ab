//! String conversion and inspection
//!
//! Every value has two textual forms. The display form ([`Displayable::to_display`])
//! is what a consumer prints; the inspect form ([`Displayable::inspect`]) quotes
//! and escapes strings so the output can be read back unambiguously.
//!
//! Display first asks the value's namespace for a `string` binding and uses
//! its result when it returns a string. Only when that fails does the
//! built-in formatter for the value's kind run.

use std::fmt;

use tracing::trace;

use super::array::Array;
use super::runtime_value::Value;
use super::string::Str;

/// Name of the namespace binding that overrides display.
pub const STRING_METHOD: &str = "string";

/// Significant digits used for floats (`%.14g`).
const FLOAT_DIGITS: usize = 14;

/// Capability to render a value as text.
pub trait Displayable {
    /// Display form.
    fn to_display(&self) -> Str;

    /// Debug form; strings are quoted and escaped.
    fn inspect(&self) -> Str {
        self.to_display()
    }
}

impl Displayable for Value {
    fn to_display(&self) -> Str {
        if let Some(method) = self
            .namespace()
            .and_then(|ns| ns.lookup(STRING_METHOD))
        {
            match method.call(std::slice::from_ref(self)) {
                Ok(Value::Str(s)) => return s,
                Ok(other) => trace!(kind = other.kind_name(), "string method returned non-string"),
                Err(e) => trace!(error = %e, "string method failed"),
            }
        }
        builtin_display(self)
    }

    fn inspect(&self) -> Str {
        match self {
            Value::Str(s) => dump_str(s),
            Value::Array(a) | Value::Struct(a) => inspect_array(a),
            other => other.to_display(),
        }
    }
}

impl Displayable for Array {
    fn to_display(&self) -> Str {
        inspect_array(self)
    }
}

impl Displayable for Str {
    fn to_display(&self) -> Str {
        self.clone()
    }

    fn inspect(&self) -> Str {
        dump_str(self)
    }
}

/// Built-in formatter per kind, ignoring namespace overrides.
pub fn builtin_display(v: &Value) -> Str {
    match v {
        Value::Nil => Str::from_static(b"nil"),
        Value::Bool(true) => Str::from_static(b"true"),
        Value::Bool(false) => Str::from_static(b"false"),
        Value::Int(i) => Str::new(i.to_string()),
        Value::Float(f) => Str::new(format_float(*f)),
        Value::Str(s) => s.clone(),
        Value::Array(a) | Value::Struct(a) => inspect_array(a),
        Value::CFunc(f) => Str::new(format!("<cfunc:{:#x}>", *f as usize)),
        Value::Stream(s) => Str::new(format!("<stream:{:#x}>", s.addr())),
        Value::Io(io) => Str::new(format!("<io: fd={} mode={}>", io.fd(), io.mode())),
        Value::Foreign(obj) => Str::new(format!("<foreign:{:#x}>", obj.addr())),
    }
}

/// Quote and escape a string C-style.
pub fn dump_str(s: &Str) -> Str {
    let bytes = s.as_bytes();
    let mut buf = Vec::with_capacity(bytes.len() + 2);
    buf.push(b'"');
    for &b in bytes {
        match b {
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            0x1b => buf.extend_from_slice(b"\\e"),
            0 => buf.extend_from_slice(b"\\0"),
            b'"' => buf.extend_from_slice(b"\\\""),
            0x20..=0x7e | 0x80..=0xff => buf.push(b),
            _ => buf.extend_from_slice(format!("\\x{:02x}", b).as_bytes()),
        }
    }
    buf.push(b'"');
    Str::new(buf)
}

/// `[@ns key:value, ...]`
fn inspect_array(a: &Array) -> Str {
    let mut buf = Vec::with_capacity(2 + a.len() * 4);
    buf.push(b'[');
    if let Some(name) = a.namespace().and_then(|ns| ns.name()) {
        buf.push(b'@');
        buf.extend_from_slice(name.as_bytes());
        if !a.is_empty() {
            buf.push(b' ');
        }
    }
    for (i, v) in a.iter().enumerate() {
        if i > 0 {
            buf.extend_from_slice(b", ");
        }
        if let Some(key) = a.header_at(i) {
            if key.is_symbol_like() {
                buf.extend_from_slice(key.as_bytes());
            } else {
                buf.extend_from_slice(dump_str(key).as_bytes());
            }
            buf.push(b':');
        }
        buf.extend_from_slice(v.inspect().as_bytes());
    }
    buf.push(b']');
    Str::new(buf)
}

/// Format a float like C's `%.14g`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.*e}", FLOAT_DIGITS - 1, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= FLOAT_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let precision = (FLOAT_DIGITS as i32 - 1 - exp) as usize;
        let fixed = format!("{:.*}", precision, f);
        trim_fraction(&fixed).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.to_display().to_string_lossy())
    }
}
