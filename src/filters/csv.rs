//! Separated-values decoders
//!
//! `csv` and `tsv` build filter nodes that turn each inbound line into an
//! array of typed fields. `ltsv` decodes labeled tab-separated lines into
//! records whose headers are the labels.
//!
//! Field typing: after leading whitespace, a run of digits is an int (a
//! float when it overflows), digits with one dot are a float, anything
//! else is a string. Quoted fields are always strings, with `""`
//! unescaped to `"`. Once the first data line has typed a column as
//! string, later fields in that column are never parsed as numbers. A
//! line with an unterminated quote is joined to the next line.
//!
//! Header detection: a first line made only of strings is held back.
//! When the next line has a non-string field the held line is emitted as
//! a record of its own and becomes the headers of every later record.
//! When the next line is all strings too, the held line is emitted as
//! plain data and only that second line carries it as headers.

use tracing::trace;

use crate::runtime::args::parse_args;
use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::scheduler::EventLoop;
use crate::runtime::stream::{Stream, StreamHandler, StreamMode};
use crate::runtime::value::{Array, Int, Str, Value};

/// Coarse field type used to check rows against the first data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Number,
    Str,
}

impl FieldKind {
    fn of(v: &Value) -> Self {
        if v.is_number() {
            FieldKind::Number
        } else {
            FieldKind::Str
        }
    }
}

/// One split field before typing.
struct Field {
    bytes: Vec<u8>,
    quoted: bool,
}

/// Split `line` on `sep`. Returns `None` when a quote is left open.
fn split_fields(
    line: &[u8],
    sep: u8,
) -> Option<Vec<Field>> {
    let mut line = line;
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }

    let mut fields = Vec::new();
    let mut cur = Vec::new();
    let mut quoted = false;
    let mut in_quote = false;
    let mut i = 0;
    while i < line.len() {
        let b = line[i];
        i += 1;
        if in_quote {
            if b == b'"' {
                if line.get(i) == Some(&b'"') {
                    cur.push(b'"');
                    i += 1;
                } else {
                    in_quote = false;
                }
            } else {
                cur.push(b);
            }
            continue;
        }
        if b == b'"' {
            in_quote = true;
            quoted = true;
        } else if b == sep {
            fields.push(Field {
                bytes: std::mem::take(&mut cur),
                quoted,
            });
            quoted = false;
        } else {
            cur.push(b);
        }
    }
    if in_quote {
        return None;
    }
    fields.push(Field { bytes: cur, quoted });
    Some(fields)
}

/// Parse `text` as a number, ignoring leading whitespace.
pub fn parse_number(text: &[u8]) -> Option<Value> {
    let start = text.iter().position(|b| !b.is_ascii_whitespace())?;
    let digits = &text[start..];
    let mut dots = 0;
    for b in digits {
        match b {
            b'0'..=b'9' => {}
            b'.' => dots += 1,
            _ => return None,
        }
    }
    // Only ASCII digits and dots remain.
    let s = std::str::from_utf8(digits).ok()?;
    match dots {
        0 => match s.parse::<Int>() {
            Ok(i) => Some(Value::from_int(i)),
            Err(_) => s.parse::<f64>().ok().map(Value::from_float),
        },
        1 => s.parse::<f64>().ok().map(Value::from_float),
        _ => None,
    }
}

/// Typed value of an unquoted field.
fn scalar(text: &[u8]) -> Value {
    parse_number(text).unwrap_or_else(|| Value::Str(Str::new(text)))
}

/// Typed value of a field. Columns already typed as strings skip number
/// parsing.
fn field_value(
    field: Field,
    kind: Option<FieldKind>,
) -> Value {
    if field.quoted || kind == Some(FieldKind::Str) {
        Value::Str(Str::new(field.bytes))
    } else {
        scalar(&field.bytes)
    }
}

fn inbound_line(
    data: &Value,
    filter: &str,
) -> RtResult<Str> {
    data.as_str()
        .cloned()
        .ok_or_else(|| RuntimeError::raised(format!("{}: string required", filter)))
}

// ============================================================================
// csv / tsv
// ============================================================================

/// Decoder state of one csv or tsv node.
struct SvDecoder {
    sep: u8,
    /// Held first line, or the headers attached to records.
    headers: Option<Array>,
    /// Field kinds fixed by the first data line.
    kinds: Option<Vec<FieldKind>>,
    /// Start of a record with an open quote.
    prev: Option<Vec<u8>>,
    /// Field count fixed by the first line; 0 until then.
    n: usize,
}

impl SvDecoder {
    fn new(sep: u8) -> Self {
        Self {
            sep,
            headers: None,
            kinds: None,
            prev: None,
            n: 0,
        }
    }
}

impl StreamHandler for SvDecoder {
    fn start(
        &mut self,
        strm: &Stream,
        data: Value,
    ) -> RtResult<()> {
        let line = inbound_line(&data, "csv")?;
        let bytes = match self.prev.take() {
            Some(mut prev) => {
                prev.push(b'\n');
                prev.extend_from_slice(line.as_bytes());
                prev
            }
            None => line.as_bytes().to_vec(),
        };
        let Some(fields) = split_fields(&bytes, self.sep) else {
            trace!(stream = %strm.id(), "open quote, joining next line");
            self.prev = Some(bytes);
            return Ok(());
        };
        if self.n > 0 && fields.len() != self.n {
            return Err(RuntimeError::raised("csv: field count mismatch"));
        }

        let kinds = self.kinds.as_deref();
        let values: Vec<Value> = fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| field_value(f, kinds.and_then(|k| k.get(i).copied())))
            .collect();
        let all_str = values.iter().all(Value::is_string);

        if self.headers.is_none() && self.kinds.is_none() {
            self.n = values.len();
            if all_str {
                self.headers = Some(Array::from_vec(values));
                return Ok(());
            }
        }

        let ary = Array::from_vec(values);
        match self.kinds.as_ref() {
            None => {
                // First data line.
                match self.headers.take() {
                    Some(held) if all_str => {
                        strm.emit(Value::Array(held.clone()), None)?;
                        ary.set_headers(held)?;
                    }
                    Some(held) => {
                        let interned: Array = held
                            .iter()
                            .map(|h| match h {
                                Value::Str(s) => Value::Str(Str::intern_str(s)),
                                other => other.clone(),
                            })
                            .collect();
                        strm.emit(Value::Array(interned.clone()), None)?;
                        ary.set_headers(interned.clone())?;
                        self.headers = Some(interned);
                    }
                    None => {}
                }
                self.kinds = Some(ary.iter().map(FieldKind::of).collect());
            }
            Some(kinds) => {
                if kinds.iter().zip(ary.iter()).any(|(k, v)| *k != FieldKind::of(v)) {
                    return Err(RuntimeError::raised("csv type mismatch"));
                }
                if let Some(headers) = &self.headers {
                    ary.set_headers(headers.clone())?;
                }
            }
        }
        strm.emit(Value::Array(ary), None)
    }

    fn close(
        &mut self,
        strm: &Stream,
        _data: Value,
    ) -> RtResult<()> {
        if self.kinds.is_none() {
            if let Some(held) = self.headers.take() {
                strm.emit(Value::Array(held), None)?;
            }
        }
        Ok(())
    }
}

/// A csv (`b','`) or tsv (`b'\t'`) decoding node on `event_loop`.
pub fn sv_filter(
    event_loop: &EventLoop,
    sep: u8,
) -> Stream {
    Stream::with_loop(event_loop, StreamMode::Filter, SvDecoder::new(sep))
}

/// `csv()`: comma separated values.
pub fn csv(args: &[Value]) -> RtResult<Value> {
    parse_args(args, "")?;
    Ok(Value::Stream(sv_filter(&EventLoop::current(), b',')))
}

/// `tsv()`: tab separated values.
pub fn tsv(args: &[Value]) -> RtResult<Value> {
    parse_args(args, "")?;
    Ok(Value::Stream(sv_filter(&EventLoop::current(), b'\t')))
}

// ============================================================================
// ltsv
// ============================================================================

fn ltsv_record(line: &[u8]) -> RtResult<Array> {
    let mut labels = Vec::new();
    let mut values = Vec::new();
    for item in line.split(|b| *b == b'\t') {
        let (label, raw) = match item.iter().position(|b| *b == b':') {
            Some(colon) => (Value::Str(Str::intern(&item[..colon])), &item[colon + 1..]),
            None => (Value::Nil, item),
        };
        labels.push(label);
        values.push(if raw.is_empty() {
            Value::Str(Str::empty())
        } else {
            scalar(raw)
        });
    }
    let ary = Array::from_vec(values);
    ary.set_headers(Array::from_vec(labels))?;
    Ok(ary)
}

/// `ltsv()`: labeled tab separated values (`label:value<TAB>...`).
pub fn ltsv(args: &[Value]) -> RtResult<Value> {
    parse_args(args, "")?;
    Ok(Value::Stream(ltsv_filter(&EventLoop::current())))
}

/// An ltsv decoding node on `event_loop`.
pub fn ltsv_filter(event_loop: &EventLoop) -> Stream {
    Stream::with_loop(
        event_loop,
        StreamMode::Filter,
        |strm: &Stream, data: Value| -> RtResult<()> {
            let line = inbound_line(&data, "ltsv")?;
            let record = ltsv_record(line.as_bytes())?;
            strm.emit(Value::Array(record), None)
        },
    )
}

// ============================================================================
// string methods
// ============================================================================

/// `"42".number()`
pub fn str_number(args: &[Value]) -> RtResult<Value> {
    let args = parse_args(args, "S")?;
    let text = args.str(0).map(|s| s.as_bytes()).unwrap_or_default();
    parse_number(text).ok_or_else(|| RuntimeError::raised("invalid string for number"))
}
