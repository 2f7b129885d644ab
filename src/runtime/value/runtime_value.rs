//! Runtime value type for Rill
//!
//! `Value` is the unified representation of every value flowing through a
//! pipeline. It is a closed sum type; each variant also projects onto a
//! NaN-boxed [`Word`] which serves as the value's identity (see
//! [`Value::word`]).
//!
//! Scalars are stored directly. Strings, arrays and objects are shared
//! handles: cloning a `Value` never copies the underlying bytes or buffer.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::array::{ary_eq, Array};
use super::string::{str_eq, Str};
use super::tag::{Tag, Word};
use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::io::Io;
use crate::runtime::namespace::{self, Namespace};
use crate::runtime::stream::Stream;

/// Integer payload width.
pub type Int = i32;

/// Native function: receives its arguments and returns a value or an error.
pub type CFunc = fn(&[Value]) -> RtResult<Value>;

/// An opaque object owned by a collaborator, optionally bound to a
/// namespace for dispatch.
#[derive(Clone)]
pub struct Foreign {
    data: Rc<dyn Any>,
    ns: Option<Namespace>,
}

impl Foreign {
    /// Wrap `data` without a namespace.
    pub fn new<T: Any>(data: T) -> Self {
        Self {
            data: Rc::new(data),
            ns: None,
        }
    }

    /// Wrap `data` bound to `ns`.
    pub fn with_namespace<T: Any>(
        data: T,
        ns: Namespace,
    ) -> Self {
        Self {
            data: Rc::new(data),
            ns: Some(ns),
        }
    }

    /// Borrow the payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.ns.as_ref()
    }

    /// Address of the payload.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.data) as *const () as usize
    }
}

/// Runtime value
///
/// # Design Principles
/// - Uses `enum` for easy pattern matching
/// - Heap data is shared through `Rc`; values are cheap to clone
/// - The tag never changes after construction
#[derive(Clone, Default)]
pub enum Value {
    /// Nil (null pointer word)
    #[default]
    Nil,

    /// Boolean
    Bool(bool),

    /// 32-bit signed integer
    Int(Int),

    /// Double precision float
    Float(f64),

    /// String in any of its representations
    Str(Str),

    /// Unlabeled or labeled array
    Array(Array),

    /// Struct: an array under the struct tag
    Struct(Array),

    /// Native function
    CFunc(CFunc),

    /// Stream node
    Stream(Stream),

    /// I/O endpoint
    Io(Io),

    /// Collaborator-owned object
    Foreign(Foreign),
}

// ============================================================================
// Construction
// ============================================================================

impl Value {
    #[inline]
    pub fn nil() -> Self {
        Value::Nil
    }

    #[inline]
    pub fn from_bool(b: bool) -> Self {
        Value::Bool(b)
    }

    #[inline]
    pub fn from_int(i: Int) -> Self {
        Value::Int(i)
    }

    #[inline]
    pub fn from_float(f: f64) -> Self {
        Value::Float(f)
    }

    #[inline]
    pub fn from_cfunc(f: CFunc) -> Self {
        Value::CFunc(f)
    }

    pub fn from_foreign(obj: Foreign) -> Self {
        Value::Foreign(obj)
    }

    /// Struct value with field names.
    pub fn new_struct(
        headers: Array,
        values: Vec<Value>,
    ) -> RtResult<Self> {
        let ary = Array::from_vec(values);
        ary.set_headers(headers)?;
        Ok(Value::Struct(ary))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Int> for Value {
    fn from(i: Int) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Str> for Value {
    fn from(s: Str) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Str::new(s))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Stream> for Value {
    fn from(s: Stream) -> Self {
        Value::Stream(s)
    }
}

impl From<Io> for Value {
    fn from(io: Io) -> Self {
        Value::Io(io)
    }
}

// ============================================================================
// Type Query Methods
// ============================================================================

impl Value {
    /// Identity word of this value.
    pub fn word(&self) -> Word {
        match self {
            Value::Nil => Word::nil(),
            Value::Bool(b) => Word::from_bool(*b),
            Value::Int(i) => Word::from_int(*i),
            Value::Float(f) => Word::from_float(*f),
            Value::Str(s) => s.word(),
            Value::Array(a) => a.word(Tag::Array),
            Value::Struct(a) => a.word(Tag::Struct),
            Value::CFunc(f) => Word::from_cfunc(*f as usize),
            Value::Stream(s) => Word::from_ptr(s.addr()),
            Value::Io(io) => Word::from_ptr(io.addr()),
            Value::Foreign(obj) => Word::from_foreign(obj.addr()),
        }
    }

    /// Tag of this value (`Tag::Nan` for floats).
    pub fn tag(&self) -> Tag {
        match self {
            Value::Nil | Value::Stream(_) | Value::Io(_) => Tag::Ptr,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Float(_) => Tag::Nan,
            Value::Str(s) => s.tag(),
            Value::Array(_) => Tag::Array,
            Value::Struct(_) => Tag::Struct,
            Value::CFunc(_) => Tag::CFunc,
            Value::Foreign(_) => Tag::Foreign,
        }
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::CFunc(_) => "cfunc",
            Value::Stream(_) => "stream",
            Value::Io(_) => "io",
            Value::Foreign(_) => "foreign",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// Arrays and structs.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Struct(_))
    }

    #[inline]
    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }

    #[inline]
    pub fn is_cfunc(&self) -> bool {
        matches!(self, Value::CFunc(_))
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        matches!(self, Value::Stream(_))
    }

    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self, Value::Io(_))
    }

    pub fn as_str(&self) -> Option<&Str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Array payload of arrays and structs.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) | Value::Struct(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_io(&self) -> Option<&Io> {
        match self {
            Value::Io(io) => Some(io),
            _ => None,
        }
    }

    pub fn as_foreign(&self) -> Option<&Foreign> {
        match self {
            Value::Foreign(obj) => Some(obj),
            _ => None,
        }
    }
}

// ============================================================================
// Accessors
//
// Accessors assert the tag. Calling one on the wrong kind is a defect in
// the caller, not a recoverable condition.
// ============================================================================

impl Value {
    /// Integer payload; floats truncate.
    pub fn to_int(&self) -> Int {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as Int,
            other => panic!("to_int on {} value", other.kind_name()),
        }
    }

    /// Float payload; integers widen.
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            other => panic!("to_float on {} value", other.kind_name()),
        }
    }

    /// Boolean payload; nil is false.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Nil => false,
            other => panic!("to_bool on {} value", other.kind_name()),
        }
    }

    pub fn to_cfunc(&self) -> CFunc {
        match self {
            Value::CFunc(f) => *f,
            other => panic!("to_cfunc on {} value", other.kind_name()),
        }
    }

    pub fn to_str(&self) -> &Str {
        match self {
            Value::Str(s) => s,
            other => panic!("to_str on {} value", other.kind_name()),
        }
    }

    pub fn to_array(&self) -> &Array {
        match self {
            Value::Array(a) | Value::Struct(a) => a,
            other => panic!("to_array on {} value", other.kind_name()),
        }
    }

    pub fn to_stream(&self) -> &Stream {
        match self {
            Value::Stream(s) => s,
            other => panic!("to_stream on {} value", other.kind_name()),
        }
    }

    pub fn to_io(&self) -> &Io {
        match self {
            Value::Io(io) => io,
            other => panic!("to_io on {} value", other.kind_name()),
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

impl Value {
    /// Namespace consulted for method-style dispatch on this value.
    pub fn namespace(&self) -> Option<Namespace> {
        match self {
            Value::Array(a) | Value::Struct(a) => {
                Some(a.namespace().cloned().unwrap_or_else(namespace::array))
            }
            Value::Str(_) => Some(namespace::string()),
            Value::Int(_) | Value::Float(_) => Some(namespace::number()),
            Value::Foreign(obj) => obj.namespace().cloned(),
            _ => None,
        }
    }

    /// Invoke a callable value.
    pub fn call(
        &self,
        args: &[Value],
    ) -> RtResult<Value> {
        match self {
            Value::CFunc(f) => f(args),
            other => Err(RuntimeError::NotCallable(other.kind_name().to_string())),
        }
    }

    /// Invoke the method `name` found through this value's namespace, with
    /// the value itself as the first argument.
    pub fn send(
        &self,
        name: &str,
        args: &[Value],
    ) -> RtResult<Value> {
        let method = self
            .namespace()
            .and_then(|ns| ns.lookup(name))
            .ok_or_else(|| RuntimeError::Unbound(name.to_string()))?;
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.clone());
        argv.extend_from_slice(args);
        method.call(&argv)
    }
}

// ============================================================================
// Equality
// ============================================================================

/// Value equality.
///
/// Identical words are always equal. Otherwise arrays and structs compare
/// element-wise (headers ignored), strings compare bytes, and an int and a
/// float compare numerically. Everything else is unequal.
pub fn value_eq(
    a: &Value,
    b: &Value,
) -> bool {
    if a.word() == b.word() {
        return true;
    }
    match (a, b) {
        (Value::Array(x), Value::Array(y)) | (Value::Struct(x), Value::Struct(y)) => ary_eq(x, y),
        (Value::Str(x), Value::Str(y)) => str_eq(x, y),
        _ if a.is_number() && b.is_number() => a.to_float() == b.to_float(),
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        value_eq(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        use super::display::Displayable;
        f.write_str(&self.inspect().to_string_lossy())
    }
}
