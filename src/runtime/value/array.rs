//! Arrays and structs
//!
//! An [`Array`] owns a fixed-length buffer of values, an optional parallel
//! array of field names (its headers) and an optional namespace used for
//! method-style dispatch. A struct is the same object carried under the
//! `Struct` tag.

use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use super::runtime_value::{value_eq, Value};
use super::string::Str;
use super::tag::{Tag, Word};
use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::namespace::Namespace;

struct ArrayObj {
    data: Box<[Value]>,
    headers: OnceCell<Array>,
    ns: Option<Namespace>,
}

/// A shared, length-prefixed vector of values.
#[derive(Clone)]
pub struct Array(Rc<ArrayObj>);

impl Array {
    fn from_parts(
        data: Box<[Value]>,
        ns: Option<Namespace>,
    ) -> Self {
        Array(Rc::new(ArrayObj {
            data,
            headers: OnceCell::new(),
            ns,
        }))
    }

    /// Take ownership of `values`.
    pub fn from_vec(values: Vec<Value>) -> Self {
        Array::from_parts(values.into_boxed_slice(), None)
    }

    /// Copy `values` into a new array.
    pub fn new(values: &[Value]) -> Self {
        Array::from_vec(values.to_vec())
    }

    /// Allocate `len` nil slots for the caller to fill through
    /// [`Array::data_mut`].
    pub fn zeroed(len: usize) -> Self {
        Array::from_vec(vec![Value::Nil; len])
    }

    /// Build an array bound to `ns`.
    pub fn with_namespace(
        values: Vec<Value>,
        ns: Namespace,
    ) -> Self {
        Array::from_parts(values.into_boxed_slice(), Some(ns))
    }

    /// Array of strings, e.g. for headers.
    pub fn of_strs<S: AsRef<[u8]>>(items: impl IntoIterator<Item = S>) -> Self {
        Array::from_vec(items.into_iter().map(|s| Value::from(Str::new(s))).collect())
    }

    /// In-place access while this handle is the only one.
    pub fn data_mut(&mut self) -> Option<&mut [Value]> {
        Rc::get_mut(&mut self.0).map(|obj| &mut obj.data[..])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        &self.0.data
    }

    #[inline]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<&Value> {
        self.0.data.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.data.iter()
    }

    /// Field names, if any.
    #[inline]
    pub fn headers(&self) -> Option<&Array> {
        self.0.headers.get()
    }

    /// Attach field names. Headers may be set once per array; the length
    /// is not checked against the data.
    pub fn set_headers(
        &self,
        headers: Array,
    ) -> RtResult<()> {
        self.0
            .headers
            .set(headers)
            .map_err(|_| RuntimeError::HeadersAlreadySet)
    }

    /// Header label of element `index` when it is a string.
    pub fn header_at(
        &self,
        index: usize,
    ) -> Option<&Str> {
        self.headers()?.get(index)?.as_str()
    }

    /// Look up an element by its header label.
    pub fn field(
        &self,
        name: &str,
    ) -> Option<&Value> {
        let headers = self.headers()?;
        let pos = headers
            .iter()
            .position(|h| h.as_str().is_some_and(|s| s.as_bytes() == name.as_bytes()))?;
        self.get(pos)
    }

    /// Bound namespace, if any.
    #[inline]
    pub fn namespace(&self) -> Option<&Namespace> {
        self.0.ns.as_ref()
    }

    /// Whether both handles point at the same array.
    #[inline]
    pub fn ptr_eq(
        &self,
        other: &Array,
    ) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity word under `tag` (`Array` or `Struct`).
    pub fn word(
        &self,
        tag: Tag,
    ) -> Word {
        Word::tagged(tag, Rc::as_ptr(&self.0) as usize as u64)
    }
}

/// Structural equality: same length and pairwise equal elements.
/// Headers are ignored.
pub fn ary_eq(
    a: &Array,
    b: &Array,
) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| value_eq(x, y))
}

impl PartialEq for Array {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        ary_eq(self, other)
    }
}

impl fmt::Debug for Array {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut list = f.debug_list();
        list.entries(self.iter());
        list.finish()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Array::from_vec(iter.into_iter().collect())
    }
}
