//! String values
//!
//! A [`Str`] is a byte string with an explicit length in one of four
//! representations: inline (six bytes or fewer, no allocation), interned
//! (deduplicated and never freed), heap-owned (copied on construction),
//! and static (borrowed `'static` memory the runtime does not own).
//!
//! Short strings are always inline whatever constructor is used, so two
//! short strings with the same bytes always have the same [`Word`].

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::trace;

use super::tag::{Tag, Word};

/// Longest string stored inline.
pub const INLINE_MAX: usize = 6;

/// Process-wide intern table. Entries are leaked and live forever.
static INTERNER: Lazy<Mutex<Interner>> = Lazy::new(|| Mutex::new(Interner::default()));

/// The interning service behind [`Str::intern`].
#[derive(Debug, Default)]
pub struct Interner {
    table: HashSet<&'static [u8]>,
}

impl Interner {
    /// Return the canonical copy of `bytes`, registering it if new.
    pub fn intern(
        &mut self,
        bytes: &[u8],
    ) -> &'static [u8] {
        if let Some(found) = self.table.get(bytes) {
            return *found;
        }
        let leaked: &'static [u8] = Box::leak(bytes.to_vec().into_boxed_slice());
        self.table.insert(leaked);
        trace!(len = bytes.len(), "interned new string");
        leaked
    }

    /// Whether `bytes` sits at the canonical address of an interned entry.
    pub fn contains_ptr(
        &self,
        bytes: &[u8],
    ) -> bool {
        self.table
            .get(bytes)
            .is_some_and(|found| std::ptr::eq(found.as_ptr(), bytes.as_ptr()))
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Number of strings interned so far in this process.
pub fn interned_count() -> usize {
    INTERNER.lock().len()
}

#[derive(Clone)]
enum Repr {
    Inline { len: u8, buf: [u8; INLINE_MAX] },
    Interned(&'static [u8]),
    Owned(Rc<[u8]>),
    Static(&'static [u8]),
}

/// An immutable byte string value.
#[derive(Clone)]
pub struct Str(Repr);

impl Str {
    fn inline(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > INLINE_MAX {
            return None;
        }
        let mut buf = [0u8; INLINE_MAX];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Str(Repr::Inline {
            len: bytes.len() as u8,
            buf,
        }))
    }

    /// Copy `bytes` into a new string.
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        Str::inline(bytes).unwrap_or_else(|| Str(Repr::Owned(Rc::from(bytes))))
    }

    /// The empty string.
    pub fn empty() -> Self {
        Str(Repr::Inline {
            len: 0,
            buf: [0; INLINE_MAX],
        })
    }

    /// Wrap static memory without copying.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Str::inline(bytes).unwrap_or(Str(Repr::Static(bytes)))
    }

    /// Return the canonical interned string with these bytes.
    pub fn intern(bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        if let Some(s) = Str::inline(bytes) {
            return s;
        }
        Str(Repr::Interned(INTERNER.lock().intern(bytes)))
    }

    /// Intern the bytes of an existing string.
    pub fn intern_str(s: &Str) -> Self {
        if s.is_interned() {
            return s.clone();
        }
        Str::intern(s.as_bytes())
    }

    /// Whether equality with other interned strings is identity.
    ///
    /// Inline strings count as interned: their word is their content.
    #[inline]
    pub fn is_interned(&self) -> bool {
        matches!(self.0, Repr::Inline { .. } | Repr::Interned(_))
    }

    /// Byte content.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.0 {
            Repr::Inline { len, buf } => &buf[..*len as usize],
            Repr::Interned(b) | Repr::Static(b) => *b,
            Repr::Owned(b) => &b[..],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Tag of the representation.
    pub fn tag(&self) -> Tag {
        match &self.0 {
            Repr::Inline { len, .. } if *len as usize == INLINE_MAX => Tag::Str6,
            Repr::Inline { .. } => Tag::StrInline,
            Repr::Interned(_) => Tag::Symbol,
            Repr::Owned(_) => Tag::StrOwned,
            Repr::Static(_) => Tag::StrStatic,
        }
    }

    /// Identity word of this string.
    pub fn word(&self) -> Word {
        match &self.0 {
            Repr::Inline { len, buf } => {
                Word::from_inline_str(&buf[..*len as usize]).unwrap_or_else(Word::nil)
            }
            Repr::Interned(b) => Word::tagged(Tag::Symbol, b.as_ptr() as u64),
            Repr::Owned(b) => Word::tagged(Tag::StrOwned, b.as_ptr() as u64),
            Repr::Static(b) => Word::tagged(Tag::StrStatic, b.as_ptr() as u64),
        }
    }

    /// Whether the bytes form a bare identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn is_symbol_like(&self) -> bool {
        let bytes = self.as_bytes();
        match bytes.split_first() {
            Some((first, rest)) => {
                (first.is_ascii_alphabetic() || *first == b'_')
                    && rest.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
            }
            None => false,
        }
    }

    /// Concatenate two strings into a new owned string.
    pub fn concat(
        &self,
        sep: &[u8],
        other: &Str,
    ) -> Str {
        let mut buf = Vec::with_capacity(self.len() + sep.len() + other.len());
        buf.extend_from_slice(self.as_bytes());
        buf.extend_from_slice(sep);
        buf.extend_from_slice(other.as_bytes());
        Str::new(buf)
    }
}

/// String equality: identity when both sides are interned, bytes otherwise.
pub fn str_eq(
    a: &Str,
    b: &Str,
) -> bool {
    if a.is_interned() && b.is_interned() {
        return a.word() == b.word();
    }
    a.as_bytes() == b.as_bytes()
}

impl PartialEq for Str {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        str_eq(self, other)
    }
}

impl Eq for Str {}

impl Hash for Str {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.as_bytes().hash(state);
    }
}

// Hash and Eq both follow the bytes, so maps keyed by `Str` can be
// queried with a byte slice.
impl Borrow<[u8]> for Str {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<&str> for Str {
    fn from(s: &str) -> Self {
        Str::new(s)
    }
}

impl From<String> for Str {
    fn from(s: String) -> Self {
        Str::new(s)
    }
}

impl fmt::Display for Str {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for Str {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

#[cfg(test)]
pub(crate) fn interner_contains(s: &Str) -> bool {
    INTERNER.lock().contains_ptr(s.as_bytes())
}
