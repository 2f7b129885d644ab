//! NaN-boxed value words
//!
//! Every [`Value`](super::Value) projects onto a single 64-bit [`Word`].
//! Non-float kinds live in the negative NaN space: the top 12 bits are all
//! ones and the next 4 bits carry the [`Tag`]. The remaining 48 bits are
//! the payload (small integer, boolean, up to six string bytes, or an
//! address).
//!
//! ```text
//! 0xFFF0 | tag   payload (48 bits)
//! ^^^^^^^^^^^^   ^^^^^^^^^^^^^^^^^
//! ```
//!
//! Any word whose top 12 bits are not all ones is a float, as is the
//! `0xFFF0` family (negative infinity). Float construction canonicalises
//! every NaN to [`CANONICAL_NAN`], a positive quiet NaN, so no float ever
//! lands on a reserved tag pattern.

use std::fmt;

/// Build the high bits of a tag.
const fn make_tag(n: u64) -> u64 {
    (0xFFF0 | n) << 48
}

/// Bits shared by every reserved pattern.
pub const RESERVED_MASK: u64 = make_tag(0x00);

/// Bits selecting a tag.
pub const TAG_MASK: u64 = make_tag(0x0F);

/// Bits holding the payload.
pub const VAL_MASK: u64 = !TAG_MASK;

/// The NaN every float NaN is folded into.
pub const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

/// Value tags, stored in bits 48..52 of a reserved word.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Float family (also negative infinity)
    Nan = make_tag(0x00),
    /// Boolean
    Bool = make_tag(0x01),
    /// 32-bit signed integer
    Int = make_tag(0x02),
    /// Array
    Array = make_tag(0x04),
    /// Struct (labeled array)
    Struct = make_tag(0x05),
    /// Interned string
    Symbol = make_tag(0x06),
    /// Inline string of at most five bytes
    StrInline = make_tag(0x07),
    /// Inline string of exactly six bytes
    Str6 = make_tag(0x08),
    /// Heap-owned string
    StrOwned = make_tag(0x09),
    /// Static or foreign string bytes
    StrStatic = make_tag(0x0A),
    /// Native function
    CFunc = make_tag(0x0B),
    /// Pointer object (nil, stream, io)
    Ptr = make_tag(0x0D),
    /// Foreign object
    Foreign = make_tag(0x0F),
}

impl Tag {
    /// Decode the tag nibble of a word.
    ///
    /// Returns `Tag::Nan` for floats and `None` for the unused nibbles.
    pub fn of(bits: u64) -> Option<Tag> {
        if is_float_bits(bits) {
            return Some(Tag::Nan);
        }
        let tag = match bits & TAG_MASK {
            t if t == Tag::Bool as u64 => Tag::Bool,
            t if t == Tag::Int as u64 => Tag::Int,
            t if t == Tag::Array as u64 => Tag::Array,
            t if t == Tag::Struct as u64 => Tag::Struct,
            t if t == Tag::Symbol as u64 => Tag::Symbol,
            t if t == Tag::StrInline as u64 => Tag::StrInline,
            t if t == Tag::Str6 as u64 => Tag::Str6,
            t if t == Tag::StrOwned as u64 => Tag::StrOwned,
            t if t == Tag::StrStatic as u64 => Tag::StrStatic,
            t if t == Tag::CFunc as u64 => Tag::CFunc,
            t if t == Tag::Ptr as u64 => Tag::Ptr,
            t if t == Tag::Foreign as u64 => Tag::Foreign,
            _ => return None,
        };
        Some(tag)
    }

    /// Whether this tag belongs to the string family.
    #[inline]
    pub fn is_string(self) -> bool {
        matches!(
            self,
            Tag::Symbol | Tag::StrInline | Tag::Str6 | Tag::StrOwned | Tag::StrStatic
        )
    }

    /// Whether this tag is an array or a struct.
    #[inline]
    pub fn is_array(self) -> bool {
        matches!(self, Tag::Array | Tag::Struct)
    }
}

#[inline]
fn is_float_bits(bits: u64) -> bool {
    (bits & RESERVED_MASK) != RESERVED_MASK || (bits & TAG_MASK) == Tag::Nan as u64
}

/// A 64-bit tagged word.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Word(u64);

impl Word {
    /// Reinterpret raw bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Word(bits)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Combine a tag and a payload. Payload bits above 48 are dropped.
    #[inline]
    pub const fn tagged(tag: Tag, payload: u64) -> Self {
        Word(tag as u64 | (payload & VAL_MASK))
    }

    /// The nil word (null pointer).
    #[inline]
    pub const fn nil() -> Self {
        Word::tagged(Tag::Ptr, 0)
    }

    #[inline]
    pub const fn from_bool(b: bool) -> Self {
        Word::tagged(Tag::Bool, b as u64)
    }

    #[inline]
    pub const fn from_int(i: i32) -> Self {
        Word::tagged(Tag::Int, i as u32 as u64)
    }

    /// Encode a float, folding every NaN into [`CANONICAL_NAN`].
    #[inline]
    pub fn from_float(f: f64) -> Self {
        if f.is_nan() {
            Word(CANONICAL_NAN)
        } else {
            Word(f.to_bits())
        }
    }

    /// Encode an address under the pointer tag.
    #[inline]
    pub const fn from_ptr(addr: usize) -> Self {
        Word::tagged(Tag::Ptr, addr as u64)
    }

    /// Encode an address under the foreign tag.
    #[inline]
    pub const fn from_foreign(addr: usize) -> Self {
        Word::tagged(Tag::Foreign, addr as u64)
    }

    /// Encode a native function address.
    #[inline]
    pub const fn from_cfunc(addr: usize) -> Self {
        Word::tagged(Tag::CFunc, addr as u64)
    }

    /// Pack up to six bytes inline. Longer input returns `None`.
    pub fn from_inline_str(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            6 => {
                let mut payload = 0u64;
                for (i, b) in bytes.iter().enumerate() {
                    payload |= (*b as u64) << (8 * i);
                }
                Some(Word::tagged(Tag::Str6, payload))
            }
            len @ 0..=5 => {
                let mut payload = (len as u64) << 40;
                for (i, b) in bytes.iter().enumerate() {
                    payload |= (*b as u64) << (8 * i);
                }
                Some(Word::tagged(Tag::StrInline, payload))
            }
            _ => None,
        }
    }

    /// Tag of this word (`Tag::Nan` for floats).
    #[inline]
    pub fn tag(self) -> Option<Tag> {
        Tag::of(self.0)
    }

    /// 48-bit payload.
    #[inline]
    pub const fn payload(self) -> u64 {
        self.0 & VAL_MASK
    }

    #[inline]
    fn has_tag(self, tag: Tag) -> bool {
        !is_float_bits(self.0) && (self.0 & TAG_MASK) == tag as u64
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self == Word::nil()
    }

    #[inline]
    pub fn is_bool(self) -> bool {
        self.has_tag(Tag::Bool)
    }

    #[inline]
    pub fn is_int(self) -> bool {
        self.has_tag(Tag::Int)
    }

    /// Whether this word is a float: the canonical NaN or any pattern
    /// outside the reserved tag space.
    #[inline]
    pub fn is_float(self) -> bool {
        self.0 == CANONICAL_NAN || is_float_bits(self.0)
    }

    #[inline]
    pub fn is_number(self) -> bool {
        self.is_int() || self.is_float()
    }

    #[inline]
    pub fn is_string(self) -> bool {
        self.tag().is_some_and(Tag::is_string)
    }

    #[inline]
    pub fn is_array(self) -> bool {
        self.tag().is_some_and(Tag::is_array)
    }

    #[inline]
    pub fn is_cfunc(self) -> bool {
        self.has_tag(Tag::CFunc)
    }

    #[inline]
    pub fn is_ptr(self) -> bool {
        self.has_tag(Tag::Ptr)
    }

    /// Decode a boolean. Nil decodes as false.
    pub fn to_bool(self) -> bool {
        assert!(
            self.is_bool() || self.is_nil(),
            "to_bool on non-boolean word {:?}",
            self
        );
        self.payload() != 0
    }

    /// Decode an integer; floats truncate.
    pub fn to_int(self) -> i32 {
        if self.is_int() {
            self.payload() as u32 as i32
        } else {
            assert!(self.is_float(), "to_int on non-number word {:?}", self);
            f64::from_bits(self.0) as i32
        }
    }

    /// Decode a float; integers widen.
    pub fn to_float(self) -> f64 {
        if self.is_int() {
            self.to_int() as f64
        } else {
            assert!(self.is_float(), "to_float on non-number word {:?}", self);
            f64::from_bits(self.0)
        }
    }

    /// Decode an address payload.
    pub fn to_ptr(self) -> usize {
        assert!(
            self.is_ptr() || self.has_tag(Tag::Foreign) || self.is_cfunc(),
            "to_ptr on non-pointer word {:?}",
            self
        );
        self.payload() as usize
    }

    /// Decode inline string bytes into `buf`, returning the length.
    pub fn inline_str(self, buf: &mut [u8; 6]) -> Option<usize> {
        let len = match self.tag()? {
            Tag::Str6 => 6,
            Tag::StrInline => ((self.payload() >> 40) & 0xFF) as usize,
            _ => return None,
        };
        for (i, slot) in buf.iter_mut().enumerate().take(len) {
            *slot = (self.payload() >> (8 * i)) as u8;
        }
        Some(len)
    }
}

impl fmt::Debug for Word {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.tag() {
            Some(Tag::Nan) => write!(f, "Word(float {:#018x})", self.0),
            Some(tag) => write!(f, "Word({:?} {:#014x})", tag, self.payload()),
            None => write!(f, "Word(reserved {:#018x})", self.0),
        }
    }
}
