//! Property value kinds and flags
//!
//! [`ValueKind`] is the closed set of property types a schema may declare.
//! The numeric codes are shared with the core engine and stored as `type`
//! in the metadata file, so they must never change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Declared value kind of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean (1 byte)
    Bool,
    /// Signed 8-bit integer
    Byte,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit character
    Char,
    /// Signed 32-bit integer
    Int,
    /// Signed 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Milliseconds since Unix epoch
    Date,
    /// Nanoseconds since Unix epoch
    DateNano,
    /// Dynamically typed value (null/bool/int/float/string/list/map)
    Flex,
    /// Vector of booleans
    BoolVector,
    /// Raw bytes
    ByteVector,
    /// Vector of 16-bit integers
    ShortVector,
    /// Vector of 16-bit characters
    CharVector,
    /// Vector of 32-bit integers
    IntVector,
    /// Vector of 64-bit integers
    LongVector,
    /// Vector of 32-bit floats
    FloatVector,
    /// Vector of 64-bit floats
    DoubleVector,
    /// Vector of strings
    StringVector,
    /// Vector of millisecond timestamps
    DateVector,
    /// Vector of nanosecond timestamps
    DateNanoVector,
}

impl ValueKind {
    /// Every kind, in code order
    pub const ALL: [ValueKind; 23] = [
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::Short,
        ValueKind::Char,
        ValueKind::Int,
        ValueKind::Long,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::String,
        ValueKind::Date,
        ValueKind::DateNano,
        ValueKind::Flex,
        ValueKind::BoolVector,
        ValueKind::ByteVector,
        ValueKind::ShortVector,
        ValueKind::CharVector,
        ValueKind::IntVector,
        ValueKind::LongVector,
        ValueKind::FloatVector,
        ValueKind::DoubleVector,
        ValueKind::StringVector,
        ValueKind::DateVector,
        ValueKind::DateNanoVector,
    ];

    /// Engine type code (stored as `type` in the metadata file)
    pub const fn code(self) -> u32 {
        match self {
            ValueKind::Bool => 1,
            ValueKind::Byte => 2,
            ValueKind::Short => 3,
            ValueKind::Char => 4,
            ValueKind::Int => 5,
            ValueKind::Long => 6,
            ValueKind::Float => 7,
            ValueKind::Double => 8,
            ValueKind::String => 9,
            ValueKind::Date => 10,
            ValueKind::DateNano => 12,
            ValueKind::Flex => 13,
            ValueKind::BoolVector => 22,
            ValueKind::ByteVector => 23,
            ValueKind::ShortVector => 24,
            ValueKind::CharVector => 25,
            ValueKind::IntVector => 26,
            ValueKind::LongVector => 27,
            ValueKind::FloatVector => 28,
            ValueKind::DoubleVector => 29,
            ValueKind::StringVector => 30,
            ValueKind::DateVector => 31,
            ValueKind::DateNanoVector => 32,
        }
    }

    /// Inverse of [`ValueKind::code`]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    /// Human-readable name for error messages
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Byte => "int8",
            ValueKind::Short => "int16",
            ValueKind::Char => "char",
            ValueKind::Int => "int32",
            ValueKind::Long => "int64",
            ValueKind::Float => "float32",
            ValueKind::Double => "float64",
            ValueKind::String => "string",
            ValueKind::Date => "date",
            ValueKind::DateNano => "date_nano",
            ValueKind::Flex => "flex",
            ValueKind::BoolVector => "bool_vector",
            ValueKind::ByteVector => "bytes",
            ValueKind::ShortVector => "int16_vector",
            ValueKind::CharVector => "char_vector",
            ValueKind::IntVector => "int32_vector",
            ValueKind::LongVector => "int64_vector",
            ValueKind::FloatVector => "float32_vector",
            ValueKind::DoubleVector => "float64_vector",
            ValueKind::StringVector => "string_vector",
            ValueKind::DateVector => "date_vector",
            ValueKind::DateNanoVector => "date_nano_vector",
        }
    }

    /// Integer scalar kinds (valid primary key kinds)
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            ValueKind::Byte | ValueKind::Short | ValueKind::Char | ValueKind::Int | ValueKind::Long
        )
    }

    /// Scalar date kinds
    pub const fn is_date(self) -> bool {
        matches!(self, ValueKind::Date | ValueKind::DateNano)
    }

    /// Vector kinds, raw bytes included
    pub const fn is_vector(self) -> bool {
        self.code() >= 22
    }

    /// Stored inline in the record table (as opposed to behind an offset)
    pub const fn is_inline(self) -> bool {
        self.inline_width().is_some()
    }

    /// Width in bytes of the inline representation, if any
    pub const fn inline_width(self) -> Option<usize> {
        match self {
            ValueKind::Bool | ValueKind::Byte => Some(1),
            ValueKind::Short | ValueKind::Char => Some(2),
            ValueKind::Int | ValueKind::Float => Some(4),
            ValueKind::Long | ValueKind::Double | ValueKind::Date | ValueKind::DateNano => Some(8),
            _ => None,
        }
    }

    /// Element kind of a vector kind
    pub const fn element(self) -> Option<ValueKind> {
        match self {
            ValueKind::BoolVector => Some(ValueKind::Bool),
            ValueKind::ByteVector => Some(ValueKind::Byte),
            ValueKind::ShortVector => Some(ValueKind::Short),
            ValueKind::CharVector => Some(ValueKind::Char),
            ValueKind::IntVector => Some(ValueKind::Int),
            ValueKind::LongVector => Some(ValueKind::Long),
            ValueKind::FloatVector => Some(ValueKind::Float),
            ValueKind::DoubleVector => Some(ValueKind::Double),
            ValueKind::StringVector => Some(ValueKind::String),
            ValueKind::DateVector => Some(ValueKind::Date),
            ValueKind::DateNanoVector => Some(ValueKind::DateNano),
            _ => None,
        }
    }

    /// Units per second for date kinds (and date vectors)
    pub const fn date_units_per_second(self) -> Option<i64> {
        match self {
            ValueKind::Date | ValueKind::DateVector => Some(1_000),
            ValueKind::DateNano | ValueKind::DateNanoVector => Some(1_000_000_000),
            _ => None,
        }
    }

    /// Inclusive integer range representable by an integer kind
    pub const fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            ValueKind::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            ValueKind::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            ValueKind::Char => Some((0, u16::MAX as i64)),
            ValueKind::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            ValueKind::Long | ValueKind::Date | ValueKind::DateNano => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a date property is represented in decoded objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRepr {
    /// Integer epoch in the kind's native unit (ms or ns)
    Int,
    /// Float seconds since epoch
    Float,
    /// `chrono::DateTime<Utc>`
    #[default]
    Timestamp,
}

/// Property flag bitset (values shared with the core engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    /// No flags
    pub const NONE: PropertyFlags = PropertyFlags(0);
    /// Primary key
    pub const ID: PropertyFlags = PropertyFlags(1);
    /// Non-primitive type (engine internal)
    pub const NON_PRIMITIVE_TYPE: PropertyFlags = PropertyFlags(2);
    /// Value may not be null
    pub const NOT_NULL: PropertyFlags = PropertyFlags(4);
    /// Property has a value index
    pub const INDEXED: PropertyFlags = PropertyFlags(8);
    /// Values are unique (requires an index)
    pub const UNIQUE: PropertyFlags = PropertyFlags(32);
    /// IDs are assigned strictly increasing
    pub const ID_MONOTONIC_SEQUENCE: PropertyFlags = PropertyFlags(64);
    /// Application may choose IDs itself
    pub const ID_SELF_ASSIGNABLE: PropertyFlags = PropertyFlags(128);
    /// Null values are not indexed
    pub const INDEX_PARTIAL_SKIP_NULL: PropertyFlags = PropertyFlags(256);
    /// Zero values are not indexed
    pub const INDEX_PARTIAL_SKIP_ZERO: PropertyFlags = PropertyFlags(512);
    /// Not stored, computed
    pub const VIRTUAL: PropertyFlags = PropertyFlags(1024);
    /// Index stores 32-bit hashes
    pub const INDEX_HASH: PropertyFlags = PropertyFlags(2048);
    /// Index stores 64-bit hashes
    pub const INDEX_HASH64: PropertyFlags = PropertyFlags(4096);
    /// Integer is unsigned
    pub const UNSIGNED: PropertyFlags = PropertyFlags(8192);

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Flags from raw bits (unknown bits are kept)
    pub const fn from_bits(bits: u32) -> Self {
        PropertyFlags(bits)
    }

    /// All bits of `other` are set
    pub const fn contains(self, other: PropertyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// No bit set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PropertyFlags {
    type Output = PropertyFlags;

    fn bitor(self, rhs: Self) -> Self {
        PropertyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PropertyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PropertyFlags {
    type Output = PropertyFlags;

    fn bitand(self, rhs: Self) -> Self {
        PropertyFlags(self.0 & rhs.0)
    }
}

impl fmt::Display for PropertyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ValueKind::from_code(11), None); // relations are not a value kind
        assert_eq!(ValueKind::from_code(0), None);
    }

    #[test]
    fn test_inline_kinds() {
        assert_eq!(ValueKind::Bool.inline_width(), Some(1));
        assert_eq!(ValueKind::DateNano.inline_width(), Some(8));
        assert!(!ValueKind::String.is_inline());
        assert!(!ValueKind::Flex.is_inline());
        assert!(ValueKind::ByteVector.is_vector());
        assert!(!ValueKind::Flex.is_vector());
    }

    #[test]
    fn test_integer_kinds() {
        assert!(ValueKind::Long.is_integer());
        assert!(ValueKind::Char.is_integer());
        assert!(!ValueKind::Double.is_integer());
        assert!(!ValueKind::Date.is_integer());
        assert_eq!(ValueKind::Byte.integer_range(), Some((-128, 127)));
    }

    #[test]
    fn test_flags() {
        let flags = PropertyFlags::INDEXED | PropertyFlags::INDEX_HASH;
        assert_eq!(flags.bits(), 2056);
        assert!(flags.contains(PropertyFlags::INDEXED));
        assert!(!flags.contains(PropertyFlags::ID));
        assert!(PropertyFlags::NONE.is_empty());
    }
}
