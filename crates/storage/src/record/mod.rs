//! Binary record format
//!
//! Records are FlatBuffers-compatible tables, laid out front to back:
//!
//! ```text
//! +---------------------+  0
//! | root uoffset (u32)  | -> table
//! +---------------------+  4
//! | vtable              |  u16 vtable_len, u16 table_len, u16 field offset per slot
//! +---------------------+  (aligned to 8)
//! | table               |  i32 soffset (table - vtable), inline scalars, u32 uoffsets
//! +---------------------+
//! | out-of-line data    |  strings, vectors, string vectors
//! +---------------------+
//! ```
//!
//! All integers are little-endian. A vtable entry of 0 (or a slot past the
//! end of the vtable) marks an absent field.

mod builder;
mod table;

pub use builder::RecordBuilder;
pub use table::TableReader;

/// Size of the root offset
pub(crate) const ROOT_SIZE: usize = 4;

/// `vtable_len` + `table_len`
pub(crate) const VTABLE_HEADER_SIZE: usize = 4;

/// Table-to-vtable signed offset at the start of the table
pub(crate) const SOFFSET_SIZE: usize = 4;

#[inline]
pub(crate) fn align_up(pos: usize, align: usize) -> usize {
    (pos + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 4), 12);
        assert_eq!(align_up(5, 1), 5);
    }
}
