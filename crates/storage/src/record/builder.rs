//! Record builder
//!
//! Fields are staged first (slot + payload), then laid out front to back by
//! [`RecordBuilder::finish`]. Staging buffers keep their capacity across
//! records, which is what makes pooling builders worthwhile.

use super::{align_up, ROOT_SIZE, SOFFSET_SIZE, VTABLE_HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use ironbox_core::{Error, Result};
use std::ops::Range;

/// Table alignment; the widest inline scalar is 8 bytes
const TABLE_ALIGN: usize = 8;

#[derive(Debug, Clone)]
enum Payload {
    /// Inline little-endian scalar of `width` bytes (low bytes of `bits`)
    Scalar { width: usize, bits: u64 },
    /// Length-prefixed blob staged in `staged[range]`; `align` applies to
    /// the bytes after the u32 prefix
    Blob { align: usize, range: Range<usize> },
    /// String vector; `strings[range]` indexes the staged element strings
    Strings { range: Range<usize> },
}

#[derive(Debug, Clone)]
struct Field {
    slot: usize,
    payload: Payload,
}

/// Builds one record
#[derive(Debug, Default)]
pub struct RecordBuilder {
    fields: Vec<Field>,
    staged: Vec<u8>,
    strings: Vec<Range<usize>>,
    out: Vec<u8>,
}

impl RecordBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop staged fields, keeping allocated capacity
    pub fn reset(&mut self) {
        self.fields.clear();
        self.staged.clear();
        self.strings.clear();
        self.out.clear();
    }

    /// Number of staged fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is staged
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Stage an inline scalar; `width` is 1, 2, 4 or 8 bytes
    pub fn scalar(&mut self, slot: usize, width: usize, bits: u64) {
        debug_assert!(matches!(width, 1 | 2 | 4 | 8));
        self.fields.push(Field {
            slot,
            payload: Payload::Scalar { width, bits },
        });
    }

    /// Stage a UTF-8 string (u32 length, bytes, NUL terminator)
    pub fn string(&mut self, slot: usize, value: &str) -> Result<()> {
        let start = self.staged.len();
        self.staged.write_u32::<LittleEndian>(len_u32(value.len())?)?;
        self.staged.extend_from_slice(value.as_bytes());
        self.staged.push(0);
        self.fields.push(Field {
            slot,
            payload: Payload::Blob {
                align: 4,
                range: start..self.staged.len(),
            },
        });
        Ok(())
    }

    /// Stage a vector of `count` elements of `width` bytes
    ///
    /// `write` appends exactly `count * width` little-endian bytes.
    pub fn vector<F>(&mut self, slot: usize, width: usize, count: usize, write: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let start = self.staged.len();
        self.staged.write_u32::<LittleEndian>(len_u32(count)?)?;
        write(&mut self.staged)?;
        debug_assert_eq!(self.staged.len() - start - 4, count * width);
        self.fields.push(Field {
            slot,
            payload: Payload::Blob {
                align: width.max(4),
                range: start..self.staged.len(),
            },
        });
        Ok(())
    }

    /// Stage raw bytes as a byte vector
    pub fn bytes(&mut self, slot: usize, value: &[u8]) -> Result<()> {
        self.vector(slot, 1, value.len(), |buf| {
            buf.extend_from_slice(value);
            Ok(())
        })
    }

    /// Stage a vector of strings
    pub fn strings<'s, I>(&mut self, slot: usize, items: I) -> Result<()>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let first = self.strings.len();
        for item in items {
            let start = self.staged.len();
            self.staged.write_u32::<LittleEndian>(len_u32(item.len())?)?;
            self.staged.extend_from_slice(item.as_bytes());
            self.staged.push(0);
            self.strings.push(start..self.staged.len());
        }
        self.fields.push(Field {
            slot,
            payload: Payload::Strings {
                range: first..self.strings.len(),
            },
        });
        Ok(())
    }

    /// Lay out the record for a vtable of `slot_count` slots
    ///
    /// Fields staged for slots `>= slot_count` are rejected.
    pub fn finish(&mut self, slot_count: usize) -> Result<Vec<u8>> {
        let vtable_pos = ROOT_SIZE;
        let vtable_len = VTABLE_HEADER_SIZE + 2 * slot_count;
        let table_pos = align_up(vtable_pos + vtable_len, TABLE_ALIGN);

        // Inline layout: soffset first, then each field aligned to its width.
        let mut positions = Vec::with_capacity(self.fields.len());
        let mut cursor = table_pos + SOFFSET_SIZE;
        for field in &self.fields {
            if field.slot >= slot_count {
                return Err(Error::decode(format!(
                    "slot {} outside a vtable of {} slots",
                    field.slot, slot_count
                )));
            }
            let width = match field.payload {
                Payload::Scalar { width, .. } => width,
                Payload::Blob { .. } | Payload::Strings { .. } => 4,
            };
            cursor = align_up(cursor, width);
            positions.push(cursor);
            cursor += width;
        }
        let table_end = cursor;
        let table_len = table_end - table_pos;
        let vtable_len = to_u16(vtable_len, "vtable")?;
        let table_len = to_u16(table_len, "table")?;

        let out = &mut self.out;
        out.clear();
        out.resize(table_end, 0);

        LittleEndian::write_u32(&mut out[0..4], table_pos as u32);
        LittleEndian::write_u16(&mut out[vtable_pos..], vtable_len);
        LittleEndian::write_u16(&mut out[vtable_pos + 2..], table_len);
        LittleEndian::write_i32(&mut out[table_pos..], (table_pos - vtable_pos) as i32);

        for (field, &pos) in self.fields.iter().zip(&positions) {
            let entry = vtable_pos + VTABLE_HEADER_SIZE + 2 * field.slot;
            LittleEndian::write_u16(&mut out[entry..], (pos - table_pos) as u16);

            match &field.payload {
                Payload::Scalar { width, bits } => {
                    let bytes = bits.to_le_bytes();
                    out[pos..pos + width].copy_from_slice(&bytes[..*width]);
                }
                Payload::Blob { align, range } => {
                    let start = blob_start(out.len(), *align);
                    out.resize(start, 0);
                    out.extend_from_slice(&self.staged[range.clone()]);
                    patch_uoffset(out, pos, start)?;
                }
                Payload::Strings { range } => {
                    let count = range.len();
                    let start = blob_start(out.len(), 4);
                    out.resize(start, 0);
                    out.write_u32::<LittleEndian>(len_u32(count)?)?;
                    let slots_pos = out.len();
                    out.resize(slots_pos + 4 * count, 0);
                    for (i, item) in self.strings[range.clone()].iter().enumerate() {
                        let item_pos = blob_start(out.len(), 4);
                        out.resize(item_pos, 0);
                        out.extend_from_slice(&self.staged[item.clone()]);
                        patch_uoffset(out, slots_pos + 4 * i, item_pos)?;
                    }
                    patch_uoffset(out, pos, start)?;
                }
            }
        }

        Ok(out.clone())
    }
}

/// Position for a u32-prefixed blob whose payload must be `align`-aligned
fn blob_start(end: usize, align: usize) -> usize {
    align_up(end + 4, align) - 4
}

fn patch_uoffset(out: &mut [u8], at: usize, target: usize) -> Result<()> {
    let offset = u32::try_from(target - at)
        .map_err(|_| Error::decode(format!("offset {} does not fit a u32", target - at)))?;
    LittleEndian::write_u32(&mut out[at..at + 4], offset);
    Ok(())
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::decode(format!("length {} does not fit a u32", len)))
}

fn to_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::decode(format!("{} of {} bytes exceeds 64 KiB", what, len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_layout() {
        let mut builder = RecordBuilder::new();
        let record = builder.finish(0).unwrap();
        // root (4) + vtable header (4) -> table at 8 holding just the soffset
        assert_eq!(record.len(), 12);
        assert_eq!(LittleEndian::read_u32(&record[0..]), 8);
        assert_eq!(LittleEndian::read_u16(&record[4..]), 4);
        assert_eq!(LittleEndian::read_u16(&record[6..]), 4);
        assert_eq!(LittleEndian::read_i32(&record[8..]), 4);
    }

    #[test]
    fn test_scalars_are_aligned() {
        let mut builder = RecordBuilder::new();
        builder.scalar(0, 1, 0xAB);
        builder.scalar(1, 8, u64::MAX - 1);
        let record = builder.finish(2).unwrap();

        let table = LittleEndian::read_u32(&record[0..]) as usize;
        assert_eq!(table % 8, 0);
        let slot1 = LittleEndian::read_u16(&record[4 + 4 + 2..]) as usize;
        assert_eq!((table + slot1) % 8, 0);
        assert_eq!(LittleEndian::read_u64(&record[table + slot1..]), u64::MAX - 1);
        let slot0 = LittleEndian::read_u16(&record[4 + 4..]) as usize;
        assert_eq!(record[table + slot0], 0xAB);
    }

    #[test]
    fn test_string_blob() {
        let mut builder = RecordBuilder::new();
        builder.string(0, "héllo").unwrap();
        let record = builder.finish(1).unwrap();

        let table = LittleEndian::read_u32(&record[0..]) as usize;
        let field = table + LittleEndian::read_u16(&record[8..]) as usize;
        let target = field + LittleEndian::read_u32(&record[field..]) as usize;
        assert_eq!(target % 4, 0);
        let len = LittleEndian::read_u32(&record[target..]) as usize;
        assert_eq!(&record[target + 4..target + 4 + len], "héllo".as_bytes());
        assert_eq!(record[target + 4 + len], 0);
    }

    #[test]
    fn test_eight_byte_vector_payload_aligned() {
        let mut builder = RecordBuilder::new();
        builder.scalar(0, 1, 1);
        builder
            .vector(1, 8, 2, |buf| {
                buf.write_f64::<LittleEndian>(1.5)?;
                buf.write_f64::<LittleEndian>(-2.5)?;
                Ok(())
            })
            .unwrap();
        let record = builder.finish(2).unwrap();

        let table = LittleEndian::read_u32(&record[0..]) as usize;
        let field = table + LittleEndian::read_u16(&record[10..]) as usize;
        let target = field + LittleEndian::read_u32(&record[field..]) as usize;
        assert_eq!((target + 4) % 8, 0);
        assert_eq!(LittleEndian::read_u32(&record[target..]), 2);
        assert_eq!(LittleEndian::read_f64(&record[target + 4..]), 1.5);
    }

    #[test]
    fn test_slot_outside_vtable_rejected() {
        let mut builder = RecordBuilder::new();
        builder.scalar(3, 4, 1);
        assert!(matches!(builder.finish(2), Err(Error::RecordDecode(_))));
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut builder = RecordBuilder::new();
        builder.string(0, &"x".repeat(256)).unwrap();
        builder.finish(1).unwrap();
        let capacity = builder.staged.capacity();
        builder.reset();
        assert!(builder.is_empty());
        assert_eq!(builder.staged.capacity(), capacity);
    }
}
