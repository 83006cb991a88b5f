//! Bounds-checked record reader

use super::{ROOT_SIZE, SOFFSET_SIZE, VTABLE_HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use ironbox_core::{Error, Result};

/// Read-only view of one record
///
/// Construction validates the root, vtable and table bounds; every field
/// accessor validates its own offsets. Nothing here panics on malformed
/// input.
#[derive(Debug, Clone, Copy)]
pub struct TableReader<'a> {
    buf: &'a [u8],
    table_pos: usize,
    table_len: usize,
    vtable_pos: usize,
    vtable_len: usize,
}

impl<'a> TableReader<'a> {
    /// Parse the record header
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let table_pos = read_u32(buf, 0)? as usize;
        if table_pos < ROOT_SIZE {
            return Err(Error::decode(format!("root offset {} points into the header", table_pos)));
        }
        let soffset = i64::from(read_i32(buf, table_pos)?);
        let vtable_pos = table_pos as i64 - soffset;
        if vtable_pos < 0 || vtable_pos as usize + VTABLE_HEADER_SIZE > buf.len() {
            return Err(Error::decode(format!("vtable position {} out of bounds", vtable_pos)));
        }
        let vtable_pos = vtable_pos as usize;
        let vtable_len = read_u16(buf, vtable_pos)? as usize;
        let table_len = read_u16(buf, vtable_pos + 2)? as usize;

        if vtable_len < VTABLE_HEADER_SIZE || vtable_len % 2 != 0 {
            return Err(Error::decode(format!("invalid vtable length {}", vtable_len)));
        }
        if vtable_pos + vtable_len > buf.len() {
            return Err(Error::decode("vtable exceeds the record"));
        }
        if table_len < SOFFSET_SIZE || table_pos + table_len > buf.len() {
            return Err(Error::decode(format!(
                "table of {} bytes at {} exceeds a record of {} bytes",
                table_len,
                table_pos,
                buf.len()
            )));
        }

        Ok(TableReader {
            buf,
            table_pos,
            table_len,
            vtable_pos,
            vtable_len,
        })
    }

    /// Number of slots the writer's vtable declares
    pub fn slot_count(&self) -> usize {
        (self.vtable_len - VTABLE_HEADER_SIZE) / 2
    }

    /// Absolute position of a present field of `width` bytes
    fn field_pos(&self, slot: usize, width: usize) -> Result<Option<usize>> {
        if slot >= self.slot_count() {
            return Ok(None);
        }
        let entry = self.vtable_pos + VTABLE_HEADER_SIZE + 2 * slot;
        let offset = read_u16(self.buf, entry)? as usize;
        if offset == 0 {
            return Ok(None);
        }
        if offset < SOFFSET_SIZE || offset + width > self.table_len {
            return Err(Error::decode(format!(
                "slot {} at offset {} (width {}) outside a table of {} bytes",
                slot, offset, width, self.table_len
            )));
        }
        Ok(Some(self.table_pos + offset))
    }

    /// Inline scalar bytes, `None` if the slot is absent
    pub fn scalar(&self, slot: usize, width: usize) -> Result<Option<&'a [u8]>> {
        Ok(self
            .field_pos(slot, width)?
            .map(|pos| &self.buf[pos..pos + width]))
    }

    /// Target of the forward offset stored in `slot`
    fn indirect(&self, slot: usize) -> Result<Option<usize>> {
        match self.field_pos(slot, 4)? {
            Some(pos) => follow(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    /// String field
    pub fn string(&self, slot: usize) -> Result<Option<&'a str>> {
        match self.indirect(slot)? {
            Some(target) => read_str(self.buf, target).map(Some),
            None => Ok(None),
        }
    }

    /// Vector field as raw element bytes plus element count
    pub fn vector(&self, slot: usize, width: usize) -> Result<Option<(&'a [u8], usize)>> {
        let target = match self.indirect(slot)? {
            Some(target) => target,
            None => return Ok(None),
        };
        let count = read_u32(self.buf, target)? as usize;
        let start = target + 4;
        let end = count
            .checked_mul(width)
            .and_then(|len| start.checked_add(len))
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::decode(format!("vector of {} x {} bytes exceeds the record", count, width))
            })?;
        Ok(Some((&self.buf[start..end], count)))
    }

    /// String vector field
    pub fn strings(&self, slot: usize) -> Result<Option<Vec<&'a str>>> {
        let (offsets, count) = match self.vector(slot, 4)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let base = offsets.as_ptr() as usize - self.buf.as_ptr() as usize;
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            let target = follow(self.buf, base + 4 * i)?;
            items.push(read_str(self.buf, target)?);
        }
        Ok(Some(items))
    }
}

fn follow(buf: &[u8], pos: usize) -> Result<usize> {
    let offset = read_u32(buf, pos)? as usize;
    pos.checked_add(offset)
        .filter(|&target| target < buf.len())
        .ok_or_else(|| Error::decode(format!("offset {} at {} points past the record", offset, pos)))
}

fn read_str(buf: &[u8], target: usize) -> Result<&str> {
    let len = read_u32(buf, target)? as usize;
    let start = target + 4;
    // payload plus NUL terminator
    let bytes = start
        .checked_add(len)
        .filter(|&end| end < buf.len() && buf[end] == 0)
        .map(|end| &buf[start..end])
        .ok_or_else(|| Error::decode(format!("string of {} bytes exceeds the record", len)))?;
    std::str::from_utf8(bytes).map_err(|e| Error::decode(format!("invalid UTF-8 string: {}", e)))
}

fn bytes_at(buf: &[u8], pos: usize, width: usize) -> Result<&[u8]> {
    pos.checked_add(width)
        .filter(|&end| end <= buf.len())
        .map(|end| &buf[pos..end])
        .ok_or_else(|| {
            Error::decode(format!(
                "read of {} bytes at {} exceeds a record of {} bytes",
                width,
                pos,
                buf.len()
            ))
        })
}

fn read_u16(buf: &[u8], pos: usize) -> Result<u16> {
    bytes_at(buf, pos, 2).map(LittleEndian::read_u16)
}

fn read_u32(buf: &[u8], pos: usize) -> Result<u32> {
    bytes_at(buf, pos, 4).map(LittleEndian::read_u32)
}

fn read_i32(buf: &[u8], pos: usize) -> Result<i32> {
    bytes_at(buf, pos, 4).map(LittleEndian::read_i32)
}
