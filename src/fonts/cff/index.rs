//! CFF INDEX: a counted array of variable sized objects.

use super::malformed;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::Write;

/// An INDEX borrowed from the font data.
#[derive(Debug, Clone, Default)]
pub(crate) struct Index<'a> {
    data: &'a [u8],
    /// `count + 1` zero based offsets into `data`
    offsets: Vec<usize>,
}

impl<'a> Index<'a> {
    /// Parse the INDEX at `position` of `cff`. Also returns the position
    /// right after it.
    pub(crate) fn parse(cff: &'a [u8], position: usize) -> Result<(Self, usize)> {
        let truncated = || malformed(format!("INDEX at {} is truncated", position));
        let after_count = position.checked_add(2).ok_or_else(truncated)?;
        let count = cff
            .get(position..after_count)
            .map(BigEndian::read_u16)
            .ok_or_else(truncated)? as usize;
        if count == 0 {
            return Ok((Self::default(), after_count));
        }

        let off_size = cff.get(after_count).copied().unwrap_or(0) as usize;
        if !(1..=4).contains(&off_size) {
            return Err(malformed(format!("INDEX at {} has offset size {}", position, off_size)));
        }

        let offsets_start = after_count + 1;
        let mut offsets = Vec::with_capacity(count + 1);
        for i in 0..=count {
            let at = offsets_start + i * off_size;
            let raw = cff
                .get(at..at + off_size)
                .ok_or_else(|| malformed(format!("INDEX at {} offsets are truncated", position)))?;
            let offset = BigEndian::read_uint(raw, off_size) as usize;
            if offset == 0 || offsets.last().is_some_and(|&previous| offset - 1 < previous) {
                return Err(malformed(format!("INDEX at {} has unordered offsets", position)));
            }
            offsets.push(offset - 1);
        }

        let data_start = offsets_start + (count + 1) * off_size;
        let data_end = data_start.checked_add(offsets[count]).ok_or_else(truncated)?;
        let data = cff
            .get(data_start..data_end)
            .ok_or_else(|| malformed(format!("INDEX at {} data is truncated", position)))?;
        Ok((Self { data, offsets }, data_end))
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get(&self, index: usize) -> Option<&'a [u8]> {
        let start = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        self.data.get(start..end)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

/// Smallest offset size able to hold `offset`.
pub(crate) fn offset_size(offset: usize) -> u8 {
    match offset {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Write `items` as an INDEX.
pub(crate) fn write_index<W: Write, T: AsRef<[u8]>>(out: &mut W, items: &[T]) -> Result<()> {
    let count = u16::try_from(items.len()).map_err(|_| Error::Font(format!("{} INDEX entries", items.len())))?;
    out.write_u16::<BigEndian>(count)?;
    if count == 0 {
        return Ok(());
    }

    let total: usize = items.iter().map(|item| item.as_ref().len()).sum();
    let off_size = offset_size(total + 1);
    out.write_u8(off_size)?;
    let mut offset = 1usize;
    out.write_uint::<BigEndian>(offset as u64, off_size as usize)?;
    for item in items {
        offset += item.as_ref().len();
        out.write_uint::<BigEndian>(offset as u64, off_size as usize)?;
    }
    for item in items {
        out.write_all(item.as_ref())?;
    }
    Ok(())
}
