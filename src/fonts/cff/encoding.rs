//! CFF encodings and charsets.

use super::malformed;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Number of strings predefined by the CFF format; custom strings start at
/// this SID.
pub(crate) const STANDARD_STRINGS: u16 = 391;

/// Highest SID covered by the ISOAdobe charset.
const ISO_ADOBE_LAST_SID: u16 = 228;

/// Character code to glyph mapping of a non CID font.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Encoding {
    Standard,
    Expert,
    Custom {
        /// Code of glyph `i + 1`
        codes: Vec<u8>,
        /// Extra `(code, sid)` pairs
        supplements: Vec<(u8, u16)>,
    },
}

impl Encoding {
    /// Parse the encoding named by the top DICT `Encoding` operand.
    pub(crate) fn parse(cff: &[u8], offset: usize) -> Result<Self> {
        match offset {
            0 => return Ok(Encoding::Standard),
            1 => return Ok(Encoding::Expert),
            _ => {},
        }

        let byte = |at: usize| cff.get(at).copied().ok_or_else(|| malformed("encoding is truncated"));
        let format = byte(offset)?;
        let mut position = offset + 1;
        let mut codes = Vec::new();
        match format & 0x7F {
            0 => {
                let count = byte(position)? as usize;
                position += 1;
                for i in 0..count {
                    codes.push(byte(position + i)?);
                }
                position += count;
            },
            1 => {
                let ranges = byte(position)? as usize;
                position += 1;
                for _ in 0..ranges {
                    let first = byte(position)?;
                    let left = byte(position + 1)?;
                    position += 2;
                    for code in 0..=left {
                        codes.push(first.wrapping_add(code));
                    }
                }
            },
            other => return Err(malformed(format!("unknown encoding format {}", other))),
        }

        let mut supplements = Vec::new();
        if format & 0x80 != 0 {
            let count = byte(position)? as usize;
            position += 1;
            for i in 0..count {
                let at = position + i * 3;
                let sid = cff
                    .get(at + 1..at + 3)
                    .map(BigEndian::read_u16)
                    .ok_or_else(|| malformed("encoding supplement is truncated"))?;
                supplements.push((byte(at)?, sid));
            }
        }
        Ok(Encoding::Custom { codes, supplements })
    }

    /// Predefined encoding id, written in place of an offset.
    pub(crate) fn predefined_id(&self) -> Option<i32> {
        match self {
            Encoding::Standard => Some(0),
            Encoding::Expert => Some(1),
            Encoding::Custom { .. } => None,
        }
    }
}

/// Glyph to SID (or CID, for CID keyed fonts) mapping; index 0 is
/// `.notdef`.
pub(crate) fn parse_charset(cff: &[u8], offset: usize, glyph_count: usize) -> Result<Vec<u16>> {
    match offset {
        0 => {
            if glyph_count > ISO_ADOBE_LAST_SID as usize + 1 {
                log::debug!("ISOAdobe charset covers {} of {} glyphs", ISO_ADOBE_LAST_SID + 1, glyph_count);
            }
            return Ok((0..glyph_count as u16).collect());
        },
        1 | 2 => {
            return Err(Error::Unsupported("predefined expert charsets".to_string()));
        },
        _ => {},
    }

    let read_u16 = |at: usize| {
        cff.get(at..at + 2)
            .map(BigEndian::read_u16)
            .ok_or_else(|| malformed("charset is truncated"))
    };
    let format = cff.get(offset).copied().ok_or_else(|| malformed("charset is truncated"))?;
    let mut sids = Vec::with_capacity(glyph_count);
    sids.push(0);
    let mut position = offset + 1;
    match format {
        0 => {
            while sids.len() < glyph_count {
                sids.push(read_u16(position)?);
                position += 2;
            }
        },
        1 | 2 => {
            while sids.len() < glyph_count {
                let first = read_u16(position)?;
                let left = if format == 1 {
                    u16::from(cff.get(position + 2).copied().ok_or_else(|| malformed("charset is truncated"))?)
                } else {
                    read_u16(position + 2)?
                };
                position += if format == 1 { 3 } else { 4 };
                for sid in first..=first.saturating_add(left) {
                    if sids.len() == glyph_count {
                        break;
                    }
                    sids.push(sid);
                }
            }
        },
        other => return Err(malformed(format!("unknown charset format {}", other))),
    }
    Ok(sids)
}

/// SID of the glyph name a standard encoding code maps to, 0 when the code
/// is unassigned.
pub(crate) fn standard_encoding_sid(code: u8) -> u16 {
    match code {
        32..=126 => u16::from(code) - 31,
        161..=175 => u16::from(code) - 65,
        177..=180 => u16::from(code) - 66,
        182..=189 => u16::from(code) - 67,
        191 => 123,
        193..=200 => u16::from(code) - 69,
        202 | 203 => u16::from(code) - 70,
        205..=208 => u16::from(code) - 71,
        225 => 138,
        227 => 139,
        232..=235 => u16::from(code) - 92,
        241 => 144,
        245 => 145,
        248..=251 => u16::from(code) - 102,
        _ => 0,
    }
}
