//! Reading the structures of a single-font CFF.

use super::dict::{op, Dict};
use super::encoding::{parse_charset, Encoding};
use super::index::Index;
use super::malformed;
use crate::error::{Error, Result};
use std::ops::Range;

/// DICT operand used as an offset or size; negative values are malformed.
fn dict_offset(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| malformed(format!("negative {} offset {}", what, value)))
}

/// A Private DICT and its local subroutines.
#[derive(Debug, Clone, Default)]
pub(crate) struct PrivateDict<'a> {
    pub(crate) dict: Dict,
    pub(crate) subrs: Index<'a>,
}

impl<'a> PrivateDict<'a> {
    /// Read the Private DICT named by the `Private` entry of `owner`.
    fn parse(cff: &'a [u8], owner: &Dict) -> Result<Option<Self>> {
        let Some((size, offset)) = owner.private_range() else {
            return Ok(None);
        };
        if size <= 0 {
            return Ok(None);
        }
        let (size, offset) = (dict_offset(size, "Private size")?, dict_offset(offset, "Private")?);
        let data = offset
            .checked_add(size)
            .and_then(|end| cff.get(offset..end))
            .ok_or_else(|| malformed(format!("Private DICT {}+{} lies outside the font", offset, size)))?;
        let dict = Dict::parse(data)?;
        let subrs = match dict.integer(op::SUBRS) {
            Some(subrs_offset) => {
                let subrs_offset = offset
                    .checked_add(dict_offset(subrs_offset, "Subrs")?)
                    .ok_or_else(|| malformed("Subrs offset overflows"))?;
                Index::parse(cff, subrs_offset)?.0
            },
            None => Index::default(),
        };
        Ok(Some(Self { dict, subrs }))
    }
}

/// An FDArray entry of a CID keyed font.
#[derive(Debug, Clone)]
pub(crate) struct FontDict<'a> {
    pub(crate) dict: Dict,
    pub(crate) private: Option<PrivateDict<'a>>,
}

/// The first font of a CFF.
pub(crate) struct CffFont<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) header_size: usize,
    pub(crate) name: &'a [u8],
    pub(crate) top_dict: Dict,
    pub(crate) strings: Index<'a>,
    /// Byte range of the String INDEX, for copying it unchanged
    pub(crate) string_index_range: Range<usize>,
    pub(crate) global_subrs: Index<'a>,
    pub(crate) char_strings: Index<'a>,
    /// SID (or CID) per glyph
    pub(crate) charset: Vec<u16>,
    /// `None` for CID keyed fonts
    pub(crate) encoding: Option<Encoding>,
    pub(crate) private: Option<PrivateDict<'a>>,
    pub(crate) font_dicts: Vec<FontDict<'a>>,
    /// Font DICT index per glyph; empty unless CID keyed
    pub(crate) fd_select: Vec<u8>,
}

impl<'a> CffFont<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(malformed("header is truncated"));
        }
        if data[0] != 1 {
            return Err(Error::Unsupported(format!("CFF major version {}", data[0])));
        }
        let header_size = data[2] as usize;

        let (names, position) = Index::parse(data, header_size)?;
        let (top_dicts, position) = Index::parse(data, position)?;
        let string_start = position;
        let (strings, position) = Index::parse(data, position)?;
        let string_index_range = string_start..position;
        let (global_subrs, _) = Index::parse(data, position)?;

        let name = names.get(0).ok_or_else(|| malformed("Name INDEX is empty"))?;
        if names.len() > 1 {
            log::warn!("CFF holds {} fonts, only the first is used", names.len());
        }
        let top_dict = Dict::parse(top_dicts.get(0).ok_or_else(|| malformed("Top DICT INDEX is empty"))?)?;

        if let Some(charstring_type) = top_dict.integer(op::CHARSTRING_TYPE) {
            if charstring_type != 2 {
                return Err(Error::Unsupported(format!("Type {} charstrings", charstring_type)));
            }
        }

        let char_strings_offset = top_dict
            .integer(op::CHAR_STRINGS)
            .ok_or_else(|| malformed("Top DICT has no CharStrings"))?;
        let (char_strings, _) = Index::parse(data, dict_offset(char_strings_offset, "CharStrings")?)?;
        let glyph_count = char_strings.len();
        if glyph_count == 0 {
            return Err(malformed("font has no glyphs"));
        }

        let charset = parse_charset(data, dict_offset(top_dict.integer(op::CHARSET).unwrap_or(0), "charset")?, glyph_count)?;
        let is_cid = top_dict.contains(op::ROS);
        let encoding = if is_cid {
            None
        } else {
            Some(Encoding::parse(data, dict_offset(top_dict.integer(op::ENCODING).unwrap_or(0), "Encoding")?)?)
        };
        let private = PrivateDict::parse(data, &top_dict)?;

        let mut font_dicts = Vec::new();
        let mut fd_select = Vec::new();
        if is_cid {
            let fd_array_offset = top_dict
                .integer(op::FD_ARRAY)
                .ok_or_else(|| malformed("CID font has no FDArray"))?;
            let (fd_array, _) = Index::parse(data, dict_offset(fd_array_offset, "FDArray")?)?;
            for entry in fd_array.iter() {
                let dict = Dict::parse(entry)?;
                let private = PrivateDict::parse(data, &dict)?;
                font_dicts.push(FontDict { dict, private });
            }
            let fd_select_offset = top_dict
                .integer(op::FD_SELECT)
                .ok_or_else(|| malformed("CID font has no FDSelect"))?;
            fd_select = parse_fd_select(data, dict_offset(fd_select_offset, "FDSelect")?, glyph_count)?;
        }

        log::debug!(
            "CFF font '{}': {} glyphs, {} strings{}",
            String::from_utf8_lossy(name),
            glyph_count,
            strings.len(),
            if is_cid { ", CID keyed" } else { "" }
        );

        Ok(Self {
            data,
            header_size,
            name,
            top_dict,
            strings,
            string_index_range,
            global_subrs,
            char_strings,
            charset,
            encoding,
            private,
            font_dicts,
            fd_select,
        })
    }

    pub(crate) fn glyph_count(&self) -> usize {
        self.char_strings.len()
    }

    pub(crate) fn is_cid(&self) -> bool {
        self.top_dict.contains(op::ROS)
    }

    /// SID of a glyph; for CID keyed fonts this is its CID.
    pub(crate) fn glyph_sid(&self, gid: u16) -> u16 {
        self.charset.get(gid as usize).copied().unwrap_or(0)
    }

    /// Glyph named by `sid`.
    pub(crate) fn glyph_for_sid(&self, sid: u16) -> Option<u16> {
        self.charset.iter().position(|&entry| entry == sid).map(|gid| gid as u16)
    }

    pub(crate) fn font_dict_index(&self, gid: u16) -> Option<u8> {
        self.fd_select.get(gid as usize).copied()
    }

    /// Local subroutines in effect for a glyph.
    pub(crate) fn local_subrs(&self, gid: u16) -> Option<&Index<'a>> {
        if self.is_cid() {
            let fd = self.font_dict_index(gid)?;
            self.font_dicts.get(fd as usize)?.private.as_ref().map(|private| &private.subrs)
        } else {
            self.private.as_ref().map(|private| &private.subrs)
        }
    }
}

/// Font DICT index per glyph.
fn parse_fd_select(cff: &[u8], offset: usize, glyph_count: usize) -> Result<Vec<u8>> {
    let byte = |at: usize| cff.get(at).copied().ok_or_else(|| malformed("FDSelect is truncated"));
    let read_u16 = |at: usize| -> Result<u16> { Ok(u16::from(byte(at)?) << 8 | u16::from(byte(at + 1)?)) };

    match byte(offset)? {
        0 => (0..glyph_count).map(|gid| byte(offset + 1 + gid)).collect(),
        3 => {
            let ranges = read_u16(offset + 1)? as usize;
            let mut fds = vec![0u8; glyph_count];
            for i in 0..ranges {
                let at = offset + 3 + i * 3;
                let first = read_u16(at)? as usize;
                let fd = byte(at + 2)?;
                let end = read_u16(at + 3)? as usize;
                if first > end || end > glyph_count {
                    return Err(malformed(format!("FDSelect range {}..{} is invalid", first, end)));
                }
                fds[first..end].fill(fd);
            }
            Ok(fds)
        },
        other => Err(malformed(format!("unknown FDSelect format {}", other))),
    }
}
