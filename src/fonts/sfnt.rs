//! sfnt container access.
//!
//! Table lookup goes through `ttf_parser::RawFace`, which only reads the
//! table directory; the subset writers do their own table parsing.

use super::fs_type::FsType;
use super::FontProgram;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use ttf_parser::{RawFace, Tag};

/// Outline flavor of a font program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// `glyf` outlines
    TrueType,
    /// Compact Font Format outlines, bare or in an OpenType `CFF ` table
    Cff,
}

impl FontKind {
    pub fn name(self) -> &'static str {
        match self {
            FontKind::TrueType => "TrueType",
            FontKind::Cff => "CFF",
        }
    }
}

/// Table directory of one face of an sfnt font file.
pub struct SfntFace<'a> {
    raw: RawFace<'a>,
}

impl<'a> SfntFace<'a> {
    /// Read the table directory of `program`'s selected face.
    pub fn parse(program: &'a FontProgram) -> Result<Self> {
        let raw = RawFace::parse(program.data(), program.face_index()).map_err(|e| {
            log::error!("Cannot read sfnt table directory of face {}: {}", program.face_index(), e);
            Error::Font(format!("cannot read sfnt table directory: {}", e))
        })?;
        Ok(Self { raw })
    }

    /// Contents of the table tagged `tag`.
    pub fn table(&self, tag: &[u8; 4]) -> Option<&'a [u8]> {
        self.raw.table(Tag::from_bytes(tag))
    }

    /// Like [`table`](Self::table), but a missing table is an error.
    pub fn required_table(&self, tag: &[u8; 4]) -> Result<&'a [u8]> {
        self.table(tag).ok_or_else(|| {
            let name = String::from_utf8_lossy(tag).trim_end().to_string();
            log::error!("Font has no '{}' table", name);
            Error::MissingTable(name)
        })
    }

    pub fn kind(&self) -> FontKind {
        if self.table(b"CFF ").is_some() && self.table(b"glyf").is_none() {
            FontKind::Cff
        } else {
            FontKind::TrueType
        }
    }

    /// Embedding permissions, when the font has an OS/2 table.
    pub fn fs_type(&self) -> Option<FsType> {
        let os2 = self.table(b"OS/2")?;
        read_u16(os2, 8).ok().map(FsType::from_raw)
    }

    /// `maxp.numGlyphs`.
    pub fn num_glyphs(&self) -> Result<u16> {
        read_u16(self.required_table(b"maxp")?, 4)
    }
}

fn truncated(offset: usize) -> Error {
    Error::Font(format!("font table truncated at offset {}", offset))
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(BigEndian::read_u16)
        .ok_or_else(|| truncated(offset))
}

pub(crate) fn read_i16(data: &[u8], offset: usize) -> Result<i16> {
    data.get(offset..offset + 2)
        .map(BigEndian::read_i16)
        .ok_or_else(|| truncated(offset))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(BigEndian::read_u32)
        .ok_or_else(|| truncated(offset))
}

/// Sum of the big-endian 32-bit words of `data`, zero padded to 4 bytes.
pub(crate) fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(BigEndian::read_u32(&word))
    })
}

/// Assemble an sfnt file from tables; the directory is sorted by tag.
#[cfg(test)]
pub(crate) fn build_sfnt(version: u32, tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut tables: Vec<&(&[u8; 4], Vec<u8>)> = tables.iter().collect();
    tables.sort_by_key(|(tag, _)| **tag);

    let count = tables.len() as u16;
    let mut out = Vec::new();
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(&[0; 6]);

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&table_checksum(data).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    out.extend(body);
    out
}
