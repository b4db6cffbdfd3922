//! CFF subset writer.

use super::charstring::{flatten_glyph, FlattenedGlyph};
use super::dict::{op, patch_placeholder, write_entry, write_integer, write_operator, write_placeholder, Dict};
use super::encoding::{standard_encoding_sid, Encoding, STANDARD_STRINGS};
use super::font::CffFont;
use super::index::write_index;
use crate::error::{Error, Result};
use crate::fonts::sfnt::{FontKind, SfntFace};
use crate::fonts::{FontProgram, FsType, SubsetOutcome};
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;

/// Top DICT operators whose operands are rewritten by the subset.
const REWRITTEN_TOP_OPERATORS: [u16; 7] = [
    op::ROS,
    op::CHARSET,
    op::ENCODING,
    op::CHAR_STRINGS,
    op::PRIVATE,
    op::FD_ARRAY,
    op::FD_SELECT,
];

/// Placeholder positions inside the Top DICT data.
#[derive(Debug, Default)]
struct TopDictPlaceholders {
    charset: usize,
    char_strings: usize,
    /// size, then offset 5 bytes later
    private: Option<usize>,
    encoding: Option<usize>,
    fd_array: Option<usize>,
    fd_select: Option<usize>,
}

impl TopDictPlaceholders {
    fn shift(&mut self, delta: usize) {
        self.charset += delta;
        self.char_strings += delta;
        for position in [&mut self.private, &mut self.encoding, &mut self.fd_array, &mut self.fd_select]
            .into_iter()
            .flatten()
        {
            *position += delta;
        }
    }
}

/// Where the rewritten structures landed.
#[derive(Debug, Default)]
struct SubsetLayout {
    charset: usize,
    char_strings: usize,
    /// Offset or predefined encoding id
    encoding: i32,
    private: Option<(usize, usize)>,
    fd_array: usize,
    fd_select: usize,
}

/// Writes CFF subsets of one font.
pub struct CffSubsetWriter<'a> {
    font: CffFont<'a>,
    fs_type: Option<FsType>,
}

impl<'a> CffSubsetWriter<'a> {
    /// Locate and read the CFF data of `program`.
    pub fn new(program: &'a FontProgram) -> Result<Self> {
        let (data, fs_type) = if program.is_bare_cff() {
            (program.data(), None)
        } else {
            let face = SfntFace::parse(program)?;
            let Some(cff) = face.table(b"CFF ") else {
                log::error!("Font has no CFF table, cannot write a CFF subset");
                return Err(Error::WrongFontKind {
                    expected: FontKind::Cff.name(),
                    found: FontKind::TrueType.name(),
                });
            };
            (cff, face.fs_type())
        };
        Ok(Self {
            font: CffFont::parse(data)?,
            fs_type,
        })
    }

    /// Whether the font is CID keyed.
    pub fn is_cid(&self) -> bool {
        self.font.is_cid()
    }

    pub fn glyph_count(&self) -> usize {
        self.font.glyph_count()
    }

    /// Selected glyphs plus glyph 0 and the components of accented
    /// characters, sorted.
    pub fn glyph_closure(&self, glyphs: &[u32]) -> Result<Vec<u16>> {
        Ok(self.close_selection(glyphs)?.into_keys().collect())
    }

    fn close_selection(&self, glyphs: &[u32]) -> Result<BTreeMap<u16, FlattenedGlyph>> {
        let count = self.font.glyph_count();
        let mut pending = vec![0u16];
        for &glyph in glyphs {
            if glyph as usize >= count {
                log::error!("Glyph {} requested from a CFF font with {} glyphs", glyph, count);
                return Err(Error::GlyphOutOfRange {
                    glyph,
                    count: count as u32,
                });
            }
            pending.push(glyph as u16);
        }

        let mut selected = BTreeMap::new();
        while let Some(gid) = pending.pop() {
            if selected.contains_key(&gid) {
                continue;
            }
            let glyph = flatten_glyph(&self.font, gid)?;
            if let (Some(accented), false) = (glyph.accented, self.font.is_cid()) {
                for code in [accented.base, accented.accent] {
                    pending.push(self.glyph_for_code(gid, code)?);
                }
            }
            selected.insert(gid, glyph);
        }
        Ok(selected)
    }

    /// Glyph of a standard encoding code, through the charset.
    fn glyph_for_code(&self, accented_gid: u16, code: u8) -> Result<u16> {
        let sid = standard_encoding_sid(code);
        let gid = if sid == 0 { None } else { self.font.glyph_for_sid(sid) };
        gid.ok_or_else(|| {
            log::error!("Accented glyph {} refers to code {} which the font does not have", accented_gid, code);
            Error::Font(format!("accented glyph {} refers to missing code {}", accented_gid, code))
        })
    }

    /// Build the subset font program.
    ///
    /// `cid_mapping`, for CID keyed fonts, gives the CID of each entry of
    /// `glyphs`; without it the font's own charset is used. `font_name`
    /// replaces the font's name.
    pub fn write_subset(
        &self,
        glyphs: &[u32],
        cid_mapping: Option<&[u16]>,
        font_name: Option<&str>,
    ) -> Result<SubsetOutcome> {
        if let Some(fs_type) = self.fs_type {
            if !fs_type.can_embed() {
                log::debug!("Font fsType {:#06x} forbids embedding", fs_type.bits());
                return Ok(SubsetOutcome::NotEmbedded);
            }
        }

        let selected = self.close_selection(glyphs)?;
        let subset: Vec<u16> = selected.keys().copied().collect();
        let cids = self.cid_overrides(glyphs, cid_mapping)?;
        let font = &self.font;

        let postscript = match self.fs_type {
            Some(fs_type) if !font.top_dict.contains(op::POSTSCRIPT) => Some(format!("/FSType {} def", fs_type.bits())),
            _ => None,
        };

        let mut out = Vec::new();
        out.write_all(&font.data[..font.header_size])?;
        write_index(&mut out, &[font_name.map_or(font.name, str::as_bytes)])?;

        let postscript_sid = postscript
            .as_ref()
            .map(|_| STANDARD_STRINGS as usize + font.strings.len());
        let (top_dict, mut placeholders) = self.top_dict_segment(postscript_sid)?;
        write_index(&mut out, &[&top_dict])?;
        placeholders.shift(out.len() - top_dict.len());

        match &postscript {
            None => out.write_all(&font.data[font.string_index_range.clone()])?,
            Some(postscript) => {
                let mut strings: Vec<&[u8]> = font.strings.iter().collect();
                strings.push(postscript.as_bytes());
                write_index(&mut out, &strings)?;
            },
        }

        // All subroutines are inlined into the charstrings.
        out.write_u16::<BigEndian>(0)?;

        let mut layout = SubsetLayout::default();
        if let Some(encoding) = &font.encoding {
            layout.encoding = match encoding.predefined_id() {
                Some(id) => id,
                None => to_offset(out.len())?,
            };
            if let Encoding::Custom { codes, supplements } = encoding {
                self.write_encoding(&mut out, &subset, codes, supplements)?;
            }
        }

        layout.charset = out.len();
        out.write_u8(0)?;
        for &gid in &subset[1..] {
            let sid = cids.get(&gid).copied().unwrap_or_else(|| font.glyph_sid(gid));
            out.write_u16::<BigEndian>(sid)?;
        }

        let new_font_dicts = self.new_font_dict_indexes(&subset);
        if font.is_cid() {
            layout.fd_select = out.len();
            self.write_fd_select(&mut out, &subset, &new_font_dicts)?;
        }

        layout.char_strings = out.len();
        let programs: Vec<&[u8]> = selected.values().map(|glyph| glyph.program.as_slice()).collect();
        write_index(&mut out, &programs)?;

        if let Some(private) = &font.private {
            layout.private = Some(write_private_dict(&mut out, &private.dict));
        }

        if font.is_cid() {
            layout.fd_array = self.write_fd_array(&mut out, &new_font_dicts)?;
        }

        patch_placeholder(&mut out, placeholders.charset, to_offset(layout.charset)?);
        patch_placeholder(&mut out, placeholders.char_strings, to_offset(layout.char_strings)?);
        if let (Some(position), Some((size, offset))) = (placeholders.private, layout.private) {
            patch_placeholder(&mut out, position, to_offset(size)?);
            patch_placeholder(&mut out, position + 5, to_offset(offset)?);
        }
        if let Some(position) = placeholders.encoding {
            patch_placeholder(&mut out, position, layout.encoding);
        }
        if let (Some(fd_array), Some(fd_select)) = (placeholders.fd_array, placeholders.fd_select) {
            patch_placeholder(&mut out, fd_array, to_offset(layout.fd_array)?);
            patch_placeholder(&mut out, fd_select, to_offset(layout.fd_select)?);
        }

        log::debug!("CFF subset: {} glyphs, {} bytes", subset.len(), out.len());
        Ok(SubsetOutcome::Embedded(out))
    }

    fn cid_overrides(&self, glyphs: &[u32], cid_mapping: Option<&[u16]>) -> Result<HashMap<u16, u16>> {
        let Some(cid_mapping) = cid_mapping else {
            return Ok(HashMap::new());
        };
        if !self.font.is_cid() {
            log::debug!("Ignoring CID mapping for a font that is not CID keyed");
            return Ok(HashMap::new());
        }
        if cid_mapping.len() != glyphs.len() {
            return Err(Error::Font(format!(
                "CID mapping has {} entries for {} glyphs",
                cid_mapping.len(),
                glyphs.len()
            )));
        }
        Ok(glyphs
            .iter()
            .zip(cid_mapping)
            .map(|(&glyph, &cid)| (glyph as u16, cid))
            .collect())
    }

    /// Top DICT data with placeholders for every offset.
    fn top_dict_segment(&self, postscript_sid: Option<usize>) -> Result<(Vec<u8>, TopDictPlaceholders)> {
        let top_dict = &self.font.top_dict;
        let mut segment = Vec::new();

        if let Some(ros) = top_dict.get(op::ROS) {
            write_entry(&mut segment, op::ROS, ros);
        }
        for (operator, operands) in top_dict.iter() {
            if !REWRITTEN_TOP_OPERATORS.contains(&operator) {
                write_entry(&mut segment, operator, operands);
            }
        }
        if let Some(sid) = postscript_sid {
            write_integer(&mut segment, to_offset(sid)?);
            write_operator(&mut segment, op::POSTSCRIPT);
        }

        let mut placeholders = TopDictPlaceholders {
            charset: write_placeholder(&mut segment),
            ..Default::default()
        };
        write_operator(&mut segment, op::CHARSET);
        placeholders.char_strings = write_placeholder(&mut segment);
        write_operator(&mut segment, op::CHAR_STRINGS);
        if self.font.private.is_some() {
            placeholders.private = Some(write_placeholder(&mut segment));
            write_placeholder(&mut segment);
            write_operator(&mut segment, op::PRIVATE);
        }
        if self.font.is_cid() {
            placeholders.fd_array = Some(write_placeholder(&mut segment));
            write_operator(&mut segment, op::FD_ARRAY);
            placeholders.fd_select = Some(write_placeholder(&mut segment));
            write_operator(&mut segment, op::FD_SELECT);
        } else {
            placeholders.encoding = Some(write_placeholder(&mut segment));
            write_operator(&mut segment, op::ENCODING);
        }
        Ok((segment, placeholders))
    }

    /// Format 0 encoding of the subset, with supplements for its glyphs.
    fn write_encoding(&self, out: &mut Vec<u8>, subset: &[u16], codes: &[u8], supplements: &[(u8, u16)]) -> Result<()> {
        let mut kept_supplements = Vec::new();
        for &gid in subset {
            let sid = self.font.glyph_sid(gid);
            kept_supplements.extend(supplements.iter().filter(|(_, supplement_sid)| *supplement_sid == sid));
        }
        kept_supplements.truncate(255);

        out.write_u8(if kept_supplements.is_empty() { 0 } else { 0x80 })?;
        let count = (subset.len() - 1).min(codes.len()).min(255);
        out.write_u8(count as u8)?;
        for &gid in &subset[1..=count] {
            out.write_u8(codes.get(gid as usize - 1).copied().unwrap_or(0))?;
        }
        if !kept_supplements.is_empty() {
            out.write_u8(kept_supplements.len() as u8)?;
            for (code, sid) in kept_supplements {
                out.write_u8(code)?;
                out.write_u16::<BigEndian>(sid)?;
            }
        }
        Ok(())
    }

    /// New FDArray position of each font DICT the subset uses.
    fn new_font_dict_indexes(&self, subset: &[u16]) -> BTreeMap<u8, u8> {
        let used: BTreeSet<u8> = subset
            .iter()
            .filter_map(|&gid| self.font.font_dict_index(gid))
            .filter(|&fd| (fd as usize) < self.font.font_dicts.len())
            .collect();
        used.into_iter().enumerate().map(|(new, fd)| (fd, new as u8)).collect()
    }

    /// Format 3 FDSelect.
    fn write_fd_select(&self, out: &mut Vec<u8>, subset: &[u16], new_font_dicts: &BTreeMap<u8, u8>) -> Result<()> {
        let mut ranges: Vec<(u16, u8)> = Vec::new();
        for (new_gid, &gid) in subset.iter().enumerate() {
            let fd = self
                .font
                .font_dict_index(gid)
                .and_then(|fd| new_font_dicts.get(&fd).copied())
                .unwrap_or(0);
            if ranges.last().map_or(true, |&(_, current)| current != fd) {
                ranges.push((new_gid as u16, fd));
            }
        }

        out.write_u8(3)?;
        out.write_u16::<BigEndian>(ranges.len() as u16)?;
        for (first, fd) in ranges {
            out.write_u16::<BigEndian>(first)?;
            out.write_u8(fd)?;
        }
        out.write_u16::<BigEndian>(subset.len() as u16)?;
        Ok(())
    }

    /// Private DICTs of the used font DICTs, then the FDArray INDEX.
    /// Returns the FDArray position.
    fn write_fd_array(&self, out: &mut Vec<u8>, new_font_dicts: &BTreeMap<u8, u8>) -> Result<usize> {
        let mut privates = Vec::with_capacity(new_font_dicts.len());
        for &fd in new_font_dicts.keys() {
            let private = self.font.font_dicts[fd as usize].private.as_ref();
            privates.push(private.map(|private| write_private_dict(out, &private.dict)));
        }

        let mut entries = Vec::with_capacity(new_font_dicts.len());
        for (&fd, private) in new_font_dicts.keys().zip(privates) {
            let mut entry = Vec::new();
            for (operator, operands) in self.font.font_dicts[fd as usize].dict.iter() {
                if operator != op::PRIVATE {
                    write_entry(&mut entry, operator, operands);
                }
            }
            if let Some((size, offset)) = private.filter(|&(size, _)| size > 0) {
                write_integer(&mut entry, to_offset(size)?);
                write_integer(&mut entry, to_offset(offset)?);
                write_operator(&mut entry, op::PRIVATE);
            }
            entries.push(entry);
        }

        let position = out.len();
        write_index(out, &entries)?;
        Ok(position)
    }
}

/// Copy a Private DICT without its `Subrs`; returns `(size, offset)`.
fn write_private_dict(out: &mut Vec<u8>, dict: &Dict) -> (usize, usize) {
    let offset = out.len();
    for (operator, operands) in dict.iter() {
        if operator != op::SUBRS {
            write_entry(out, operator, operands);
        }
    }
    (out.len() - offset, offset)
}

fn to_offset(position: usize) -> Result<i32> {
    i32::try_from(position).map_err(|_| Error::Font(format!("offset {} does not fit a CFF operand", position)))
}
