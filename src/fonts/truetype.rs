//! TrueType subset writer.
//!
//! The subset keeps the original glyph numbering: the output has
//! `max(selected gid) + 1` glyphs, and glyphs outside the selection are
//! written with zero length. The file is produced in one pass with empty
//! directory entries, which are patched with checksum, offset and length as
//! each table is completed. `head.checkSumAdjustment` is set last.

use super::sfnt::{read_i16, read_u16, read_u32, table_checksum, FontKind, SfntFace};
use super::{FontProgram, SubsetOutcome};
use crate::error::{Error, Result};
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::BTreeSet;
use std::io::{Cursor, Seek, SeekFrom, Write};

/// Directory order of the tables that can be carried over.
const TABLE_ORDER: [&[u8; 4]; 12] = [
    b"OS/2", b"cmap", b"cvt ", b"fpgm", b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp", b"name", b"prep",
];

const REQUIRED_TABLES: [&[u8; 4]; 6] = [b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp"];

const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

// Composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Glyph outlines located through `loca`.
struct GlyphTable<'a> {
    glyf: &'a [u8],
    loca: Vec<u32>,
}

impl<'a> GlyphTable<'a> {
    fn parse(face: &SfntFace<'a>, num_glyphs: u16) -> Result<Self> {
        let head = face.required_table(b"head")?;
        let loca_data = face.required_table(b"loca")?;
        let glyf = face.required_table(b"glyf")?;
        let long_offsets = read_i16(head, 50)? != 0;

        let entries = num_glyphs as usize + 1;
        let mut loca = Vec::with_capacity(entries);
        for i in 0..entries {
            let offset = if long_offsets {
                read_u32(loca_data, i * 4)?
            } else {
                u32::from(read_u16(loca_data, i * 2)?) * 2
            };
            loca.push(offset);
        }
        Ok(Self { glyf, loca })
    }

    fn glyph(&self, gid: u16) -> Result<&'a [u8]> {
        let start = self.loca[gid as usize] as usize;
        let end = self.loca[gid as usize + 1] as usize;
        self.glyf.get(start..end).ok_or_else(|| {
            log::error!("Glyph {} spans {}..{} outside glyf ({} bytes)", gid, start, end, self.glyf.len());
            Error::Font(format!("glyph {} lies outside the glyf table", gid))
        })
    }

    /// Component glyph ids of a composite glyph; empty for simple glyphs.
    fn components(&self, gid: u16) -> Result<Vec<u16>> {
        let data = self.glyph(gid)?;
        if data.len() < 10 || read_i16(data, 0)? >= 0 {
            return Ok(Vec::new());
        }

        let mut components = Vec::new();
        let mut offset = 10;
        loop {
            let flags = read_u16(data, offset)?;
            components.push(read_u16(data, offset + 2)?);
            offset += 4;
            offset += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
            if flags & WE_HAVE_A_SCALE != 0 {
                offset += 2;
            } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                offset += 4;
            } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                offset += 8;
            }
            if flags & MORE_COMPONENTS == 0 {
                break;
            }
        }
        Ok(components)
    }
}

/// Writes TrueType subsets of one font.
pub struct TrueTypeSubsetWriter<'a> {
    face: SfntFace<'a>,
}

impl<'a> TrueTypeSubsetWriter<'a> {
    /// Open the font's table directory.
    pub fn new(program: &'a FontProgram) -> Result<Self> {
        if program.is_bare_cff() {
            return Err(Error::WrongFontKind {
                expected: FontKind::TrueType.name(),
                found: FontKind::Cff.name(),
            });
        }
        let face = SfntFace::parse(program)?;
        if face.kind() != FontKind::TrueType {
            log::error!("Font has CFF outlines, cannot write a TrueType subset");
            return Err(Error::WrongFontKind {
                expected: FontKind::TrueType.name(),
                found: face.kind().name(),
            });
        }
        Ok(Self { face })
    }

    /// Selected glyphs plus glyph 0 and every composite component, sorted.
    pub fn glyph_closure(&self, glyphs: &[u32]) -> Result<Vec<u16>> {
        let num_glyphs = self.face.num_glyphs()?;
        let glyph_table = GlyphTable::parse(&self.face, num_glyphs)?;
        self.close_selection(&glyph_table, num_glyphs, glyphs)
    }

    fn close_selection(&self, glyph_table: &GlyphTable<'_>, num_glyphs: u16, glyphs: &[u32]) -> Result<Vec<u16>> {
        let out_of_range = |glyph: u32| {
            log::error!("Glyph {} requested from a font with {} glyphs", glyph, num_glyphs);
            Error::GlyphOutOfRange {
                glyph,
                count: u32::from(num_glyphs),
            }
        };

        let mut selected = BTreeSet::from([0u16]);
        for &glyph in glyphs {
            if glyph >= u32::from(num_glyphs) {
                return Err(out_of_range(glyph));
            }
            selected.insert(glyph as u16);
        }

        let mut pending: Vec<u16> = selected.iter().copied().collect();
        while let Some(gid) = pending.pop() {
            for component in glyph_table.components(gid)? {
                if component >= num_glyphs {
                    return Err(out_of_range(u32::from(component)));
                }
                if selected.insert(component) {
                    pending.push(component);
                }
            }
        }
        Ok(selected.into_iter().collect())
    }

    /// Build the subset font program for `glyphs`.
    pub fn write_subset(&self, glyphs: &[u32]) -> Result<SubsetOutcome> {
        if let Some(fs_type) = self.face.fs_type() {
            if !fs_type.can_embed() {
                log::debug!("Font fsType {:#06x} forbids embedding", fs_type.bits());
                return Ok(SubsetOutcome::NotEmbedded);
            }
        }
        for tag in REQUIRED_TABLES {
            self.face.required_table(tag)?;
        }

        let num_glyphs = self.face.num_glyphs()?;
        let glyph_table = GlyphTable::parse(&self.face, num_glyphs)?;
        let subset = self.close_selection(&glyph_table, num_glyphs, glyphs)?;
        let glyph_count = subset.last().map_or(1, |&gid| gid + 1);

        let mut emitter = TableEmitter::new(&self.face)?;

        let mut head = self.face.required_table(b"head")?.to_vec();
        if head.len() < 54 {
            return Err(Error::Font("head table is truncated".to_string()));
        }
        head[8..12].fill(0);
        head[50..52].copy_from_slice(&1u16.to_be_bytes());
        let head_position = emitter.write_table(b"head", &head)?;

        let mut hhea = self.face.required_table(b"hhea")?.to_vec();
        let number_of_hmetrics = read_u16(&hhea, 34)?;
        if number_of_hmetrics > glyph_count {
            hhea[34..36].copy_from_slice(&glyph_count.to_be_bytes());
        }
        emitter.write_table(b"hhea", &hhea)?;

        let hmtx = self.subset_hmtx(number_of_hmetrics, glyph_count)?;
        emitter.write_table(b"hmtx", &hmtx)?;

        let mut maxp = self.face.required_table(b"maxp")?.to_vec();
        maxp[4..6].copy_from_slice(&glyph_count.to_be_bytes());
        emitter.write_table(b"maxp", &maxp)?;

        for tag in [b"cvt ", b"fpgm", b"prep", b"name", b"OS/2", b"cmap"] {
            if let Some(table) = self.face.table(tag) {
                emitter.write_table(tag, table)?;
            }
        }

        let (glyf, loca) = subset_glyphs(&glyph_table, &subset, glyph_count)?;
        emitter.write_table(b"glyf", &glyf)?;
        let mut loca_bytes = Vec::with_capacity(loca.len() * 4);
        for offset in loca {
            loca_bytes.write_u32::<BigEndian>(offset)?;
        }
        emitter.write_table(b"loca", &loca_bytes)?;

        let program = emitter.finish(head_position + 8)?;
        log::debug!(
            "TrueType subset: {} glyphs selected, {} in output, {} bytes",
            subset.len(),
            glyph_count,
            program.len()
        );
        Ok(SubsetOutcome::Embedded(program))
    }

    /// Metrics for the first `glyph_count` glyphs.
    fn subset_hmtx(&self, number_of_hmetrics: u16, glyph_count: u16) -> Result<Vec<u8>> {
        let hmtx = self.face.required_table(b"hmtx")?;
        let long_metrics = number_of_hmetrics.min(glyph_count) as usize;
        let mut out = Vec::with_capacity(glyph_count as usize * 4);
        for i in 0..long_metrics {
            out.write_u16::<BigEndian>(read_u16(hmtx, i * 4)?)?;
            out.write_i16::<BigEndian>(read_i16(hmtx, i * 4 + 2)?)?;
        }
        let bearings_start = number_of_hmetrics as usize * 4;
        for i in long_metrics..glyph_count as usize {
            let bearing = if i < number_of_hmetrics as usize {
                read_i16(hmtx, i * 4 + 2)?
            } else {
                read_i16(hmtx, bearings_start + (i - number_of_hmetrics as usize) * 2).unwrap_or(0)
            };
            out.write_i16::<BigEndian>(bearing)?;
        }
        Ok(out)
    }
}

/// New glyf data and long loca offsets for glyphs `0..glyph_count`.
fn subset_glyphs(glyph_table: &GlyphTable<'_>, subset: &[u16], glyph_count: u16) -> Result<(Vec<u8>, Vec<u32>)> {
    let mut glyf = Vec::new();
    let mut loca = Vec::with_capacity(glyph_count as usize + 1);
    let mut selected = subset.iter().peekable();
    for gid in 0..glyph_count {
        loca.push(glyf.len() as u32);
        if selected.peek() == Some(&&gid) {
            selected.next();
            glyf.extend_from_slice(glyph_table.glyph(gid)?);
        }
    }
    loca.push(glyf.len() as u32);
    Ok((glyf, loca))
}

/// Writes the sfnt header and tables, patching directory entries.
struct TableEmitter {
    out: Cursor<Vec<u8>>,
    entries: Vec<([u8; 4], u64)>,
}

impl TableEmitter {
    /// Write the header and an empty directory entry for every present table.
    fn new(face: &SfntFace<'_>) -> Result<Self> {
        let tags: Vec<&[u8; 4]> = TABLE_ORDER.into_iter().filter(|tag| face.table(tag).is_some()).collect();
        let table_count = tags.len() as u16;
        let entry_selector = 15 - table_count.leading_zeros() as u16;
        let search_range = (1u16 << entry_selector) * 16;

        let mut out = Cursor::new(Vec::new());
        out.write_u32::<BigEndian>(0x0001_0000)?;
        out.write_u16::<BigEndian>(table_count)?;
        out.write_u16::<BigEndian>(search_range)?;
        out.write_u16::<BigEndian>(entry_selector)?;
        out.write_u16::<BigEndian>(table_count * 16 - search_range)?;

        let mut entries = Vec::with_capacity(tags.len());
        for tag in tags {
            out.write_all(tag)?;
            entries.push((*tag, out.position()));
            out.write_all(&[0; 12])?;
        }
        Ok(Self { out, entries })
    }

    /// Append a table, pad it to 4 bytes and fill in its directory entry.
    /// Returns the table's offset.
    fn write_table(&mut self, tag: &[u8; 4], data: &[u8]) -> Result<u64> {
        let entry_position = self
            .entries
            .iter()
            .find(|(entry_tag, _)| entry_tag == tag)
            .map(|(_, position)| *position)
            .ok_or_else(|| Error::Font(format!("no directory entry for '{}'", String::from_utf8_lossy(tag))))?;

        let table_position = self.out.position();
        self.out.write_all(data)?;
        let padding = (4 - data.len() % 4) % 4;
        self.out.write_all(&[0; 3][..padding])?;
        let end_position = self.out.position();

        let checksum = table_checksum(data);
        self.out.seek(SeekFrom::Start(entry_position))?;
        self.out.write_u32::<BigEndian>(checksum)?;
        self.out.write_u32::<BigEndian>(table_position as u32)?;
        self.out.write_u32::<BigEndian>(data.len() as u32)?;
        self.out.seek(SeekFrom::Start(end_position))?;
        Ok(table_position)
    }

    /// Set `head.checkSumAdjustment` at `adjustment_position` and return the file.
    fn finish(mut self, adjustment_position: u64) -> Result<Vec<u8>> {
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(table_checksum(self.out.get_ref()));
        self.out.seek(SeekFrom::Start(adjustment_position))?;
        self.out.write_u32::<BigEndian>(adjustment)?;
        Ok(self.out.into_inner())
    }
}
