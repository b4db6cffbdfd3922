//! TrueType and CFF subsets built from small synthetic fonts, checked through
//! the public writer API and embedded into documents.

use byteorder::{BigEndian, ByteOrder};
use charta::fonts::cff::CffSubsetWriter;
use charta::fonts::{embed_cff_subset, embed_true_type_subset, FontProgram, SubsetOutcome, TrueTypeSubsetWriter};
use charta::object::Object;
use charta::{Error, PdfDocumentWriter, PdfReader, WriterConfig};
use std::io::Cursor;

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(BigEndian::read_u32(&word))
    })
}

fn sfnt(version: &[u8; 4], tables: &mut [(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    tables.sort_by_key(|(tag, _)| **tag);
    let header_len = 12 + 16 * tables.len();
    let mut directory = version.to_vec();
    directory.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    directory.extend_from_slice(&[0; 6]);
    let mut body = Vec::new();
    for (tag, data) in tables.iter() {
        directory.extend_from_slice(*tag);
        directory.extend_from_slice(&checksum(data).to_be_bytes());
        directory.extend_from_slice(&((header_len + body.len()) as u32).to_be_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        body.resize((body.len() + 3) & !3, 0);
    }
    directory.extend(body);
    directory
}

fn os2(fs_type: u16) -> Vec<u8> {
    let mut os2 = vec![0u8; 78];
    os2[8..10].copy_from_slice(&fs_type.to_be_bytes());
    os2
}

/// Table directory entries of an sfnt file: (tag, checksum, offset, length).
fn directory(font: &[u8]) -> Vec<([u8; 4], u32, usize, usize)> {
    let count = BigEndian::read_u16(&font[4..6]) as usize;
    (0..count)
        .map(|i| {
            let entry = &font[12 + i * 16..28 + i * 16];
            (
                [entry[0], entry[1], entry[2], entry[3]],
                BigEndian::read_u32(&entry[4..8]),
                BigEndian::read_u32(&entry[8..12]) as usize,
                BigEndian::read_u32(&entry[12..16]) as usize,
            )
        })
        .collect()
}

fn table<'a>(font: &'a [u8], tag: &[u8; 4]) -> &'a [u8] {
    let (_, _, offset, length) = directory(font)
        .into_iter()
        .find(|(entry_tag, ..)| entry_tag == tag)
        .unwrap();
    &font[offset..offset + length]
}

mod true_type {
    use super::*;

    fn simple_glyph(marker: u8) -> Vec<u8> {
        let mut glyph = vec![0, 1, 0, 0, 0, 0, 0, 20, 0, 20];
        glyph.extend_from_slice(&[0, 0, 0, 0, 1, marker, 0, 0]);
        glyph
    }

    /// Composite glyph with word arguments and no scale.
    fn composite_glyph(components: &[u16]) -> Vec<u8> {
        let mut glyph = vec![0xFF, 0xFF, 0, 0, 0, 0, 0, 20, 0, 20];
        for (i, component) in components.iter().enumerate() {
            let flags: u16 = if i + 1 < components.len() { 0x0021 } else { 0x0001 };
            glyph.extend_from_slice(&flags.to_be_bytes());
            glyph.extend_from_slice(&component.to_be_bytes());
            glyph.extend_from_slice(&[0, 0, 0, 7]);
        }
        glyph
    }

    /// Glyphs: 0 `.notdef`, 1 `B`, 2 `C`, 3 composite of 1 and 2, 4 `D`.
    pub(super) fn font(fs_type: u16) -> Vec<u8> {
        let glyphs = [
            simple_glyph(0),
            simple_glyph(1),
            simple_glyph(2),
            composite_glyph(&[1, 2]),
            simple_glyph(4),
        ];
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        for glyph in &glyphs {
            loca.extend_from_slice(&((glyf.len() / 2) as u16).to_be_bytes());
            glyf.extend_from_slice(glyph);
        }
        loca.extend_from_slice(&((glyf.len() / 2) as u16).to_be_bytes());

        let mut head = vec![0u8; 54];
        head[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        head[18..20].copy_from_slice(&2048u16.to_be_bytes());

        let mut hhea = vec![0u8; 36];
        hhea[34..36].copy_from_slice(&5u16.to_be_bytes());
        let mut hmtx = Vec::new();
        for advance in [600u16, 610, 620, 630, 640] {
            hmtx.extend_from_slice(&advance.to_be_bytes());
            hmtx.extend_from_slice(&[0, 15]);
        }

        let mut maxp = vec![0, 1, 0, 0];
        maxp.extend_from_slice(&5u16.to_be_bytes());
        maxp.extend_from_slice(&[0; 26]);

        sfnt(
            &[0, 1, 0, 0],
            &mut [
                (b"OS/2", os2(fs_type)),
                (b"cmap", vec![0, 0, 0, 0]),
                (b"glyf", glyf),
                (b"head", head),
                (b"hhea", hhea),
                (b"hmtx", hmtx),
                (b"loca", loca),
                (b"maxp", maxp),
                (b"name", vec![0, 0, 0, 0, 0, 6]),
                (b"post", vec![0, 3, 0, 0]),
            ],
        )
    }
}

mod cff {
    /// INDEX with 2 byte offsets.
    fn index(items: &[&[u8]]) -> Vec<u8> {
        let mut out = (items.len() as u16).to_be_bytes().to_vec();
        if items.is_empty() {
            return out;
        }
        out.push(2);
        let mut offset = 1u16;
        out.extend_from_slice(&offset.to_be_bytes());
        for item in items {
            offset += item.len() as u16;
            out.extend_from_slice(&offset.to_be_bytes());
        }
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }

    fn integer(out: &mut Vec<u8>, value: i32) {
        out.push(29);
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn top_dict(charset: i32, char_strings: i32, private: (i32, i32)) -> Vec<u8> {
        let mut dict = Vec::new();
        integer(&mut dict, charset);
        dict.push(15);
        integer(&mut dict, char_strings);
        dict.push(17);
        integer(&mut dict, private.0);
        integer(&mut dict, private.1);
        dict.push(18);
        dict
    }

    /// Bare CFF with glyphs `.notdef`, `A`, `acute`, `B` and `Aacute`, the
    /// last one built from `A` and `acute` with `seac`.
    pub(super) fn font() -> Vec<u8> {
        let charstrings: [&[u8]; 5] = [
            &[14],
            &[239, 239, 21, 14],
            &[139, 149, 21, 14],
            &[149, 139, 21, 14],
            &[139, 139, 204, 247, 86, 14],
        ];
        // A, acute, B, Aacute
        let charset: Vec<u8> = [34u16, 125, 35, 201].iter().flat_map(|sid| sid.to_be_bytes()).collect();
        let private = [139u8, 21];

        let mut prefix = vec![1, 0, 4, 4];
        prefix.extend(index(&[b"Test".as_slice()]));
        let top_len = index(&[top_dict(0, 0, (0, 0)).as_slice()]).len();
        let charset_offset = prefix.len() + top_len + 4;
        let mut tail = vec![0];
        tail.extend_from_slice(&charset);
        let char_strings_offset = charset_offset + tail.len();
        tail.extend(index(&charstrings));
        let private_offset = charset_offset + tail.len();
        tail.extend_from_slice(&private);

        let top = top_dict(
            charset_offset as i32,
            char_strings_offset as i32,
            (private.len() as i32, private_offset as i32),
        );
        let mut out = prefix;
        out.extend(index(&[top.as_slice()]));
        out.extend(index(&[]));
        out.extend(index(&[]));
        out.extend(tail);
        out
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn test_true_type_composite_closure() {
    let program = FontProgram::new(true_type::font(0));
    let writer = TrueTypeSubsetWriter::new(&program).unwrap();
    assert_eq!(writer.glyph_closure(&[3]).unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(writer.glyph_closure(&[4, 1]).unwrap(), vec![0, 1, 4]);
    assert!(matches!(writer.glyph_closure(&[9]), Err(Error::GlyphOutOfRange { glyph: 9, .. })));
}

#[test]
fn test_true_type_subset_is_well_formed() {
    let program = FontProgram::new(true_type::font(0));
    let subset = TrueTypeSubsetWriter::new(&program)
        .unwrap()
        .write_subset(&[3])
        .unwrap()
        .into_program()
        .unwrap();

    assert_eq!(&subset[0..4], &[0, 1, 0, 0]);
    assert_eq!(subset.len() % 4, 0);
    let entries = directory(&subset);
    let tags: Vec<&[u8; 4]> = entries.iter().map(|(tag, ..)| tag).collect();
    // post is not carried over
    assert_eq!(
        tags,
        vec![b"OS/2", b"cmap", b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp", b"name"]
    );
    for (tag, sum, offset, length) in &entries {
        assert_eq!(offset % 4, 0);
        let mut data = subset[*offset..offset + length].to_vec();
        if tag == b"head" {
            data[8..12].fill(0);
        }
        assert_eq!(checksum(&data), *sum, "checksum of {}", String::from_utf8_lossy(tag));
    }
    assert_eq!(checksum(&subset), 0xB1B0_AFBA);

    // glyphs 0..=3 remain, numbered as before, with long loca offsets
    assert_eq!(BigEndian::read_u16(&table(&subset, b"maxp")[4..6]), 4);
    assert_eq!(BigEndian::read_u16(&table(&subset, b"head")[50..52]), 1);
    assert_eq!(table(&subset, b"loca").len(), 5 * 4);
    assert_eq!(table(&subset, b"hmtx").len(), 4 * 4);

    let reparsed = FontProgram::new(subset);
    let writer = TrueTypeSubsetWriter::new(&reparsed).unwrap();
    assert_eq!(writer.glyph_closure(&[3]).unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn test_unselected_glyphs_are_empty() {
    let program = FontProgram::new(true_type::font(0));
    let subset = TrueTypeSubsetWriter::new(&program)
        .unwrap()
        .write_subset(&[2])
        .unwrap()
        .into_program()
        .unwrap();
    let loca = table(&subset, b"loca");
    let offsets: Vec<u32> = loca.chunks(4).map(BigEndian::read_u32).collect();
    assert_eq!(offsets.len(), 4);
    // glyph 1 is skipped, glyph 2 keeps its id
    assert_eq!(offsets[1], offsets[2]);
    assert!(offsets[3] > offsets[2]);
}

#[test]
fn test_restricted_fonts_are_not_embedded() {
    let program = FontProgram::new(true_type::font(0x0002));
    let outcome = TrueTypeSubsetWriter::new(&program).unwrap().write_subset(&[1]).unwrap();
    assert_eq!(outcome, SubsetOutcome::NotEmbedded);

    let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default()).unwrap();
    assert_eq!(embed_true_type_subset(writer.objects_context(), &program, &[1]).unwrap(), None);
}

#[test]
fn test_true_type_writer_rejects_cff() {
    let program = FontProgram::new(cff::font());
    assert!(matches!(
        TrueTypeSubsetWriter::new(&program),
        Err(Error::WrongFontKind { expected: "TrueType", .. })
    ));
}

#[test]
fn test_cff_seac_closure() {
    let program = FontProgram::new(cff::font());
    let writer = CffSubsetWriter::new(&program).unwrap();
    assert!(!writer.is_cid());
    assert_eq!(writer.glyph_count(), 5);
    assert_eq!(writer.glyph_closure(&[4]).unwrap(), vec![0, 1, 2, 4]);
    assert_eq!(writer.glyph_closure(&[3]).unwrap(), vec![0, 3]);
}

#[test]
fn test_cff_subset_parses_back() {
    let program = FontProgram::new(cff::font());
    let subset = CffSubsetWriter::new(&program)
        .unwrap()
        .write_subset(&[4], None, Some("ABCDEF+Test"))
        .unwrap()
        .into_program()
        .unwrap();
    assert_eq!(&subset[0..2], &[1, 0]);
    assert!(find(&subset, b"ABCDEF+Test"));

    let reparsed = FontProgram::new(subset);
    let writer = CffSubsetWriter::new(&reparsed).unwrap();
    assert_eq!(writer.glyph_count(), 4);
    // renumbered: A 1, acute 2, Aacute 3, flattened with the seac kept
    assert_eq!(writer.glyph_closure(&[3]).unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn test_open_type_cff_permissions() {
    let cff = cff::font();
    let restricted = FontProgram::new(sfnt(b"OTTO", &mut [(b"CFF ", cff.clone()), (b"OS/2", os2(0x0002))]));
    let outcome = CffSubsetWriter::new(&restricted).unwrap().write_subset(&[1], None, None).unwrap();
    assert_eq!(outcome, SubsetOutcome::NotEmbedded);

    let editable = FontProgram::new(sfnt(b"OTTO", &mut [(b"CFF ", cff), (b"OS/2", os2(0x0008))]));
    let subset = CffSubsetWriter::new(&editable)
        .unwrap()
        .write_subset(&[1], None, None)
        .unwrap()
        .into_program()
        .unwrap();
    assert!(find(&subset, b"/FSType 8 def"));
}

#[test]
fn test_cff_writer_rejects_true_type() {
    let program = FontProgram::new(true_type::font(0));
    assert!(matches!(
        CffSubsetWriter::new(&program),
        Err(Error::WrongFontKind { expected: "CFF", .. })
    ));
}

#[test]
fn test_embedded_font_files() {
    let true_type = FontProgram::new(true_type::font(0));
    let cff = FontProgram::new(cff::font());
    let expected_true_type = TrueTypeSubsetWriter::new(&true_type)
        .unwrap()
        .write_subset(&[3])
        .unwrap()
        .into_program()
        .unwrap();
    let expected_cff = CffSubsetWriter::new(&cff)
        .unwrap()
        .write_subset(&[4], None, None)
        .unwrap()
        .into_program()
        .unwrap();

    let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default()).unwrap();
    let ctx = writer.objects_context();
    let font_file2 = embed_true_type_subset(ctx, &true_type, &[3]).unwrap().unwrap();
    let font_file3 = embed_cff_subset(ctx, &cff, &[4], None, "Type1C").unwrap().unwrap();
    let pdf = writer.end(None, None).unwrap();

    let mut reader = PdfReader::new(Cursor::new(pdf)).unwrap();
    let stream = reader.object(font_file2).unwrap().as_stream().cloned().unwrap();
    assert_eq!(
        stream.dict.get("Length1"),
        Some(&Object::Integer(expected_true_type.len() as i64))
    );
    assert_eq!(reader.read_stream_data(&stream).unwrap(), expected_true_type);

    let stream = reader.object(font_file3).unwrap().as_stream().cloned().unwrap();
    assert_eq!(stream.dict.get("Subtype"), Some(&Object::Name("Type1C".to_string())));
    assert_eq!(reader.read_stream_data(&stream).unwrap(), expected_cff);
}
