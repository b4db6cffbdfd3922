//! Writing subset font programs as PDF font file streams.

use super::cff::CffSubsetWriter;
use super::{FontProgram, SubsetOutcome, TrueTypeSubsetWriter};
use crate::error::Result;
use crate::io::{copy_stream, OutputStream};
use crate::object::ObjectId;
use crate::writer::{DictionaryContext, ObjectsContext, TokenSeparator};
use std::io::Cursor;

/// Subset a TrueType font and write it as a `FontFile2` stream.
///
/// Returns the stream object id, or `None` when the font's license does not
/// allow embedding.
pub fn embed_true_type_subset<W: OutputStream>(
    ctx: &mut ObjectsContext<W>,
    font: &FontProgram,
    glyphs: &[u32],
) -> Result<Option<ObjectId>> {
    let SubsetOutcome::Embedded(program) = TrueTypeSubsetWriter::new(font)?.write_subset(glyphs)? else {
        log::debug!("TrueType font is not embeddable, skipping FontFile2");
        return Ok(None);
    };

    let id = ctx.start_new_indirect_object()?;
    let dict = ctx.start_dictionary()?;
    ctx.write_key(&dict, "Length1")?;
    ctx.write_integer(program.len() as i64, TokenSeparator::EndLine)?;
    write_font_file(ctx, dict, &program)?;
    log::debug!("Embedded TrueType subset of {} bytes as object {}", program.len(), id);
    Ok(Some(id))
}

/// Subset a CFF font and write it as a `FontFile3` stream of the given
/// `/Subtype` (`Type1C` or `CIDFontType0C`).
///
/// `cid_mapping` gives the CID of each entry of `glyphs` for CID keyed
/// fonts.
pub fn embed_cff_subset<W: OutputStream>(
    ctx: &mut ObjectsContext<W>,
    font: &FontProgram,
    glyphs: &[u32],
    cid_mapping: Option<&[u16]>,
    subtype: &str,
) -> Result<Option<ObjectId>> {
    let SubsetOutcome::Embedded(program) = CffSubsetWriter::new(font)?.write_subset(glyphs, cid_mapping, None)? else {
        log::debug!("CFF font is not embeddable, skipping FontFile3");
        return Ok(None);
    };

    let id = ctx.start_new_indirect_object()?;
    let dict = ctx.start_dictionary()?;
    ctx.write_key(&dict, "Subtype")?;
    ctx.write_name(subtype, TokenSeparator::EndLine)?;
    write_font_file(ctx, dict, &program)?;
    log::debug!("Embedded CFF subset of {} bytes as object {}", program.len(), id);
    Ok(Some(id))
}

fn write_font_file<W: OutputStream>(
    ctx: &mut ObjectsContext<W>,
    dict: DictionaryContext,
    program: &[u8],
) -> Result<()> {
    let mut stream = ctx.start_pdf_stream(Some(dict), false)?;
    copy_stream(&mut Cursor::new(program), &mut ctx.stream_writer(&mut stream))?;
    ctx.end_pdf_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::cff::testing::simple_font;
    use crate::fonts::sfnt::build_sfnt;

    fn uncompressed_context() -> ObjectsContext<Vec<u8>> {
        let mut ctx = ObjectsContext::new(Vec::new());
        ctx.set_compress_streams(false);
        ctx
    }

    #[test]
    fn test_embed_cff_subset() {
        let mut ctx = uncompressed_context();
        let font = FontProgram::new(simple_font());
        let id = embed_cff_subset(&mut ctx, &font, &[5], None, "Type1C").unwrap().unwrap();
        assert_eq!(id, 1);

        let out = String::from_utf8_lossy(ctx.output()).into_owned();
        assert!(out.starts_with("1 0 obj\n<<\n/Subtype /Type1C\n/Length 2 0 R\n>>\nstream\n"));
        assert!(out.contains("endstream\nendobj\n2 0 obj\n"));
    }

    #[test]
    fn test_restricted_font_is_skipped() {
        let mut os2 = vec![0u8; 78];
        os2[8..10].copy_from_slice(&0x0002u16.to_be_bytes());
        let font = FontProgram::new(build_sfnt(
            u32::from_be_bytes(*b"OTTO"),
            &[(b"CFF ", simple_font()), (b"OS/2", os2)],
        ));
        let mut ctx = uncompressed_context();
        assert_eq!(embed_cff_subset(&mut ctx, &font, &[1], None, "Type1C").unwrap(), None);
        assert!(ctx.output().is_empty());
    }

    #[test]
    fn test_wrong_kind_writes_nothing() {
        let mut ctx = uncompressed_context();
        let font = FontProgram::new(simple_font());
        assert!(embed_true_type_subset(&mut ctx, &font, &[1]).is_err());
        assert!(ctx.output().is_empty());
    }
}
