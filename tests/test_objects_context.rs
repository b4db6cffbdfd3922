//! Streams, encryption and xref output of `ObjectsContext`, read back through
//! `PdfReader`.

use charta::encryption::{Algorithm, StandardDecryption, StandardEncryption};
use charta::object::{Object, ObjectId, ObjectRef};
use charta::writer::{ObjectsContext, PdfDocumentWriter, TokenSeparator};
use charta::{PdfReader, WriterConfig, XrefFormat};
use std::io::{Cursor, Write};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| b"0123456789 mlcS"[i % 15]).collect()
}

/// Document holding one stream object; returns the file and the stream id.
fn document_with_stream(data: &[u8], config: WriterConfig, direct: bool) -> (Vec<u8>, ObjectId) {
    let mut writer = PdfDocumentWriter::start(Vec::new(), config).unwrap();
    let ctx = writer.objects_context();
    let id = ctx.start_new_indirect_object().unwrap();
    let mut stream = ctx.start_pdf_stream(None, direct).unwrap();
    ctx.stream_writer(&mut stream).write_all(data).unwrap();
    ctx.end_pdf_stream(stream).unwrap();
    let pdf = writer.end(None, None).unwrap();
    (pdf, id)
}

/// `/Length` of a stream, following a reference.
fn declared_length(reader: &mut PdfReader<Cursor<Vec<u8>>>, dict: &charta::Dictionary) -> i64 {
    match dict.get("Length") {
        Some(Object::Integer(length)) => *length,
        Some(Object::Reference(reference)) => reader.object(reference.id).unwrap().as_integer().unwrap(),
        other => panic!("unexpected /Length {:?}", other),
    }
}

#[test]
fn test_stream_lengths_match_written_bytes() {
    init_logging();
    for len in [0usize, 1, 100_000] {
        for compress in [false, true] {
            for direct in [false, true] {
                let data = content(len);
                let config = WriterConfig::default().with_compression(compress);
                let (pdf, id) = document_with_stream(&data, config, direct);

                let mut reader = PdfReader::new(Cursor::new(pdf.clone())).unwrap();
                let stream = reader.object(id).unwrap().as_stream().cloned().unwrap();
                let length = declared_length(&mut reader, &stream.dict);

                // the extent runs from the first content byte to "\nendstream"
                let start = stream.content_start as usize;
                let end = start + length as usize;
                assert!(pdf[end..].starts_with(b"\nendstream"), "len {} compress {}", len, compress);
                assert_eq!(stream.dict.contains_key("Filter"), compress);
                if !compress {
                    assert_eq!(length as usize, len);
                }

                let stream = reader.object(id).unwrap().as_stream().cloned().unwrap();
                assert_eq!(reader.read_stream_data(&stream).unwrap(), data);
            }
        }
    }
}

#[test]
fn test_unfiltered_stream_keeps_caller_encoding() {
    let mut ctx = ObjectsContext::new(Vec::new());
    ctx.start_new_indirect_object().unwrap();
    let dict = ctx.start_dictionary().unwrap();
    ctx.write_key(&dict, "Filter").unwrap();
    ctx.write_name("ASCIIHexDecode", TokenSeparator::EndLine).unwrap();
    let mut stream = ctx.start_unfiltered_pdf_stream(Some(dict)).unwrap();
    ctx.write_stream_content(&mut stream, b"41>").unwrap();
    ctx.end_pdf_stream(stream).unwrap();

    let out = String::from_utf8(ctx.into_inner()).unwrap();
    assert_eq!(out.matches("/Filter").count(), 1);
    assert!(out.contains("stream\n41>\nendstream"));
}

#[test]
fn test_encrypted_document_round_trip() {
    init_logging();
    for algorithm in [Algorithm::Rc4_40, Algorithm::Rc4_128, Algorithm::Aes128] {
        let key = vec![0x5A; algorithm.key_length()];
        let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default()).unwrap();
        let ctx = writer.objects_context();
        ctx.set_encryption_helper(Some(Box::new(StandardEncryption::new(key.clone(), algorithm))));

        let id = ctx.start_new_indirect_object().unwrap();
        let dict = ctx.start_dictionary().unwrap();
        ctx.write_key(&dict, "Title").unwrap();
        ctx.write_literal_string(b"Quarterly report", TokenSeparator::EndLine).unwrap();
        let mut stream = ctx.start_pdf_stream(Some(dict), false).unwrap();
        ctx.write_stream_content(&mut stream, b"BT /F1 12 Tf (Hello) Tj ET").unwrap();
        ctx.end_pdf_stream(stream).unwrap();
        let pdf = writer.end(None, None).unwrap();

        assert!(!pdf.windows(16).any(|window| window == b"Quarterly report"));

        let mut reader = PdfReader::new(Cursor::new(pdf)).unwrap();
        reader.set_decryption_helper(Some(Box::new(StandardDecryption::new(key, algorithm))));
        let stream = reader.object(id).unwrap().as_stream().cloned().unwrap();
        assert_eq!(
            stream.dict.get("Title"),
            Some(&Object::LiteralString(b"Quarterly report".to_vec()))
        );
        assert_eq!(reader.read_stream_data(&stream).unwrap(), b"BT /F1 12 Tf (Hello) Tj ET");
    }
}

#[test]
fn test_single_object_xref_scenario() {
    let mut ctx = ObjectsContext::new(b"%PDF-1.4\n".to_vec());
    let id = ctx.start_new_indirect_object().unwrap();
    ctx.write_integer(42, TokenSeparator::EndLine).unwrap();
    ctx.end_indirect_object().unwrap();
    let object_position = ctx.registry().nth_object_reference(id).unwrap().write_position;

    let xref_position = ctx.write_xref_table().unwrap() as usize;
    ctx.write_keyword("trailer").unwrap();
    let trailer = ctx.start_dictionary().unwrap();
    let size = ctx.registry().objects_count();
    ctx.write_key(&trailer, "Size").unwrap();
    ctx.write_integer(size as i64, TokenSeparator::EndLine).unwrap();
    ctx.end_dictionary(trailer).unwrap();

    let out = String::from_utf8(ctx.into_inner()).unwrap();
    assert_eq!(object_position, 9);
    assert_eq!(
        &out[xref_position..],
        "xref\n0 2\n0000000000 65535 f\r\n0000000009 00000 n\r\ntrailer\n<<\n/Size 2\n>>\n"
    );
}

#[test]
fn test_xref_stream_document() {
    let config = WriterConfig::default().with_xref_format(XrefFormat::Stream);
    let mut writer = PdfDocumentWriter::start(Vec::new(), config).unwrap();
    let ctx = writer.objects_context();
    let catalog = ctx.start_new_indirect_object().unwrap();
    ctx.write_object(&Object::Dictionary(charta::Dictionary::from([(
        "Type".to_string(),
        Object::Name("Catalog".to_string()),
    )])), TokenSeparator::EndLine)
    .unwrap();
    ctx.end_indirect_object().unwrap();
    let pdf = writer.end(Some(ObjectRef::new(catalog, 0)), None).unwrap();

    let text = String::from_utf8_lossy(&pdf);
    assert!(text.contains("/Type /XRef"));
    assert!(text.contains("/W [ 1 8 4 ]"));
    assert!(!text.contains("\nxref\n"));

    let mut reader = PdfReader::new(Cursor::new(pdf)).unwrap();
    assert!(reader.uses_xref_stream());
    assert_eq!(reader.root(), Some(ObjectRef::new(catalog, 0)));
    assert_eq!(
        reader.object(catalog).unwrap().as_dict().and_then(|dict| dict.get("Type")).cloned(),
        Some(Object::Name("Catalog".to_string()))
    );
}
