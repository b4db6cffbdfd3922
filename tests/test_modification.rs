//! Incremental updates of existing documents.

use charta::object::{Object, ObjectRef};
use charta::writer::{PdfDocumentWriter, TokenSeparator};
use charta::{Error, PdfReader, WriterConfig, XrefFormat};
use std::io::Cursor;

/// Catalog (1), info (2) and a counter object (3).
fn original_document(format: XrefFormat) -> Vec<u8> {
    let config = WriterConfig::default().with_xref_format(format);
    let mut writer = PdfDocumentWriter::start(Vec::new(), config).unwrap();
    let ctx = writer.objects_context();

    let catalog = ctx.start_new_indirect_object().unwrap();
    let dict = ctx.start_dictionary().unwrap();
    ctx.write_key(&dict, "Type").unwrap();
    ctx.write_name("Catalog", TokenSeparator::EndLine).unwrap();
    ctx.end_dictionary(dict).unwrap();
    ctx.end_indirect_object().unwrap();

    let info = ctx.start_new_indirect_object().unwrap();
    let dict = ctx.start_dictionary().unwrap();
    ctx.write_key(&dict, "Producer").unwrap();
    ctx.write_literal_string(b"charta", TokenSeparator::EndLine).unwrap();
    ctx.end_dictionary(dict).unwrap();
    ctx.end_indirect_object().unwrap();

    ctx.start_new_indirect_object().unwrap();
    ctx.write_integer(1, TokenSeparator::EndLine).unwrap();
    ctx.end_indirect_object().unwrap();

    writer
        .end(Some(ObjectRef::new(catalog, 0)), Some(ObjectRef::new(info, 0)))
        .unwrap()
}

fn update(existing: &[u8], edit: impl FnOnce(&mut PdfDocumentWriter<Vec<u8>>)) -> Vec<u8> {
    let mut writer = PdfDocumentWriter::modify(existing, Vec::new(), WriterConfig::default()).unwrap();
    edit(&mut writer);
    writer.end(None, None).unwrap()
}

#[test]
fn test_replace_delete_and_append() {
    for format in [XrefFormat::Table, XrefFormat::Stream] {
        let original = original_document(format);
        let original_xref = PdfReader::new(Cursor::new(original.clone()))
            .unwrap()
            .previous_xref_position();

        let mut appended = 0;
        let updated = update(&original, |writer| {
            assert_eq!(writer.modified_root(), Some(ObjectRef::new(1, 0)));
            assert_eq!(writer.modified_info(), Some(ObjectRef::new(2, 0)));
            let ctx = writer.objects_context();

            ctx.start_modified_indirect_object(3).unwrap();
            ctx.write_integer(2, TokenSeparator::EndLine).unwrap();
            ctx.end_indirect_object().unwrap();

            ctx.delete_object(2).unwrap();

            appended = ctx.start_new_indirect_object().unwrap();
            ctx.write_name("Appended", TokenSeparator::EndLine).unwrap();
            ctx.end_indirect_object().unwrap();
        });

        assert!(updated.starts_with(&original));
        let mut reader = PdfReader::new(Cursor::new(updated)).unwrap();
        assert_eq!(reader.uses_xref_stream(), format == XrefFormat::Stream);
        assert_eq!(
            reader.trailer().get("Prev").and_then(Object::as_integer),
            Some(original_xref as i64)
        );
        assert_eq!(reader.root(), Some(ObjectRef::new(1, 0)));
        assert_eq!(reader.object(3).unwrap(), Object::Integer(2));
        assert!(matches!(reader.object(2), Err(Error::ObjectNotFound(2, _))));
        assert_eq!(reader.object(appended).unwrap(), Object::Name("Appended".to_string()));
        assert!(reader.object(1).unwrap().as_dict().is_some());
    }
}

#[test]
fn test_update_lists_only_changed_entries() {
    let original = original_document(XrefFormat::Table);
    let updated = update(&original, |writer| {
        let ctx = writer.objects_context();
        ctx.start_modified_indirect_object(3).unwrap();
        ctx.write_integer(5, TokenSeparator::EndLine).unwrap();
        ctx.end_indirect_object().unwrap();
    });

    let tail = String::from_utf8_lossy(&updated[original.len()..]).into_owned();
    let xref = &tail[tail.find("xref\n").unwrap()..];
    // the free list head is always rewritten
    assert!(xref.starts_with("xref\n0 1\n0000000000 65535 f\r\n3 1\n"));
    assert!(xref.contains("/Size 4\n"));
    assert!(xref.contains("/Info 2 0 R\n"));
}

#[test]
fn test_file_identifier_is_kept() {
    let original = original_document(XrefFormat::Table);
    let first_id = |pdf: Vec<u8>| {
        let reader = PdfReader::new(Cursor::new(pdf)).unwrap();
        let id = reader.trailer().get("ID").and_then(Object::as_array).cloned().unwrap();
        (id[0].clone(), id[1].clone())
    };

    let (permanent, _) = first_id(original.clone());
    let updated = update(&original, |_| {});
    let (kept, instance) = first_id(updated);
    assert_eq!(kept, permanent);
    assert_ne!(instance, permanent);
}

#[test]
fn test_chained_updates() {
    let original = original_document(XrefFormat::Table);
    let first = update(&original, |writer| {
        let ctx = writer.objects_context();
        ctx.start_modified_indirect_object(3).unwrap();
        ctx.write_integer(10, TokenSeparator::EndLine).unwrap();
        ctx.end_indirect_object().unwrap();
    });
    let second = update(&first, |writer| {
        let ctx = writer.objects_context();
        let id = ctx.start_new_indirect_object().unwrap();
        assert_eq!(id, 4);
        ctx.write_boolean(true, TokenSeparator::EndLine).unwrap();
        ctx.end_indirect_object().unwrap();
    });

    let mut reader = PdfReader::new(Cursor::new(second)).unwrap();
    assert_eq!(reader.objects_count(), 5);
    assert_eq!(reader.object(3).unwrap(), Object::Integer(10));
    assert_eq!(reader.object(4).unwrap(), Object::Boolean(true));
    assert_eq!(reader.root(), Some(ObjectRef::new(1, 0)));
}

#[test]
fn test_inflated_trailer_size_is_ignored() {
    let mut original = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
    let xref_at = original.len();
    original.extend_from_slice(b"xref\n0 2\n0000000000 65535 f\r\n0000000009 00000 n\r\n");
    original.extend_from_slice(
        format!("trailer\n<< /Size 9000000000000 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes(),
    );

    let mut writer = PdfDocumentWriter::modify(&original, Vec::new(), WriterConfig::default()).unwrap();
    let ctx = writer.objects_context();
    assert_eq!(ctx.registry().objects_count(), 2);
    let id = ctx.start_new_indirect_object().unwrap();
    assert_eq!(id, 2);
    ctx.write_null(TokenSeparator::EndLine).unwrap();
    ctx.end_indirect_object().unwrap();
    let updated = writer.end(None, None).unwrap();

    let mut reader = PdfReader::new(Cursor::new(updated)).unwrap();
    assert_eq!(reader.objects_count(), 3);
    assert_eq!(reader.object(2).unwrap(), Object::Null);
}

#[test]
fn test_modify_rejects_garbage() {
    assert!(PdfDocumentWriter::modify(b"not a pdf", Vec::new(), WriterConfig::default()).is_err());
}
