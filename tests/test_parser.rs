//! Object parser against the output of the object writer.

use charta::object::{Dictionary, Object, ObjectRef};
use charta::parser::PdfObjectParser;
use charta::writer::{ObjectsContext, TokenSeparator};
use proptest::prelude::*;
use std::io::Cursor;

fn write(object: &Object) -> Vec<u8> {
    let mut ctx = ObjectsContext::new(Vec::new());
    ctx.write_object(object, TokenSeparator::EndLine).unwrap();
    ctx.into_inner()
}

fn parse_all(input: Vec<u8>) -> Vec<Object> {
    let mut parser = PdfObjectParser::new(Cursor::new(input));
    std::iter::from_fn(|| parser.parse_new_object()).collect()
}

fn leaf() -> impl Strategy<Value = Object> {
    prop_oneof![
        Just(Object::Null),
        any::<bool>().prop_map(Object::Boolean),
        any::<i32>().prop_map(|value| Object::Integer(i64::from(value))),
        (-1_000_000i32..1_000_000).prop_map(|cents| Object::Real(f64::from(cents) / 100.0)),
        "[A-Za-z][A-Za-z0-9_.]{0,8}".prop_map(Object::Name),
        "[ -~]{0,4}".prop_map(|name| Object::Name(format!("N{}", name))),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Object::LiteralString),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Object::HexString),
        (1u64..100_000, 0u16..10).prop_map(|(id, generation)| Object::Reference(ObjectRef::new(id, generation))),
    ]
}

fn object() -> impl Strategy<Value = Object> {
    leaf().prop_recursive(5, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Object::Array),
            prop::collection::vec(("[A-Za-z]{1,6}", inner), 0..6).prop_map(|entries| {
                let mut dict = Dictionary::new();
                for (key, value) in entries {
                    dict.entry(key).or_insert(value);
                }
                Object::Dictionary(dict)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn written_objects_parse_back(value in object()) {
        let parsed = parse_all(write(&value));
        prop_assert_eq!(parsed, vec![value]);
    }

    #[test]
    fn reparsing_is_stable(value in object()) {
        let once = parse_all(write(&value));
        let twice = parse_all(write(&once[0]));
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn test_reference_and_object_header() {
    assert_eq!(
        parse_all(b"12 0 R".to_vec()),
        vec![Object::Reference(ObjectRef::new(12, 0))]
    );
    assert_eq!(
        parse_all(b"12 0 obj".to_vec()),
        vec![
            Object::Integer(12),
            Object::Integer(0),
            Object::Symbol("obj".to_string()),
        ]
    );
}

#[test]
fn test_indirect_objects_from_writer() {
    let mut ctx = ObjectsContext::new(Vec::new());
    ctx.set_compress_streams(false);
    let first = ctx.start_new_indirect_object().unwrap();
    ctx.write_literal_string(b"(nested)\n", TokenSeparator::EndLine).unwrap();
    ctx.end_indirect_object().unwrap();
    ctx.start_new_indirect_object().unwrap();
    let mut stream = ctx.start_pdf_stream(None, true).unwrap();
    ctx.write_stream_content(&mut stream, b"0 0 m").unwrap();
    ctx.end_pdf_stream(stream).unwrap();
    let out = ctx.into_inner();

    let mut parser = PdfObjectParser::new(Cursor::new(out.clone()));
    let mut next = || parser.parse_new_object();
    assert_eq!(next(), Some(Object::Integer(first as i64)));
    assert_eq!(next(), Some(Object::Integer(0)));
    assert_eq!(next(), Some(Object::Symbol("obj".to_string())));
    assert_eq!(next(), Some(Object::LiteralString(b"(nested)\n".to_vec())));
    assert_eq!(next(), Some(Object::Symbol("endobj".to_string())));
    assert_eq!(next(), Some(Object::Integer(2)));
    assert_eq!(next(), Some(Object::Integer(0)));
    assert_eq!(next(), Some(Object::Symbol("obj".to_string())));

    let Some(Object::StreamInput(stream)) = next() else {
        panic!("expected a stream");
    };
    assert_eq!(stream.dict.get("Length"), Some(&Object::Integer(5)));
    let start = stream.content_start as usize;
    assert_eq!(&out[start..start + 5], b"0 0 m");
}

#[test]
fn test_comments_are_invisible() {
    assert_eq!(
        parse_all(b"% header\n[1 % inside\n 2]".to_vec()),
        vec![Object::Array(vec![Object::Integer(1), Object::Integer(2)])]
    );
}

#[test]
fn test_malformed_input_is_absent() {
    assert!(parse_all(b"(unterminated".to_vec()).is_empty());
    assert!(parse_all(b"<< /Key".to_vec()).is_empty());
    assert!(parse_all(b"<4G>".to_vec()).is_empty());
    assert!(parse_all(b"(a(b)".to_vec()).is_empty());
    assert!(parse_all(b"/A#".to_vec()).is_empty());
    assert!(parse_all(b"/A#zz".to_vec()).is_empty());
    assert!(parse_all(b"<< /Name /A#4 >>".to_vec()).is_empty());
}

#[test]
fn test_object_zero_is_not_a_reference() {
    assert_eq!(
        parse_all(b"[0 0 R]".to_vec()),
        vec![Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Symbol("R".to_string()),
        ])]
    );
}
