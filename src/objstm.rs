//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) store several objects in one compressed
//! stream.
//!
//! # Format
//!
//! ```text
//! N 0 obj
//! << /Type /ObjStm
//!    /N 5              % Number of objects in stream
//!    /First 30         % Byte offset to first object's data
//!    /Filter /FlateDecode
//! >>
//! stream
//! 10 0 11 15 12 28 13 42 14 55    % Pairs: (obj_num, offset)
//! <dict>                           % Object 10 at offset 0
//! <array>                          % Object 11 at offset 15
//! ...
//! endstream
//! endobj
//! ```
//!
//! Offsets are relative to `/First`.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectId};
use crate::parser::PdfObjectParser;
use crate::parser_config::ParserOptions;
use std::collections::HashMap;
use std::io::Cursor;

fn required_integer(dict: &Dictionary, key: &str, max: i64) -> Result<usize> {
    let value = dict
        .get(key)
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("object stream missing /{} entry", key),
        })?;
    if !(0..=max).contains(&value) {
        return Err(Error::ParseError {
            offset: 0,
            reason: format!("invalid object stream /{} value: {}", key, value),
        });
    }
    Ok(value as usize)
}

/// Parse the objects of a decoded object stream.
///
/// Objects that fail to parse are skipped with a warning.
pub fn parse_object_stream(
    dict: &Dictionary,
    data: &[u8],
    options: ParserOptions,
) -> Result<HashMap<ObjectId, Object>> {
    if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
        if kind != "ObjStm" {
            return Err(Error::InvalidObjectType {
                expected: "ObjStm".to_string(),
                found: kind.to_string(),
            });
        }
    }
    let n = required_integer(dict, "N", 1_000_000)?;
    let first = required_integer(dict, "First", 10_000_000)?;
    if data.len() < first {
        return Err(Error::ParseError {
            offset: 0,
            reason: format!(
                "object stream data too short: {} bytes, expected at least {}",
                data.len(),
                first
            ),
        });
    }

    let pairs = parse_object_number_pairs(&data[..first], n, options)?;

    let objects_data = &data[first..];
    let mut parser = PdfObjectParser::with_options(Cursor::new(objects_data), options);
    let mut result = HashMap::with_capacity(pairs.len());
    for (id, offset) in pairs {
        if offset >= objects_data.len() as u64 {
            log::warn!(
                "Object {} offset {} is beyond stream data length {}",
                id,
                offset,
                objects_data.len()
            );
            continue;
        }
        parser.set_position(offset)?;
        match parser.parse_new_object() {
            Some(object) => {
                result.insert(id, object);
            },
            None => log::warn!("Failed to parse object {} from stream at offset {}", id, offset),
        }
    }
    Ok(result)
}

/// Read `count` (object number, offset) pairs.
fn parse_object_number_pairs(data: &[u8], count: usize, options: ParserOptions) -> Result<Vec<(ObjectId, u64)>> {
    let mut parser = PdfObjectParser::with_options(Cursor::new(data), options);
    let mut numbers = Vec::with_capacity(count * 2);
    while numbers.len() < count * 2 {
        match parser.parse_new_object() {
            Some(Object::Integer(value)) if value >= 0 => numbers.push(value as u64),
            other => {
                return Err(Error::ParseError {
                    offset: 0,
                    reason: format!("expected object stream pair, found {:?}", other.map(|o| o.type_name())),
                })
            },
        }
    }
    Ok(numbers.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
}
