//! Cross-reference sections on the read side.
//!
//! The xref maps object numbers to byte offsets (or object stream slots) in
//! an existing PDF. Both flavors are supported: the classic `xref` table and
//! the PDF 1.5 cross-reference stream. Sections chained through `/Prev` are
//! merged by the reader so that the newest entry for an object wins.

use crate::error::{Error, Result};
use crate::io::stream_length;
use crate::object::{Dictionary, Object, ObjectId};
use crate::parser::PdfObjectParser;
use nom::character::complete::{digit1, multispace0};
use nom::sequence::preceded;
use nom::IResult;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

/// Location of one object as recorded in an xref section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot, linked to the next free object number
    Free {
        /// Next free object number
        next: u64,
        /// Generation to use when the slot is reused
        generation: u16,
    },
    /// Object stored directly in the file
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed {
        /// Object number of the containing object stream
        stream: ObjectId,
        /// Index of the object within the stream
        index: u32,
    },
}

impl XRefEntry {
    /// True for entries that hold a live object.
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }
}

/// Anything that can describe the objects of an existing file.
///
/// The writer's reference registry imports these entries when a document
/// is modified incrementally.
pub trait XrefSource {
    /// Number of object slots, one past the highest object number.
    fn xref_size(&self) -> u64;

    /// Entry for `id`, `None` when the file does not mention it.
    fn xref_entry(&self, id: ObjectId) -> Option<XRefEntry>;
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<ObjectId, XRefEntry>,
    trailer: Option<Dictionary>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Add an entry, replacing any previous one for the same number.
    pub fn add_entry(&mut self, id: ObjectId, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, id: ObjectId) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Highest object number with an entry, plus one.
    pub fn span(&self) -> u64 {
        self.entries.keys().next_back().map_or(0, |id| id + 1)
    }

    /// Iterate entries in object number order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &XRefEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Merge an older section into this one.
    ///
    /// Entries already present win; the older trailer is only used when this
    /// table has none.
    pub fn merge_from(&mut self, other: CrossRefTable) {
        for (id, entry) in other.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if self.trailer.is_none() && other.trailer.is_some() {
            self.trailer = other.trailer;
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the byte offset named by the last `startxref` in the file.
///
/// Only the final 2 KiB are searched.
pub fn find_xref_offset<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = stream_length(reader)?;
    let read_size = std::cmp::min(2048, file_size);
    reader.seek(SeekFrom::End(-(read_size as i64)))?;

    let mut buf = Vec::new();
    reader.take(read_size).read_to_end(&mut buf)?;

    let keyword = b"startxref";
    let start = buf
        .windows(keyword.len())
        .rposition(|window| window == keyword)
        .ok_or(Error::InvalidXref)?;

    let offset: IResult<&[u8], &[u8]> = preceded(multispace0, digit1)(&buf[start + keyword.len()..]);
    let (_, digits) = offset.map_err(|_| Error::InvalidXref)?;
    std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or(Error::InvalidXref)
}

fn next_integer<R: Read + Seek>(parser: &mut PdfObjectParser<R>) -> Result<i64> {
    match parser.parse_new_object() {
        Some(Object::Integer(value)) => Ok(value),
        other => {
            log::debug!("Expected integer in xref table, found {:?}", other);
            Err(Error::InvalidXref)
        },
    }
}

/// Parse a classic table. The parser must sit right after the `xref`
/// keyword; parsing stops after the trailer dictionary.
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
pub(crate) fn parse_xref_table<R: Read + Seek>(parser: &mut PdfObjectParser<R>) -> Result<CrossRefTable> {
    let mut xref = CrossRefTable::new();
    loop {
        let first = parser.parse_new_object().ok_or(Error::InvalidXref)?;
        let start = match first {
            Object::Symbol(ref keyword) if keyword == "trailer" => break,
            Object::Integer(start) if start >= 0 => start as u64,
            other => {
                log::debug!("Unexpected {} in xref subsection header", other.type_name());
                return Err(Error::InvalidXref);
            },
        };
        let count = next_integer(parser)?;
        if !(0..=10_000_000).contains(&count) {
            return Err(Error::InvalidXref);
        }

        for i in 0..count as u64 {
            let offset = next_integer(parser)?;
            let generation = next_integer(parser)?;
            let kind = parser.parse_new_object().ok_or(Error::InvalidXref)?;
            let offset = u64::try_from(offset).map_err(|_| Error::InvalidXref)?;
            let generation = u16::try_from(generation).map_err(|_| Error::InvalidXref)?;
            let entry = match kind.as_symbol() {
                Some("n") => XRefEntry::Uncompressed { offset, generation },
                Some("f") => XRefEntry::Free {
                    next: offset,
                    generation,
                },
                _ => {
                    log::warn!("Invalid xref entry type for object {}, treating as free", start + i);
                    XRefEntry::Free {
                        next: 0,
                        generation: 65535,
                    }
                },
            };
            xref.add_entry(start + i, entry);
        }
    }

    match parser.parse_new_object() {
        Some(Object::Dictionary(trailer)) => xref.set_trailer(trailer),
        _ => return Err(Error::InvalidXref),
    }
    Ok(xref)
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn integer_array(dict: &Dictionary, key: &str) -> Result<Option<Vec<u64>>> {
    let array = match dict.get(key) {
        Some(Object::Array(array)) => array,
        Some(_) => return Err(Error::InvalidXref),
        None => return Ok(None),
    };
    array
        .iter()
        .map(|item| {
            item.as_integer()
                .and_then(|value| u64::try_from(value).ok())
                .ok_or(Error::InvalidXref)
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Decode the entries of a cross-reference stream.
///
/// `data` is the already decoded stream content. The stream dictionary
/// becomes the trailer.
///
/// - `/W [w1 w2 w3]` field widths in bytes
/// - `/Index [start count ...]`, default `[0 Size]`
/// - type 0 free, 1 uncompressed, 2 compressed; a zero-width type field
///   means type 1
pub fn decode_xref_stream(dict: Dictionary, data: &[u8]) -> Result<CrossRefTable> {
    if let Some(kind) = dict.get("Type").and_then(|o| o.as_name()) {
        if kind != "XRef" {
            return Err(Error::InvalidObjectType {
                expected: "XRef".to_string(),
                found: kind.to_string(),
            });
        }
    }

    let widths = integer_array(&dict, "W")?.ok_or(Error::InvalidXref)?;
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidXref);
    }
    let (w1, w2, w3) = (widths[0] as usize, widths[1] as usize, widths[2] as usize);
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(Error::InvalidXref);
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .and_then(|size| u64::try_from(size).ok())
        .ok_or(Error::InvalidXref)?;
    let index = integer_array(&dict, "Index")?.unwrap_or_else(|| vec![0, size]);
    if index.len() % 2 != 0 {
        return Err(Error::InvalidXref);
    }

    let mut xref = CrossRefTable::new();
    let mut records = data.chunks_exact(entry_size);
    for range in index.chunks_exact(2) {
        let (start, count) = (range[0], range[1]);
        for id in start..start.saturating_add(count) {
            let record = records.next().ok_or_else(|| {
                Error::Decode("truncated cross-reference stream".to_string())
            })?;
            let kind = if w1 == 0 { 1 } else { read_field(&record[..w1]) };
            let field2 = read_field(&record[w1..w1 + w2]);
            let field3 = read_field(&record[w1 + w2..]);
            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2,
                    generation: field3 as u16,
                },
                1 => XRefEntry::Uncompressed {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2,
                    index: field3 as u32,
                },
                other => {
                    log::debug!("Skipping xref stream entry {} of unknown type {}", id, other);
                    continue;
                },
            };
            xref.add_entry(id, entry);
        }
    }

    xref.set_trailer(dict);
    Ok(xref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_find_xref_offset_valid() {
        let pdf = b"%PDF-1.4\nsome content\nstartxref\n12345\n%%EOF\n";
        let mut cursor = Cursor::new(pdf.to_vec());
        assert_eq!(find_xref_offset(&mut cursor).unwrap(), 12345);
    }

    #[test]
    fn test_find_xref_offset_uses_last_occurrence() {
        let pdf = b"startxref\n10\n%%EOF\nmore\nstartxref\r\n99\r\n%%EOF";
        let mut cursor = Cursor::new(pdf.to_vec());
        assert_eq!(find_xref_offset(&mut cursor).unwrap(), 99);
    }

    #[test]
    fn test_find_xref_offset_no_startxref() {
        let mut cursor = Cursor::new(b"%PDF-1.4\nno xref here\n%%EOF".to_vec());
        assert!(matches!(find_xref_offset(&mut cursor), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_xref_table() {
        let data = b"0 3\n0000000000 65535 f\r\n0000000018 00000 n\r\n0000000154 00002 n\r\n\
                     trailer\n<< /Size 3 /Root 1 0 R >>\n";
        let mut parser = PdfObjectParser::new(Cursor::new(data.to_vec()));
        let xref = parse_xref_table(&mut parser).unwrap();

        assert_eq!(xref.len(), 3);
        assert_eq!(
            xref.get(0),
            Some(&XRefEntry::Free {
                next: 0,
                generation: 65535
            })
        );
        assert_eq!(
            xref.get(2),
            Some(&XRefEntry::Uncompressed {
                offset: 154,
                generation: 2
            })
        );
        assert_eq!(xref.trailer().and_then(|t| t.get("Size")), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_parse_xref_table_multiple_subsections() {
        let data = b"0 1\n0000000000 65535 f \n5 2\n0000000100 00000 n \n0000000200 00000 n \n\
                     trailer << /Size 7 >>";
        let mut parser = PdfObjectParser::new(Cursor::new(data.to_vec()));
        let xref = parse_xref_table(&mut parser).unwrap();
        assert_eq!(xref.len(), 3);
        assert!(xref.get(5).is_some_and(|e| e.is_in_use()));
        assert!(xref.get(1).is_none());
        assert_eq!(xref.span(), 7);
    }

    #[test]
    fn test_parse_xref_table_missing_trailer() {
        let data = b"0 1\n0000000000 65535 f\r\n";
        let mut parser = PdfObjectParser::new(Cursor::new(data.to_vec()));
        assert!(parse_xref_table(&mut parser).is_err());
    }

    #[test]
    fn test_decode_xref_stream() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        dict.insert("Size".to_string(), Object::Integer(3));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(1)]),
        );
        let data = [
            0, 0x00, 0x00, 0xFF, // 0: free
            1, 0x01, 0x00, 0x00, // 1: offset 256
            2, 0x00, 0x05, 0x03, // 2: in stream 5, index 3
        ];
        let xref = decode_xref_stream(dict, &data).unwrap();
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 256,
                generation: 0
            })
        );
        assert_eq!(xref.get(2), Some(&XRefEntry::Compressed { stream: 5, index: 3 }));
        assert!(xref.trailer().is_some());
    }

    #[test]
    fn test_decode_xref_stream_with_index() {
        let mut dict = Dictionary::new();
        dict.insert("Size".to_string(), Object::Integer(12));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(1), Object::Integer(0)]),
        );
        dict.insert("Index".to_string(), Object::Array(vec![Object::Integer(10), Object::Integer(2)]));
        let xref = decode_xref_stream(dict, &[1, 40, 1, 80]).unwrap();
        assert_eq!(xref.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn test_decode_xref_stream_truncated() {
        let mut dict = Dictionary::new();
        dict.insert("Size".to_string(), Object::Integer(2));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(1)]),
        );
        assert!(decode_xref_stream(dict, &[1, 0, 10, 0]).is_err());
    }

    #[test]
    fn test_merge_newest_wins() {
        let mut newer = CrossRefTable::new();
        newer.add_entry(1, XRefEntry::Uncompressed { offset: 500, generation: 0 });
        let mut older = CrossRefTable::new();
        older.add_entry(1, XRefEntry::Uncompressed { offset: 15, generation: 0 });
        older.add_entry(2, XRefEntry::Uncompressed { offset: 80, generation: 0 });
        older.set_trailer(Dictionary::new());

        newer.merge_from(older);
        assert_eq!(newer.get(1), Some(&XRefEntry::Uncompressed { offset: 500, generation: 0 }));
        assert_eq!(newer.len(), 2);
        assert!(newer.trailer().is_some());
    }
}
