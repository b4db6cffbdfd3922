//! Reading existing PDF files.
//!
//! [`PdfReader`] locates the last `startxref`, follows the chain of
//! cross-reference sections through `/Prev`, and loads objects on demand.
//! It serves two callers: documents opened for incremental modification and
//! session state files written by `StateWriter`.

use crate::decoders::decode_stream;
use crate::encryption::DecryptionHelper;
use crate::error::{Error, Result};
use crate::io::InputLimitedStream;
use crate::object::{Dictionary, Object, ObjectId, ObjectRef, StreamInput};
use crate::objstm::parse_object_stream;
use crate::parser::PdfObjectParser;
use crate::parser_config::ParserOptions;
use crate::xref::{decode_xref_stream, find_xref_offset, parse_xref_table, CrossRefTable, XRefEntry, XrefSource};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

/// Longest `/Prev` chain followed before giving up.
const MAX_XREF_SECTIONS: usize = 1000;

/// Random access reader over a PDF file.
pub struct PdfReader<R> {
    parser: PdfObjectParser<R>,
    xref: CrossRefTable,
    trailer: Dictionary,
    last_xref_position: u64,
    uses_xref_stream: bool,
    object_streams: HashMap<ObjectId, HashMap<ObjectId, Object>>,
    current_object: Option<ObjectRef>,
}

impl<R: Read + Seek> PdfReader<R> {
    /// Open a PDF with default parser options.
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, ParserOptions::default())
    }

    /// Open a PDF with explicit parser options.
    pub fn with_options(mut source: R, options: ParserOptions) -> Result<Self> {
        let last_xref_position = find_xref_offset(&mut source)?;
        log::debug!("startxref points to {}", last_xref_position);

        let mut reader = Self {
            parser: PdfObjectParser::with_options(source, options),
            xref: CrossRefTable::new(),
            trailer: Dictionary::new(),
            last_xref_position,
            uses_xref_stream: false,
            object_streams: HashMap::new(),
            current_object: None,
        };
        reader.load_xref_chain()?;
        Ok(reader)
    }

    fn load_xref_chain(&mut self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut merged = CrossRefTable::new();
        let mut next = Some(self.last_xref_position);
        let mut newest = true;

        while let Some(offset) = next.take() {
            if !visited.insert(offset) {
                log::warn!("Cross-reference chain loops back to {}, stopping", offset);
                break;
            }
            if visited.len() > MAX_XREF_SECTIONS {
                log::warn!("Cross-reference chain longer than {} sections, stopping", MAX_XREF_SECTIONS);
                break;
            }

            let (section, is_stream) = self.read_xref_section(offset)?;
            let trailer = section.trailer().cloned().unwrap_or_default();
            if newest {
                self.uses_xref_stream = is_stream;
                self.trailer = trailer.clone();
                newest = false;
            }
            merged.merge_from(section);

            // Hybrid files keep their compressed entries in a side stream.
            if let Some(hybrid) = trailer
                .get("XRefStm")
                .and_then(Object::as_integer)
                .and_then(|value| u64::try_from(value).ok())
            {
                if visited.insert(hybrid) {
                    let (stream_section, _) = self.read_xref_section(hybrid)?;
                    merged.merge_from(stream_section);
                }
            }

            next = trailer
                .get("Prev")
                .and_then(Object::as_integer)
                .and_then(|value| u64::try_from(value).ok());
        }

        log::debug!(
            "Loaded {} cross-reference entries from {} section(s)",
            merged.len(),
            visited.len()
        );
        self.xref = merged;
        Ok(())
    }

    /// Read one section at `offset`, returning it and whether it was a stream.
    fn read_xref_section(&mut self, offset: u64) -> Result<(CrossRefTable, bool)> {
        self.parser.set_position(offset)?;
        match self.parser.parse_new_object() {
            Some(first) if first.is_symbol("xref") => Ok((parse_xref_table(&mut self.parser)?, false)),
            Some(Object::Integer(_)) => {
                self.parser.set_position(offset)?;
                let (id, _) = self.read_object_header(offset)?;
                let stream = match self.parser.parse_new_object() {
                    Some(Object::StreamInput(stream)) => stream,
                    _ => {
                        log::error!("Object {} at {} is not a cross-reference stream", id, offset);
                        return Err(Error::InvalidXref);
                    },
                };
                let length = stream
                    .dict
                    .get("Length")
                    .and_then(Object::as_integer)
                    .and_then(|value| u64::try_from(value).ok())
                    .ok_or_else(|| Error::ParseError {
                        offset,
                        reason: "cross-reference stream needs a direct /Length".to_string(),
                    })?;
                let raw = self.read_stream_bytes(stream.content_start, length)?;
                let data = decode_stream(&stream.dict, &raw, self.parser.options())?;
                Ok((decode_xref_stream(stream.dict, &data)?, true))
            },
            other => {
                log::error!(
                    "No cross-reference section at {}: found {:?}",
                    offset,
                    other.as_ref().map(Object::type_name)
                );
                Err(Error::InvalidXref)
            },
        }
    }

    /// Parse `N G obj` at the current position.
    fn read_object_header(&mut self, offset: u64) -> Result<(ObjectId, u16)> {
        let id = self.parser.parse_new_object();
        let generation = self.parser.parse_new_object();
        let keyword = self.parser.parse_new_object();
        match (id, generation, keyword) {
            (Some(Object::Integer(id)), Some(Object::Integer(generation)), Some(keyword))
                if id >= 0 && keyword.is_symbol("obj") =>
            {
                let generation = u16::try_from(generation).map_err(|_| Error::ParseError {
                    offset,
                    reason: format!("generation {} out of range", generation),
                })?;
                Ok((id as ObjectId, generation))
            },
            _ => Err(Error::ParseError {
                offset,
                reason: "expected 'N G obj'".to_string(),
            }),
        }
    }

    fn read_stream_bytes(&mut self, start: u64, length: u64) -> Result<Vec<u8>> {
        self.parser.set_position(start)?;
        let mut data = Vec::new();
        {
            let source: &mut R = self.parser.source_mut();
            let mut limited = InputLimitedStream::borrowed(source, length);
            limited.read_to_end(&mut data)?;
        }
        self.parser.reset_read_state();
        if (data.len() as u64) < length {
            log::warn!(
                "Stream at {} declares {} bytes but only {} are available",
                start,
                length,
                data.len()
            );
        }
        Ok(data)
    }

    // Accessors

    /// Trailer of the newest cross-reference section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// The merged cross-reference entries.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Number of object slots: the highest object number in the merged
    /// cross-reference sections plus one. A trailer `/Size` that disagrees
    /// is not trusted, since it would size the registry of an update.
    pub fn objects_count(&self) -> u64 {
        let span = self.xref.span();
        if let Some(size) = self.trailer.get("Size").and_then(Object::as_integer) {
            if size != span as i64 {
                log::warn!("Trailer /Size {} disagrees with {} cross-reference entries", size, span);
            }
        }
        span
    }

    /// Offset of the newest cross-reference section, the `/Prev` of an
    /// incremental update.
    pub fn previous_xref_position(&self) -> u64 {
        self.last_xref_position
    }

    /// Whether the newest section is a cross-reference stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.uses_xref_stream
    }

    /// The trailer's `/Root`.
    pub fn root(&self) -> Option<ObjectRef> {
        self.trailer.get("Root").and_then(Object::as_reference)
    }

    /// Install the helper used to decrypt strings and streams.
    pub fn set_decryption_helper(&mut self, helper: Option<Box<dyn DecryptionHelper>>) {
        self.parser.set_decryption_helper(helper);
    }

    /// The underlying object parser.
    pub fn parser_mut(&mut self) -> &mut PdfObjectParser<R> {
        &mut self.parser
    }

    /// Unwrap, returning the source.
    pub fn into_inner(self) -> R {
        self.parser.into_inner()
    }

    // Objects

    /// Load object `id`; `None` when it is missing, free or malformed.
    pub fn parse_new_object(&mut self, id: ObjectId) -> Option<Object> {
        match self.load_object(id) {
            Ok(object) => Some(object),
            Err(e) => {
                log::debug!("Could not load object {}: {}", id, e);
                None
            },
        }
    }

    /// Load object `id`.
    pub fn object(&mut self, id: ObjectId) -> Result<Object> {
        self.load_object(id)
    }

    /// Follow `object` if it is a reference.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(reference) => self.load_object(reference.id),
            other => Ok(other.clone()),
        }
    }

    fn load_object(&mut self, id: ObjectId) -> Result<Object> {
        log::trace!("Loading object {}", id);
        match self.xref.get(id).copied() {
            Some(XRefEntry::Uncompressed { offset, generation }) => self.load_uncompressed_object(id, offset, generation),
            Some(XRefEntry::Compressed { stream, .. }) => self.load_compressed_object(id, stream),
            Some(XRefEntry::Free { .. }) => {
                log::debug!("Object {} is free", id);
                Err(Error::ObjectNotFound(id, 0))
            },
            None => Err(Error::ObjectNotFound(id, 0)),
        }
    }

    fn load_uncompressed_object(&mut self, id: ObjectId, offset: u64, generation: u16) -> Result<Object> {
        self.parser.set_position(offset)?;
        let (found, _) = self.read_object_header(offset)?;
        if found != id {
            log::error!("Expected object {} at {}, found object {}", id, offset, found);
            return Err(Error::ParseError {
                offset,
                reason: format!("expected object {}, found {}", id, found),
            });
        }

        if let Some(helper) = self.parser.decryption_helper_mut() {
            helper.on_object_start(id, generation);
        }
        let object = self.parser.parse_new_object();
        if let Some(helper) = self.parser.decryption_helper_mut() {
            helper.on_object_end();
        }
        self.current_object = Some(ObjectRef::new(id, generation));

        object.ok_or_else(|| Error::ParseError {
            offset,
            reason: format!("malformed body of object {}", id),
        })
    }

    fn load_compressed_object(&mut self, id: ObjectId, stream_id: ObjectId) -> Result<Object> {
        if !self.object_streams.contains_key(&stream_id) {
            let objects = self.load_object_stream(stream_id)?;
            self.object_streams.insert(stream_id, objects);
        }
        self.object_streams
            .get(&stream_id)
            .and_then(|objects| objects.get(&id))
            .cloned()
            .ok_or(Error::ObjectNotFound(id, 0))
    }

    fn load_object_stream(&mut self, stream_id: ObjectId) -> Result<HashMap<ObjectId, Object>> {
        // An object stream can never itself live inside an object stream.
        let (offset, generation) = match self.xref.get(stream_id).copied() {
            Some(XRefEntry::Uncompressed { offset, generation }) => (offset, generation),
            _ => return Err(Error::ObjectNotFound(stream_id, 0)),
        };
        let object = self.load_uncompressed_object(stream_id, offset, generation)?;
        let stream = match object {
            Object::StreamInput(stream) => stream,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "StreamInput".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };
        let data = self.read_stream_data(&stream)?;
        parse_object_stream(&stream.dict, &data, *self.parser.options())
    }

    // Streams

    /// Raw (still encoded) payload of a stream, decrypted when the document
    /// is encrypted. The stream must be the last object loaded.
    pub fn read_raw_stream_data(&mut self, stream: &StreamInput) -> Result<Vec<u8>> {
        let owner = self.current_object;
        let length = match stream.dict.get("Length") {
            Some(Object::Integer(length)) => *length,
            Some(Object::Reference(reference)) => {
                let length = self.load_object(reference.id)?;
                self.current_object = owner;
                length.as_integer().ok_or_else(|| Error::InvalidObjectType {
                    expected: "Integer".to_string(),
                    found: length.type_name().to_string(),
                })?
            },
            _ => {
                return Err(Error::ParseError {
                    offset: stream.content_start,
                    reason: "stream has no /Length".to_string(),
                })
            },
        };
        let length = u64::try_from(length).map_err(|_| Error::ParseError {
            offset: stream.content_start,
            reason: format!("negative stream length {}", length),
        })?;

        let data = self.read_stream_bytes(stream.content_start, length)?;
        self.decrypt_stream(owner, data)
    }

    fn decrypt_stream(&mut self, owner: Option<ObjectRef>, data: Vec<u8>) -> Result<Vec<u8>> {
        let (owner, helper) = match (owner, self.parser.decryption_helper_mut()) {
            (Some(owner), Some(helper)) => (owner, helper),
            _ => return Ok(data),
        };
        if !helper.is_encrypted() || !helper.can_decrypt_document() {
            return Ok(data);
        }
        helper.on_object_start(owner.id, owner.gen);
        let result = helper.decrypt_stream(&data);
        helper.on_object_end();
        result
    }

    /// Decoded payload of a stream (filters and predictors applied).
    pub fn read_stream_data(&mut self, stream: &StreamInput) -> Result<Vec<u8>> {
        let raw = self.read_raw_stream_data(stream)?;
        decode_stream(&stream.dict, &raw, self.parser.options())
    }
}

impl<R: Read + Seek> XrefSource for PdfReader<R> {
    fn xref_size(&self) -> u64 {
        self.objects_count()
    }

    fn xref_entry(&self, id: ObjectId) -> Option<XRefEntry> {
        self.xref.get(id).copied()
    }
}
