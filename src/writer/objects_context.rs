//! Object-level writing over a single output sink.
//!
//! `ObjectsContext` owns the sink and the indirect object registry. It
//! writes indirect objects, dictionaries, arrays and streams, and finally
//! the cross-reference section, either as a classic table or as a stream.
//!
//! # Example
//!
//! ```
//! use charta::writer::{ObjectsContext, TokenSeparator};
//!
//! let mut ctx = ObjectsContext::new(Vec::new());
//! let id = ctx.start_new_indirect_object().unwrap();
//! let dict = ctx.start_dictionary().unwrap();
//! ctx.write_key(&dict, "Type").unwrap();
//! ctx.write_name("Catalog", TokenSeparator::EndLine).unwrap();
//! ctx.end_dictionary(dict).unwrap();
//! ctx.end_indirect_object().unwrap();
//!
//! let out = String::from_utf8(ctx.into_inner()).unwrap();
//! assert_eq!(out, format!("{} 0 obj\n<<\n/Type /Catalog\n>>\nendobj\n", id));
//! ```

use super::dictionary_context::{DictionaryContext, DictionaryStack};
use super::pdf_stream::{PdfStream, StreamExtent, StreamWriter};
use super::primitive_writer::{PrimitiveWriter, TokenSeparator};
use super::registry::{state_dict, IndirectObjectsReferenceRegistry, ReferenceType};
use super::subset_prefix::UppercaseSequence;
use crate::config::WriterConfig;
use crate::encryption::EncryptionHelper;
use crate::error::{Error, Result};
use crate::io::OutputStream;
use crate::object::{Object, ObjectId, ObjectRef};
use crate::reader::PdfReader;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::{Read, Seek, Write};

/// Field widths of xref stream records: type, offset, generation.
const XREF_STREAM_WIDTHS: [usize; 3] = [1, 8, 4];

/// Writes PDF objects into an output sink and keeps the xref registry.
pub struct ObjectsContext<W: OutputStream> {
    output: W,
    registry: IndirectObjectsReferenceRegistry,
    dictionaries: DictionaryStack,
    compress_streams: bool,
    encryption: Option<Box<dyn EncryptionHelper>>,
    subset_fonts_names_sequence: UppercaseSequence,
}

impl<W: OutputStream> ObjectsContext<W> {
    /// Context with default settings (compressed streams).
    pub fn new(output: W) -> Self {
        Self::with_config(output, &WriterConfig::default())
    }

    /// Context taking compression and the subset prefix seed from `config`.
    pub fn with_config(output: W, config: &WriterConfig) -> Self {
        Self {
            output,
            registry: IndirectObjectsReferenceRegistry::new(),
            dictionaries: DictionaryStack::default(),
            compress_streams: config.compress_streams,
            encryption: None,
            subset_fonts_names_sequence: UppercaseSequence::new(&config.subset_prefix_seed),
        }
    }

    /// Borrow the sink.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Borrow the sink mutably.
    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    /// Unwrap, returning the sink.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Position of the next byte written.
    pub fn position(&self) -> u64 {
        self.output.position()
    }

    /// The object registry.
    pub fn registry(&self) -> &IndirectObjectsReferenceRegistry {
        &self.registry
    }

    /// The object registry, mutably.
    pub fn registry_mut(&mut self) -> &mut IndirectObjectsReferenceRegistry {
        &mut self.registry
    }

    /// Shorthand for `registry_mut().allocate_new_object_id()`.
    pub fn allocate_object_id(&mut self) -> ObjectId {
        self.registry.allocate_new_object_id()
    }

    /// Whether new streams are Flate compressed.
    pub fn compress_streams(&self) -> bool {
        self.compress_streams
    }

    /// Turn compression of new streams on or off.
    pub fn set_compress_streams(&mut self, compress: bool) {
        self.compress_streams = compress;
    }

    /// Install (or remove) the encryption helper.
    pub fn set_encryption_helper(&mut self, helper: Option<Box<dyn EncryptionHelper>>) {
        self.encryption = helper;
    }

    /// The installed encryption helper.
    pub fn encryption_helper_mut(&mut self) -> Option<&mut (dyn EncryptionHelper + 'static)> {
        self.encryption.as_deref_mut()
    }

    /// Number of dictionaries currently open.
    pub fn open_dictionaries(&self) -> usize {
        self.dictionaries.depth()
    }

    fn writer(&mut self) -> PrimitiveWriter<'_, W> {
        PrimitiveWriter::new(&mut self.output)
    }

    fn is_encrypting(&self) -> bool {
        self.encryption.as_deref().is_some_and(|helper| helper.is_encrypting())
    }

    // Indirect objects

    /// Allocate an id and start its object.
    pub fn start_new_indirect_object(&mut self) -> Result<ObjectId> {
        let id = self.registry.allocate_new_object_id();
        self.start_new_indirect_object_with_id(id)?;
        Ok(id)
    }

    /// Start an object whose id was allocated earlier.
    pub fn start_new_indirect_object_with_id(&mut self, id: ObjectId) -> Result<()> {
        let position = self.output.position();
        self.registry.mark_object_as_written(id, position)?;
        writeln!(self.output, "{} 0 obj", id)?;
        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.on_object_start(id, 0);
        }
        Ok(())
    }

    /// Start a new version of an object from the file being modified.
    pub fn start_modified_indirect_object(&mut self, id: ObjectId) -> Result<()> {
        let position = self.output.position();
        self.registry.mark_object_as_updated(id, position)?;
        let generation = self.registry.nth_object_reference(id)?.generation;
        writeln!(self.output, "{} {} obj", id, generation)?;
        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.on_object_start(id, generation);
        }
        Ok(())
    }

    /// Write `endobj`.
    pub fn end_indirect_object(&mut self) -> Result<()> {
        self.writer().write_keyword("endobj")?;
        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.on_object_end();
        }
        Ok(())
    }

    /// Free an object in the registry.
    pub fn delete_object(&mut self, id: ObjectId) -> Result<()> {
        self.registry.delete_object(id)
    }

    // Primitives

    /// Write an integer.
    pub fn write_integer(&mut self, value: i64, separator: TokenSeparator) -> Result<()> {
        self.writer().write_integer(value, separator)
    }

    /// Write a real number.
    pub fn write_real(&mut self, value: f64, separator: TokenSeparator) -> Result<()> {
        self.writer().write_real(value, separator)
    }

    /// Write a name.
    pub fn write_name(&mut self, name: &str, separator: TokenSeparator) -> Result<()> {
        self.writer().write_name(name, separator)
    }

    /// Write `true`/`false`.
    pub fn write_boolean(&mut self, value: bool, separator: TokenSeparator) -> Result<()> {
        self.writer().write_boolean(value, separator)
    }

    /// Write `null`.
    pub fn write_null(&mut self, separator: TokenSeparator) -> Result<()> {
        self.writer().write_null(separator)
    }

    /// Write a keyword on its own line.
    pub fn write_keyword(&mut self, keyword: &str) -> Result<()> {
        self.writer().write_keyword(keyword)
    }

    /// Write a literal string, encrypted when the document is.
    pub fn write_literal_string(&mut self, data: &[u8], separator: TokenSeparator) -> Result<()> {
        if self.is_encrypting() {
            let encrypted = self.encrypt(data)?;
            return self.writer().write_literal_string(&encrypted, separator);
        }
        self.writer().write_literal_string(data, separator)
    }

    /// Write a hex string, encrypted when the document is.
    pub fn write_hex_string(&mut self, data: &[u8], separator: TokenSeparator) -> Result<()> {
        if self.is_encrypting() {
            let encrypted = self.encrypt(data)?;
            return self.writer().write_hex_string(&encrypted, separator);
        }
        self.writer().write_hex_string(data, separator)
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.encryption.as_deref() {
            Some(helper) => helper.encrypt_string(data),
            None => Ok(data.to_vec()),
        }
    }

    /// Write `id G R` with the registry's generation for `id`.
    pub fn write_indirect_object_reference(&mut self, id: ObjectId, separator: TokenSeparator) -> Result<()> {
        let generation = self
            .registry
            .object_write_information(id)
            .map_or(0, |entry| entry.generation);
        self.write_reference(ObjectRef::new(id, generation), separator)
    }

    /// Write an explicit reference.
    pub fn write_reference(&mut self, reference: ObjectRef, separator: TokenSeparator) -> Result<()> {
        self.writer().write_indirect_reference(reference, separator)
    }

    /// Write `% text` on its own line.
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "%{}", text)?;
        Ok(())
    }

    /// Write bytes as they are.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.output.write_all(data)?;
        Ok(())
    }

    /// Write a line feed.
    pub fn end_line(&mut self) -> Result<()> {
        self.writer().end_line()
    }

    /// Write `[ `.
    pub fn start_array(&mut self) -> Result<()> {
        self.writer().start_array()
    }

    /// Write `]`.
    pub fn end_array(&mut self, separator: TokenSeparator) -> Result<()> {
        self.writer().end_array(separator)
    }

    // Dictionaries

    /// Write `<<` and open a dictionary.
    pub fn start_dictionary(&mut self) -> Result<DictionaryContext> {
        self.output.write_all(b"<<\n")?;
        Ok(self.dictionaries.push())
    }

    /// Close `dict` with `>>`.
    pub fn end_dictionary(&mut self, dict: DictionaryContext) -> Result<()> {
        self.dictionaries.pop(dict)?;
        self.output.write_all(b">>\n")?;
        Ok(())
    }

    /// Write `/key ` into `dict`; the value is written next by the caller.
    pub fn write_key(&mut self, dict: &DictionaryContext, key: &str) -> Result<()> {
        self.dictionaries.add_key(dict, key)?;
        self.write_name(key, TokenSeparator::Space)
    }

    /// Write `/key value` into `dict`.
    pub fn write_key_value(&mut self, dict: &DictionaryContext, key: &str, value: &Object) -> Result<()> {
        self.write_key(dict, key)?;
        self.write_object(value, TokenSeparator::EndLine)
    }

    /// Write a complete direct object.
    ///
    /// Streams cannot be written this way since their content is not part
    /// of the object value.
    pub fn write_object(&mut self, object: &Object, separator: TokenSeparator) -> Result<()> {
        match object {
            Object::Null => self.write_null(separator),
            Object::Boolean(value) => self.write_boolean(*value, separator),
            Object::Integer(value) => self.write_integer(*value, separator),
            Object::Real(value) => self.write_real(*value, separator),
            Object::Name(name) => self.write_name(name, separator),
            Object::LiteralString(data) => self.write_literal_string(data, separator),
            Object::HexString(data) => self.write_hex_string(data, separator),
            Object::Reference(reference) => self.write_reference(*reference, separator),
            Object::Symbol(symbol) => self.writer().write_symbol(symbol, separator),
            Object::Array(items) => {
                self.start_array()?;
                for item in items {
                    self.write_object(item, TokenSeparator::Space)?;
                }
                self.end_array(separator)
            },
            Object::Dictionary(dict) => {
                let context = self.start_dictionary()?;
                for (key, value) in dict {
                    self.write_key_value(&context, key, value)?;
                }
                self.end_dictionary(context)
            },
            Object::StreamInput(_) => Err(Error::Unsupported(
                "stream objects cannot be written as direct values".to_string(),
            )),
        }
    }

    // Streams

    /// Start a stream in the current indirect object.
    ///
    /// `dict` is an open dictionary the caller has written its own keys
    /// into; without one a new dictionary is opened. With
    /// `force_direct_extent` the content is buffered and `/Length` is written
    /// as an integer, otherwise `/Length` refers to an object written after
    /// the stream.
    pub fn start_pdf_stream(&mut self, dict: Option<DictionaryContext>, force_direct_extent: bool) -> Result<PdfStream> {
        let compress = self.compress_streams;
        self.start_stream(dict, force_direct_extent, compress)
    }

    /// Start a stream written without `/Filter`, for content the caller has
    /// already encoded.
    pub fn start_unfiltered_pdf_stream(&mut self, dict: Option<DictionaryContext>) -> Result<PdfStream> {
        self.start_stream(dict, false, false)
    }

    fn start_stream(&mut self, dict: Option<DictionaryContext>, direct: bool, compress: bool) -> Result<PdfStream> {
        let dict = match dict {
            Some(dict) => dict,
            None => self.start_dictionary()?,
        };
        if compress {
            self.write_key(&dict, "Filter")?;
            self.write_name("FlateDecode", TokenSeparator::EndLine)?;
        }

        // The encryptor must exist before string encryption is paused.
        let encryptor = match self.encryption.as_deref() {
            Some(helper) => helper.create_stream_encryptor()?,
            None => None,
        };

        let stream = if direct {
            PdfStream::new(StreamExtent::Direct { dictionary: dict }, compress, encryptor)
        } else {
            let length_object_id = self.registry.allocate_new_object_id();
            self.write_key(&dict, "Length")?;
            self.write_indirect_object_reference(length_object_id, TokenSeparator::EndLine)?;
            self.end_dictionary(dict)?;
            self.write_keyword("stream")?;
            let start_position = self.output.position();
            PdfStream::new(
                StreamExtent::Indirect {
                    length_object_id,
                    start_position,
                },
                compress,
                encryptor,
            )
        };

        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.pause_encryption();
        }
        Ok(stream)
    }

    /// `std::io::Write` adapter feeding `stream`.
    pub fn stream_writer<'a>(&'a mut self, stream: &'a mut PdfStream) -> StreamWriter<'a> {
        StreamWriter {
            stream,
            sink: &mut self.output,
        }
    }

    /// Append content to `stream`.
    pub fn write_stream_content(&mut self, stream: &mut PdfStream, data: &[u8]) -> Result<()> {
        stream.write(&mut self.output, data)
    }

    /// Finish `stream`, closing its object. For indirect streams the length
    /// object follows.
    pub fn end_pdf_stream(&mut self, mut stream: PdfStream) -> Result<()> {
        stream.finalize_stream_write(&mut self.output)?;

        match stream.stream_dictionary_for_direct_extent_stream() {
            Some(dict) => {
                self.write_key(&dict, "Length")?;
                self.write_integer(stream.length() as i64, TokenSeparator::EndLine)?;
                self.end_dictionary(dict)?;
                self.write_keyword("stream")?;
                stream.flush_stream_content_for_direct_extent_stream(&mut self.output)?;
                self.end_line()?;
                self.write_keyword("endstream")?;
                self.end_indirect_object()?;
            },
            None => {
                self.end_line()?;
                self.write_keyword("endstream")?;
                self.end_indirect_object()?;
                if let Some(length_object_id) = stream.extent_object_id() {
                    self.start_new_indirect_object_with_id(length_object_id)?;
                    self.write_integer(stream.length() as i64, TokenSeparator::EndLine)?;
                    self.end_indirect_object()?;
                }
            },
        }

        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.release_encryption();
        }
        Ok(())
    }

    // Cross-reference

    /// Consecutive runs of dirty entries as `(first id, count)`.
    fn dirty_runs(&self) -> Vec<(ObjectId, u64)> {
        let mut runs: Vec<(ObjectId, u64)> = Vec::new();
        for (id, entry) in self.registry.iter() {
            if !entry.dirty {
                continue;
            }
            match runs.last_mut() {
                Some((start, count)) if *start + *count == id => *count += 1,
                _ => runs.push((id, 1)),
            }
        }
        runs
    }

    /// Successor of every dirty free entry in the free list; the last one
    /// links back to 0.
    fn free_chain(&self) -> HashMap<ObjectId, ObjectId> {
        let free: Vec<ObjectId> = self
            .registry
            .iter()
            .filter(|(_, entry)| entry.reference_type == ReferenceType::Free && entry.dirty)
            .map(|(id, _)| id)
            .collect();
        let mut chain = HashMap::with_capacity(free.len());
        let mut next = 0;
        for &id in free.iter().rev() {
            chain.insert(id, next);
            next = id;
        }
        chain
    }

    /// Write a classic `xref` table of the dirty entries; returns its offset.
    ///
    /// Entries are exactly 20 bytes: `nnnnnnnnnn ggggg n\r\n`.
    pub fn write_xref_table(&mut self) -> Result<u64> {
        let xref_position = self.output.position();
        self.write_keyword("xref")?;

        let free_chain = self.free_chain();
        for (start, count) in self.dirty_runs() {
            writeln!(self.output, "{} {}", start, count)?;
            for id in start..start + count {
                let entry = *self.registry.nth_object_reference(id)?;
                let line = match entry.reference_type {
                    ReferenceType::Used => {
                        if !entry.written {
                            log::error!("Object {} is referenced but was never written", id);
                            return Err(Error::ObjectNotWritten(id));
                        }
                        format!("{:010} {:05} n\r\n", entry.write_position, entry.generation)
                    },
                    ReferenceType::Free => {
                        format!("{:010} {:05} f\r\n", free_chain.get(&id).copied().unwrap_or(0), entry.generation)
                    },
                };
                self.output.write_all(line.as_bytes())?;
            }
        }
        Ok(xref_position)
    }

    /// Write the body of a cross-reference stream into `dict`, an open
    /// dictionary of an already started indirect object that holds the
    /// trailer keys. Closes the object.
    pub fn write_xref_stream(&mut self, dict: DictionaryContext) -> Result<()> {
        let runs = self.dirty_runs();
        let free_chain = self.free_chain();

        self.write_key(&dict, "Type")?;
        self.write_name("XRef", TokenSeparator::EndLine)?;
        self.write_key(&dict, "Index")?;
        self.start_array()?;
        for (start, count) in &runs {
            self.write_integer(*start as i64, TokenSeparator::Space)?;
            self.write_integer(*count as i64, TokenSeparator::Space)?;
        }
        self.end_array(TokenSeparator::EndLine)?;
        self.write_key(&dict, "W")?;
        self.start_array()?;
        for width in XREF_STREAM_WIDTHS {
            self.write_integer(width as i64, TokenSeparator::Space)?;
        }
        self.end_array(TokenSeparator::EndLine)?;

        let mut records = Vec::new();
        for (start, count) in runs {
            for id in start..start + count {
                let entry = *self.registry.nth_object_reference(id)?;
                let (kind, field2) = match entry.reference_type {
                    ReferenceType::Used => {
                        if !entry.written {
                            return Err(Error::ObjectNotWritten(id));
                        }
                        (1u8, entry.write_position)
                    },
                    ReferenceType::Free => (0u8, free_chain.get(&id).copied().unwrap_or(0)),
                };
                records.write_u8(kind)?;
                records.write_u64::<BigEndian>(field2)?;
                records.write_u32::<BigEndian>(u32::from(entry.generation))?;
            }
        }

        // Cross-reference streams are never encrypted.
        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.pause_encryption();
        }
        let result = self.write_direct_stream(dict, &records);
        if let Some(helper) = self.encryption.as_deref_mut() {
            helper.release_encryption();
        }
        result
    }

    fn write_direct_stream(&mut self, dict: DictionaryContext, content: &[u8]) -> Result<()> {
        let mut stream = self.start_pdf_stream(Some(dict), true)?;
        self.write_stream_content(&mut stream, content)?;
        self.end_pdf_stream(stream)
    }

    // Fonts

    /// Next subset font tag, e.g. `AAAAAB+`.
    pub fn generate_subset_font_prefix(&mut self) -> String {
        format!("{}+", self.subset_fonts_names_sequence.next_value())
    }

    // Session state

    /// Forget everything written so far and start a new session on the
    /// same sink.
    pub fn cleanup(&mut self) {
        self.registry.reset();
        self.dictionaries.clear();
        self.compress_streams = true;
        self.encryption = None;
        self.subset_fonts_names_sequence = UppercaseSequence::default();
    }

    /// Save this context as object `object_id` of a state file.
    pub fn write_state<S: OutputStream>(&self, state: &mut ObjectsContext<S>, object_id: ObjectId) -> Result<()> {
        let registry_id = state.allocate_object_id();
        let sequence_id = state.allocate_object_id();

        state.start_new_indirect_object_with_id(object_id)?;
        let dict = state.start_dictionary()?;
        state.write_key(&dict, "Type")?;
        state.write_name("ObjectsContext", TokenSeparator::EndLine)?;
        state.write_key(&dict, "ReferencesRegistry")?;
        state.write_indirect_object_reference(registry_id, TokenSeparator::EndLine)?;
        state.write_key(&dict, "CompressStreams")?;
        state.write_boolean(self.compress_streams, TokenSeparator::EndLine)?;
        state.write_key(&dict, "SubsetFontsNamesSequence")?;
        state.write_indirect_object_reference(sequence_id, TokenSeparator::EndLine)?;
        state.end_dictionary(dict)?;
        state.end_indirect_object()?;

        self.registry.write_state(state, registry_id)?;

        state.start_new_indirect_object_with_id(sequence_id)?;
        let dict = state.start_dictionary()?;
        state.write_key(&dict, "Type")?;
        state.write_name("UppercaseSequence", TokenSeparator::EndLine)?;
        state.write_key(&dict, "Value")?;
        state.write_literal_string(self.subset_fonts_names_sequence.value().as_bytes(), TokenSeparator::EndLine)?;
        state.end_dictionary(dict)?;
        state.end_indirect_object()
    }

    /// Restore a context saved by [`write_state`](Self::write_state).
    pub fn read_state<R: Read + Seek>(&mut self, reader: &mut PdfReader<R>, object_id: ObjectId) -> Result<()> {
        let root = reader.object(object_id)?;
        let dict = state_dict(&root)?;

        let reference = |key: &str| {
            dict.get(key)
                .and_then(Object::as_reference)
                .ok_or_else(|| Error::InvalidState(format!("objects context state has no /{}", key)))
        };
        let registry_ref = reference("ReferencesRegistry")?;
        let sequence_ref = reference("SubsetFontsNamesSequence")?;
        let compress = dict.get("CompressStreams").and_then(Object::as_bool).unwrap_or(true);

        self.registry.read_state(reader, registry_ref.id)?;

        let sequence = reader.object(sequence_ref.id)?;
        let value = state_dict(&sequence)?
            .get("Value")
            .and_then(Object::as_string)
            .ok_or_else(|| Error::InvalidState("subset prefix sequence has no /Value".to_string()))?;
        self.subset_fonts_names_sequence = UppercaseSequence::new(&String::from_utf8_lossy(value));
        self.compress_streams = compress;
        self.dictionaries.clear();
        Ok(())
    }
}
