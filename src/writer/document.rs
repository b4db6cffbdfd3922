//! Document level writing.
//!
//! [`PdfDocumentWriter`] frames what [`ObjectsContext`] writes: the header
//! on start, the cross-reference section and trailer on end. It also drives
//! incremental updates of an existing file and the suspend/resume cycle of
//! a session through a state file.
//!
//! ```
//! use charta::config::WriterConfig;
//! use charta::object::ObjectRef;
//! use charta::writer::{PdfDocumentWriter, TokenSeparator};
//!
//! let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default())?;
//! let ctx = writer.objects_context();
//! let catalog = ctx.start_new_indirect_object()?;
//! let dict = ctx.start_dictionary()?;
//! ctx.write_key(&dict, "Type")?;
//! ctx.write_name("Catalog", TokenSeparator::EndLine)?;
//! ctx.end_dictionary(dict)?;
//! ctx.end_indirect_object()?;
//!
//! let pdf = writer.end(Some(ObjectRef::new(catalog, 0)), None)?;
//! assert!(pdf.starts_with(b"%PDF-1.4\n"));
//! assert!(pdf.ends_with(b"%%EOF\n"));
//! # Ok::<(), charta::error::Error>(())
//! ```

use super::dictionary_context::DictionaryContext;
use super::objects_context::ObjectsContext;
use super::primitive_writer::TokenSeparator;
use super::registry::state_dict;
use super::state::{StateReader, StateWriter};
use crate::config::{WriterConfig, XrefFormat};
use crate::error::{Error, Result};
use crate::io::PositionWriter;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::reader::PdfReader;
use md5::{Digest, Md5};
use std::io::{Cursor, Write};
use std::path::Path;

/// Binary marker line written after the header.
const BINARY_MARKER: &[u8] = b"%\xBD\xBE\xBC\n";

/// What is remembered about the file being modified.
#[derive(Debug, Clone, Default)]
struct ModifiedFile {
    previous_xref_position: u64,
    root: Option<ObjectRef>,
    info: Option<ObjectRef>,
    id: Option<Object>,
    uses_xref_stream: bool,
}

/// Writes a complete PDF file, or an incremental update to one.
pub struct PdfDocumentWriter<W: Write> {
    objects_context: ObjectsContext<PositionWriter<W>>,
    config: WriterConfig,
    modified: Option<ModifiedFile>,
}

impl<W: Write> PdfDocumentWriter<W> {
    /// Start a new document and write its header.
    pub fn start(sink: W, config: WriterConfig) -> Result<Self> {
        let mut objects_context = ObjectsContext::with_config(PositionWriter::new(sink), &config);
        objects_context.write_comment(&format!("PDF-{}", config.pdf_version))?;
        objects_context.write_raw(BINARY_MARKER)?;
        Ok(Self {
            objects_context,
            config,
            modified: None,
        })
    }

    /// Start an incremental update of `existing`.
    ///
    /// The original bytes are copied to `sink` unchanged; objects written
    /// afterwards are appended and the new xref section chains to the old
    /// one through `/Prev`.
    pub fn modify(existing: &[u8], sink: W, config: WriterConfig) -> Result<Self> {
        let reader = PdfReader::new(Cursor::new(existing))?;

        let mut objects_context = ObjectsContext::with_config(PositionWriter::new(sink), &config);
        objects_context.write_raw(existing)?;
        if !existing.ends_with(b"\n") && !existing.ends_with(b"\r") {
            objects_context.end_line()?;
        }
        objects_context
            .registry_mut()
            .setup_xref_from_modified_file(&reader);

        let trailer = reader.trailer();
        let modified = ModifiedFile {
            previous_xref_position: reader.previous_xref_position(),
            root: trailer.get("Root").and_then(Object::as_reference),
            info: trailer.get("Info").and_then(Object::as_reference),
            id: trailer.get("ID").cloned(),
            uses_xref_stream: reader.uses_xref_stream(),
        };
        log::debug!(
            "Modifying a file of {} bytes with {} objects, previous xref at {}",
            existing.len(),
            reader.objects_count(),
            modified.previous_xref_position
        );

        Ok(Self {
            objects_context,
            config,
            modified: Some(modified),
        })
    }

    /// The objects context writing into this document.
    pub fn objects_context(&mut self) -> &mut ObjectsContext<PositionWriter<W>> {
        &mut self.objects_context
    }

    /// Configuration in effect.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// True for an incremental update.
    pub fn is_modification(&self) -> bool {
        self.modified.is_some()
    }

    /// `/Root` of the file being modified.
    pub fn modified_root(&self) -> Option<ObjectRef> {
        self.modified.as_ref().and_then(|modified| modified.root)
    }

    /// `/Info` of the file being modified.
    pub fn modified_info(&self) -> Option<ObjectRef> {
        self.modified.as_ref().and_then(|modified| modified.info)
    }

    fn xref_format(&self) -> XrefFormat {
        // An update must use the same flavor as the file it extends.
        match &self.modified {
            Some(modified) if modified.uses_xref_stream => XrefFormat::Stream,
            _ => self.config.xref_format,
        }
    }

    /// Write the cross-reference section, trailer and `%%EOF`, returning the
    /// sink. `root` and `info` default to those of the modified file.
    pub fn end(mut self, root: Option<ObjectRef>, info: Option<ObjectRef>) -> Result<W> {
        let root = root.or_else(|| self.modified_root());
        let info = info.or_else(|| self.modified_info());
        if root.is_none() {
            log::warn!("Ending a document without a /Root");
        }

        let xref_position = match self.xref_format() {
            XrefFormat::Table => {
                let position = self.objects_context.write_xref_table()?;
                self.objects_context.write_keyword("trailer")?;
                let dict = self.objects_context.start_dictionary()?;
                self.write_trailer_entries(&dict, root, info)?;
                self.objects_context.end_dictionary(dict)?;
                position
            },
            XrefFormat::Stream => {
                let position = self.objects_context.position();
                self.objects_context.start_new_indirect_object()?;
                // Trailer strings stay in clear text.
                if let Some(helper) = self.objects_context.encryption_helper_mut() {
                    helper.pause_encryption();
                }
                let dict = self.objects_context.start_dictionary()?;
                let result = self
                    .write_trailer_entries(&dict, root, info)
                    .and_then(|()| self.objects_context.write_xref_stream(dict));
                if let Some(helper) = self.objects_context.encryption_helper_mut() {
                    helper.release_encryption();
                }
                result?;
                position
            },
        };

        let ctx = &mut self.objects_context;
        ctx.write_keyword("startxref")?;
        ctx.write_integer(xref_position as i64, TokenSeparator::EndLine)?;
        ctx.write_raw(b"%%EOF\n")?;

        let mut sink = self.objects_context.into_inner().into_inner();
        sink.flush()?;
        Ok(sink)
    }

    fn write_trailer_entries(
        &mut self,
        dict: &DictionaryContext,
        root: Option<ObjectRef>,
        info: Option<ObjectRef>,
    ) -> Result<()> {
        let size = self.objects_context.registry().objects_count();
        let position = self.objects_context.position();
        let ctx = &mut self.objects_context;

        ctx.write_key(dict, "Size")?;
        ctx.write_integer(size as i64, TokenSeparator::EndLine)?;
        if let Some(root) = root {
            ctx.write_key(dict, "Root")?;
            ctx.write_reference(root, TokenSeparator::EndLine)?;
        }
        if let Some(info) = info {
            ctx.write_key(dict, "Info")?;
            ctx.write_reference(info, TokenSeparator::EndLine)?;
        }

        let original_id = match &self.modified {
            Some(modified) => {
                ctx.write_key(dict, "Prev")?;
                ctx.write_integer(modified.previous_xref_position as i64, TokenSeparator::EndLine)?;
                modified
                    .id
                    .as_ref()
                    .and_then(Object::as_array)
                    .and_then(|parts| parts.first())
                    .and_then(Object::as_string)
                    .map(<[u8]>::to_vec)
            },
            None => None,
        };

        let instance_id = generate_file_id(position);
        let permanent_id = original_id.unwrap_or_else(|| instance_id.clone());
        ctx.write_key(dict, "ID")?;
        ctx.start_array()?;
        ctx.write_hex_string(&permanent_id, TokenSeparator::Space)?;
        ctx.write_hex_string(&instance_id, TokenSeparator::Space)?;
        ctx.end_array(TokenSeparator::EndLine)
    }

    /// Save the session to a state file and hand back the sink.
    ///
    /// The encryption helper is not saved; install it again after
    /// [`resume`](Self::resume).
    pub fn suspend(self, path: impl AsRef<Path>) -> Result<W> {
        let mut state = StateWriter::start(path)?;
        let state_ctx = state.objects_context();
        let root = state_ctx.allocate_object_id();
        let context_id = state_ctx.allocate_object_id();

        state_ctx.start_new_indirect_object_with_id(root)?;
        let dict = state_ctx.start_dictionary()?;
        state_ctx.write_key(&dict, "Type")?;
        state_ctx.write_name("PdfDocumentWriter", TokenSeparator::EndLine)?;
        state_ctx.write_key(&dict, "ObjectsContext")?;
        state_ctx.write_indirect_object_reference(context_id, TokenSeparator::EndLine)?;
        state_ctx.write_key(&dict, "PdfVersion")?;
        state_ctx.write_literal_string(self.config.pdf_version.as_bytes(), TokenSeparator::EndLine)?;
        state_ctx.write_key(&dict, "XrefFormat")?;
        let format = match self.config.xref_format {
            XrefFormat::Table => "Table",
            XrefFormat::Stream => "Stream",
        };
        state_ctx.write_name(format, TokenSeparator::EndLine)?;
        state_ctx.write_key(&dict, "OutputPosition")?;
        state_ctx.write_integer(self.objects_context.position() as i64, TokenSeparator::EndLine)?;
        if let Some(modified) = &self.modified {
            state_ctx.write_key(&dict, "Modified")?;
            let inner = state_ctx.start_dictionary()?;
            state_ctx.write_key(&inner, "PreviousXref")?;
            state_ctx.write_integer(modified.previous_xref_position as i64, TokenSeparator::EndLine)?;
            state_ctx.write_key(&inner, "UsesXrefStream")?;
            state_ctx.write_boolean(modified.uses_xref_stream, TokenSeparator::EndLine)?;
            if let Some(root) = modified.root {
                state_ctx.write_key(&inner, "Root")?;
                state_ctx.write_reference(root, TokenSeparator::EndLine)?;
            }
            if let Some(info) = modified.info {
                state_ctx.write_key(&inner, "Info")?;
                state_ctx.write_reference(info, TokenSeparator::EndLine)?;
            }
            if let Some(id) = &modified.id {
                state_ctx.write_key(&inner, "ID")?;
                state_ctx.write_object(id, TokenSeparator::EndLine)?;
            }
            state_ctx.end_dictionary(inner)?;
        }
        state_ctx.end_dictionary(dict)?;
        state_ctx.end_indirect_object()?;

        self.objects_context.write_state(state_ctx, context_id)?;
        state.set_root_object(root);
        state.finish()?;

        let mut sink = self.objects_context.into_inner().into_inner();
        sink.flush()?;
        Ok(sink)
    }

    /// Continue a session saved by [`suspend`](Self::suspend). `sink` must
    /// append to the output written before suspending.
    pub fn resume(path: impl AsRef<Path>, sink: W) -> Result<Self> {
        let mut state = StateReader::start(path)?;
        let root_id = state.root_object();
        let root = state.reader().object(root_id)?;
        let dict = state_dict(&root)?;

        let context_id = dict
            .get("ObjectsContext")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidState("document state has no /ObjectsContext".to_string()))?
            .id;
        let output_position = dict
            .get("OutputPosition")
            .and_then(Object::as_integer)
            .and_then(|position| u64::try_from(position).ok())
            .ok_or_else(|| Error::InvalidState("document state has no /OutputPosition".to_string()))?;
        let mut config = WriterConfig::default();
        if let Some(version) = dict.get("PdfVersion").and_then(Object::as_string) {
            config.pdf_version = String::from_utf8_lossy(version).into_owned();
        }
        config.xref_format = match dict.get("XrefFormat").and_then(Object::as_name) {
            Some("Stream") => XrefFormat::Stream,
            _ => XrefFormat::Table,
        };
        let modified = match dict.get("Modified") {
            Some(Object::Dictionary(inner)) => Some(read_modified_state(inner)?),
            _ => None,
        };

        let mut objects_context =
            ObjectsContext::with_config(PositionWriter::with_start(sink, output_position), &config);
        objects_context.read_state(state.reader(), context_id)?;
        config.compress_streams = objects_context.compress_streams();
        state.finish();

        log::debug!("Resumed session at output position {}", output_position);
        Ok(Self {
            objects_context,
            config,
            modified,
        })
    }
}

fn read_modified_state(dict: &Dictionary) -> Result<ModifiedFile> {
    let previous_xref_position = dict
        .get("PreviousXref")
        .and_then(Object::as_integer)
        .and_then(|position| u64::try_from(position).ok())
        .ok_or_else(|| Error::InvalidState("modified file state has no /PreviousXref".to_string()))?;
    Ok(ModifiedFile {
        previous_xref_position,
        root: dict.get("Root").and_then(Object::as_reference),
        info: dict.get("Info").and_then(Object::as_reference),
        id: dict.get("ID").cloned(),
        uses_xref_stream: dict.get("UsesXrefStream").and_then(Object::as_bool).unwrap_or(false),
    })
}

/// 16 bytes of file identifier.
fn generate_file_id(position: u64) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(position.to_le_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::XRefEntry;

    fn write_catalog<W: Write>(writer: &mut PdfDocumentWriter<W>) -> ObjectRef {
        let ctx = writer.objects_context();
        let id = ctx.start_new_indirect_object().unwrap();
        let dict = ctx.start_dictionary().unwrap();
        ctx.write_key(&dict, "Type").unwrap();
        ctx.write_name("Catalog", TokenSeparator::EndLine).unwrap();
        ctx.end_dictionary(dict).unwrap();
        ctx.end_indirect_object().unwrap();
        ObjectRef::new(id, 0)
    }

    #[test]
    fn test_new_document_reads_back() {
        let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default()).unwrap();
        let catalog = write_catalog(&mut writer);
        let pdf = writer.end(Some(catalog), None).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4\n%\xBD\xBE\xBC\n"));

        let mut reader = PdfReader::new(Cursor::new(pdf)).unwrap();
        assert_eq!(reader.root(), Some(catalog));
        assert_eq!(reader.objects_count(), 2);
        let id = reader.trailer().get("ID").and_then(Object::as_array).unwrap();
        assert_eq!(id.len(), 2);
        assert_eq!(id[0].as_string().map(<[u8]>::len), Some(16));
        assert!(reader.object(catalog.id).unwrap().as_dict().is_some());
    }

    #[test]
    fn test_xref_stream_document_reads_back() {
        let config = WriterConfig::default().with_xref_format(XrefFormat::Stream);
        let mut writer = PdfDocumentWriter::start(Vec::new(), config).unwrap();
        let catalog = write_catalog(&mut writer);
        let pdf = writer.end(Some(catalog), None).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5\n"));

        let mut reader = PdfReader::new(Cursor::new(pdf)).unwrap();
        assert!(reader.uses_xref_stream());
        assert_eq!(reader.objects_count(), 3);
        assert!(matches!(reader.xref().get(2), Some(XRefEntry::Uncompressed { .. })));
        assert_eq!(reader.root(), Some(catalog));
        assert!(reader.object(catalog.id).is_ok());
    }

    #[test]
    fn test_modification_chains_to_original() {
        let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default()).unwrap();
        let catalog = write_catalog(&mut writer);
        let original = writer.end(Some(catalog), None).unwrap();
        let original_xref = PdfReader::new(Cursor::new(original.clone()))
            .unwrap()
            .previous_xref_position();

        let mut writer = PdfDocumentWriter::modify(&original, Vec::new(), WriterConfig::default()).unwrap();
        assert!(writer.is_modification());
        assert_eq!(writer.modified_root(), Some(catalog));
        let ctx = writer.objects_context();
        let added = ctx.start_new_indirect_object().unwrap();
        ctx.write_literal_string(b"appended", TokenSeparator::EndLine).unwrap();
        ctx.end_indirect_object().unwrap();
        let updated = writer.end(None, None).unwrap();

        assert!(updated.starts_with(&original));
        let mut reader = PdfReader::new(Cursor::new(updated)).unwrap();
        assert_eq!(
            reader.trailer().get("Prev").and_then(Object::as_integer),
            Some(original_xref as i64)
        );
        assert_eq!(reader.root(), Some(catalog));
        assert_eq!(reader.object(added).unwrap(), Object::LiteralString(b"appended".to_vec()));
        assert!(reader.object(catalog.id).unwrap().as_dict().is_some());
    }

    #[test]
    fn test_suspend_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("writer.state");

        let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default().with_compression(false)).unwrap();
        let catalog = write_catalog(&mut writer);
        let prefix = writer.objects_context().generate_subset_font_prefix();
        let written = writer.suspend(&state_path).unwrap();

        let mut writer = PdfDocumentWriter::resume(&state_path, written).unwrap();
        assert!(!writer.objects_context().compress_streams());
        assert_eq!(writer.objects_context().registry().objects_count(), 2);
        assert_ne!(writer.objects_context().generate_subset_font_prefix(), prefix);
        let pdf = writer.end(Some(catalog), None).unwrap();

        let mut reader = PdfReader::new(Cursor::new(pdf)).unwrap();
        assert_eq!(reader.root(), Some(catalog));
        assert!(reader.object(catalog.id).is_ok());
    }
}
