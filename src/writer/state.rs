//! Session state files.
//!
//! A state file checkpoints a writing session so that it can be resumed
//! later. It is a PDF-like file: a `%PDFHummus-1.0` header, indirect
//! objects describing the saved structures, an xref table and a trailer
//! whose `/Root` names the top level state object. It is read back with the
//! ordinary object parser.
//!
//! ```no_run
//! use charta::writer::{ObjectsContext, StateReader, StateWriter};
//!
//! let ctx = ObjectsContext::new(Vec::new());
//!
//! let mut state = StateWriter::start("session.state")?;
//! let root = state.objects_context().allocate_object_id();
//! ctx.write_state(state.objects_context(), root)?;
//! state.set_root_object(root);
//! state.finish()?;
//!
//! let mut restored = ObjectsContext::new(Vec::new());
//! let mut state = StateReader::start("session.state")?;
//! let root = state.root_object();
//! restored.read_state(state.reader(), root)?;
//! state.finish();
//! # Ok::<(), charta::error::Error>(())
//! ```

use super::objects_context::ObjectsContext;
use super::primitive_writer::TokenSeparator;
use crate::error::{Error, Result};
use crate::io::PositionWriter;
use crate::object::ObjectId;
use crate::reader::PdfReader;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// First line of every state file.
pub const STATE_FILE_HEADER: &str = "PDFHummus-1.0";

/// Sink type of a state file being written.
pub type StateOutput = PositionWriter<BufWriter<File>>;

/// Writes a state file.
pub struct StateWriter {
    objects_context: ObjectsContext<StateOutput>,
    root_object: Option<ObjectId>,
}

impl StateWriter {
    /// Create the file and write its header.
    pub fn start(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let mut objects_context = ObjectsContext::new(PositionWriter::new(BufWriter::new(file)));
        objects_context.set_compress_streams(false);
        objects_context.write_comment(STATE_FILE_HEADER)?;
        log::debug!("Writing state file {}", path.as_ref().display());
        Ok(Self {
            objects_context,
            root_object: None,
        })
    }

    /// Context for writing the state objects.
    pub fn objects_context(&mut self) -> &mut ObjectsContext<StateOutput> {
        &mut self.objects_context
    }

    /// Object the trailer's `/Root` will point to.
    pub fn set_root_object(&mut self, id: ObjectId) {
        self.root_object = Some(id);
    }

    /// Write the xref table and trailer, then close the file.
    pub fn finish(mut self) -> Result<()> {
        let root = self
            .root_object
            .ok_or_else(|| Error::InvalidState("no root object was set".to_string()))?;

        let ctx = &mut self.objects_context;
        let xref_position = ctx.write_xref_table()?;
        ctx.write_keyword("trailer")?;
        let trailer = ctx.start_dictionary()?;
        let size = ctx.registry().objects_count();
        ctx.write_key(&trailer, "Size")?;
        ctx.write_integer(size as i64, TokenSeparator::EndLine)?;
        ctx.write_key(&trailer, "Root")?;
        ctx.write_indirect_object_reference(root, TokenSeparator::EndLine)?;
        ctx.end_dictionary(trailer)?;
        ctx.write_keyword("startxref")?;
        ctx.write_integer(xref_position as i64, TokenSeparator::EndLine)?;
        ctx.write_raw(b"%%EOF\n")?;

        let mut file = self.objects_context.into_inner().into_inner();
        file.flush()?;
        Ok(())
    }
}

/// Reads a state file written by [`StateWriter`].
pub struct StateReader {
    reader: PdfReader<BufReader<File>>,
    root_object: ObjectId,
}

impl StateReader {
    /// Open the file and locate the root state object.
    pub fn start(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = PdfReader::new(BufReader::new(file))?;
        let root_object = reader
            .root()
            .ok_or_else(|| Error::InvalidState("trailer has no /Root".to_string()))?
            .id;
        Ok(Self { reader, root_object })
    }

    /// Id of the top level state object.
    pub fn root_object(&self) -> ObjectId {
        self.root_object
    }

    /// Reader for loading state objects.
    pub fn reader(&mut self) -> &mut PdfReader<BufReader<File>> {
        &mut self.reader
    }

    /// Release the file.
    pub fn finish(self) {
        drop(self.reader);
    }
}
