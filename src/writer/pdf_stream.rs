//! Stream content being written.
//!
//! A [`PdfStream`] is created by `ObjectsContext::start_pdf_stream` and
//! finished by `ObjectsContext::end_pdf_stream`. Content passes through the
//! Flate stage (when compressing), then the stream encryptor (when the
//! document is encrypted), then reaches the sink.
//!
//! Two length modes:
//! - indirect: content goes straight to the sink after `stream`, and
//!   `/Length` refers to an object written after `endobj`;
//! - direct extent: content is buffered so that `/Length` can be written as
//!   an integer into the still open dictionary before `stream`.

use super::dictionary_context::DictionaryContext;
use crate::encryption::StreamEncryptor;
use crate::error::{Error, Result};
use crate::io::{FlateEncoder, OutputStream};
use crate::object::ObjectId;
use bytes::BytesMut;
use std::io::{self, Write};

/// Lifecycle of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting content
    Open,
    /// Length known, content complete
    Finalized,
    /// Direct extent content copied to the sink
    Flushed,
}

impl StreamState {
    fn name(self) -> &'static str {
        match self {
            StreamState::Open => "Open",
            StreamState::Finalized => "Finalized",
            StreamState::Flushed => "Flushed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum StreamExtent {
    Indirect { length_object_id: ObjectId, start_position: u64 },
    Direct { dictionary: DictionaryContext },
}

/// A stream whose content is being written.
pub struct PdfStream {
    extent: StreamExtent,
    state: StreamState,
    encoder: Option<FlateEncoder>,
    encryptor: Option<Box<dyn StreamEncryptor>>,
    temporary: BytesMut,
    length: u64,
}

impl PdfStream {
    pub(crate) fn new(extent: StreamExtent, compress: bool, encryptor: Option<Box<dyn StreamEncryptor>>) -> Self {
        Self {
            extent,
            state: StreamState::Open,
            encoder: compress.then(FlateEncoder::new),
            encryptor,
            temporary: BytesMut::new(),
            length: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Length of the written content; valid once finalized.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Whether content is Flate compressed.
    pub fn is_compressed(&self) -> bool {
        self.encoder.is_some()
    }

    /// Id of the object that will hold `/Length`, `None` for direct extent
    /// streams.
    pub fn extent_object_id(&self) -> Option<ObjectId> {
        match self.extent {
            StreamExtent::Indirect { length_object_id, .. } => Some(length_object_id),
            StreamExtent::Direct { .. } => None,
        }
    }

    pub(crate) fn stream_dictionary_for_direct_extent_stream(&self) -> Option<DictionaryContext> {
        match self.extent {
            StreamExtent::Direct { dictionary } => Some(dictionary),
            StreamExtent::Indirect { .. } => None,
        }
    }

    fn expect_state(&self, expected: StreamState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidStreamState {
                expected: expected.name(),
                found: self.state.name(),
            });
        }
        Ok(())
    }

    fn emit(&mut self, sink: &mut dyn OutputStream, data: Vec<u8>) -> Result<()> {
        let data = match self.encryptor.as_mut() {
            Some(encryptor) => encryptor.update(&data)?,
            None => data,
        };
        match self.extent {
            StreamExtent::Direct { .. } => self.temporary.extend_from_slice(&data),
            StreamExtent::Indirect { .. } => sink.write_all(&data)?,
        }
        Ok(())
    }

    pub(crate) fn write(&mut self, sink: &mut dyn OutputStream, data: &[u8]) -> Result<()> {
        self.expect_state(StreamState::Open)?;
        let encoded = match self.encoder.as_mut() {
            Some(encoder) => encoder.encode(data)?,
            None => data.to_vec(),
        };
        if encoded.is_empty() {
            return Ok(());
        }
        self.emit(sink, encoded)
    }

    /// Complete the content and compute the length.
    pub(crate) fn finalize_stream_write(&mut self, sink: &mut dyn OutputStream) -> Result<()> {
        self.expect_state(StreamState::Open)?;
        if let Some(encoder) = self.encoder.take() {
            let tail = encoder.finish()?;
            if !tail.is_empty() {
                self.emit(sink, tail)?;
            }
        }
        if let Some(encryptor) = self.encryptor.take() {
            let tail = encryptor.finish()?;
            match self.extent {
                StreamExtent::Direct { .. } => self.temporary.extend_from_slice(&tail),
                StreamExtent::Indirect { .. } => sink.write_all(&tail)?,
            }
        }
        self.length = match self.extent {
            StreamExtent::Direct { .. } => self.temporary.len() as u64,
            StreamExtent::Indirect { start_position, .. } => sink.position() - start_position,
        };
        self.state = StreamState::Finalized;
        Ok(())
    }

    /// Copy buffered direct extent content to the sink.
    pub(crate) fn flush_stream_content_for_direct_extent_stream(&mut self, sink: &mut dyn OutputStream) -> Result<()> {
        self.expect_state(StreamState::Finalized)?;
        sink.write_all(&self.temporary)?;
        self.temporary.clear();
        self.state = StreamState::Flushed;
        Ok(())
    }
}

/// `std::io::Write` view of an open stream, obtained from
/// `ObjectsContext::stream_writer`.
pub struct StreamWriter<'a> {
    pub(crate) stream: &'a mut PdfStream,
    pub(crate) sink: &'a mut (dyn OutputStream + 'a),
}

impl Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(self.sink, buf).map_err(|e| match e {
            Error::Io(io_error) => io_error,
            other => io::Error::other(other),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
