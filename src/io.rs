//! Byte stream building blocks.
//!
//! Writers that know their position, a length-limited reader, and the Flate
//! stage used by PDF streams. Buffering is plain `std::io::BufReader`/`BufWriter`;
//! `BufReader` keeps `stream_position` correct across its buffer.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A byte sink that reports how many bytes it has accepted.
pub trait OutputStream: Write {
    /// Absolute position of the next byte written.
    fn position(&self) -> u64;
}

/// Position-tracking adapter over any writer.
#[derive(Debug)]
pub struct PositionWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> PositionWriter<W> {
    /// Wrap a writer positioned at offset 0.
    pub fn new(inner: W) -> Self {
        Self::with_start(inner, 0)
    }

    /// Wrap a writer whose next byte lands at `start`, e.g. after copying
    /// an existing file for an incremental update.
    pub fn with_start(inner: W, start: u64) -> Self {
        Self {
            inner,
            position: start,
        }
    }

    /// Borrow the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap, returning the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for PositionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> OutputStream for PositionWriter<W> {
    fn position(&self) -> u64 {
        self.position
    }
}

impl OutputStream for Vec<u8> {
    fn position(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: OutputStream + ?Sized> OutputStream for &mut T {
    fn position(&self) -> u64 {
        (**self).position()
    }
}

/// Source of an [`InputLimitedStream`], owned or borrowed.
pub enum StreamSource<'a> {
    /// The limited stream owns and drops the source
    Owned(Box<dyn Read + 'a>),
    /// The caller keeps the source
    Borrowed(&'a mut dyn Read),
}

impl Read for StreamSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            StreamSource::Owned(source) => source.read(buf),
            StreamSource::Borrowed(source) => source.read(buf),
        }
    }
}

/// Reader that yields at most a fixed number of bytes from its source.
pub struct InputLimitedStream<'a> {
    source: StreamSource<'a>,
    remaining: u64,
}

impl<'a> InputLimitedStream<'a> {
    /// Limit an owned source.
    pub fn owned(source: Box<dyn Read + 'a>, limit: u64) -> Self {
        Self {
            source: StreamSource::Owned(source),
            remaining: limit,
        }
    }

    /// Limit a borrowed source.
    pub fn borrowed(source: &'a mut dyn Read, limit: u64) -> Self {
        Self {
            source: StreamSource::Borrowed(source),
            remaining: limit,
        }
    }

    /// Bytes left before the limit.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// True while the limit has not been reached.
    pub fn not_ended(&self) -> bool {
        self.remaining > 0
    }
}

impl Read for InputLimitedStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let read = self.source.read(&mut buf[..max])?;
        self.remaining -= read as u64;
        Ok(read)
    }
}

/// Incremental zlib encoder whose output is drained after every write.
pub struct FlateEncoder {
    encoder: ZlibEncoder<Vec<u8>>,
}

impl Default for FlateEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlateEncoder {
    /// Create an encoder at the default compression level.
    pub fn new() -> Self {
        Self {
            encoder: ZlibEncoder::new(Vec::new(), Compression::default()),
        }
    }

    /// Feed bytes, returning whatever compressed output is ready.
    pub fn encode(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        self.encoder.write_all(data)?;
        Ok(std::mem::take(self.encoder.get_mut()))
    }

    /// Finish the zlib stream, returning the remaining output.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        self.encoder.finish()
    }
}

/// Compress a whole buffer.
pub fn flate_encode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = FlateEncoder::new();
    let mut out = encoder.encode(data)?;
    out.extend(encoder.finish()?);
    Ok(out)
}

/// Copy everything from `reader` into `writer`, returning the byte count.
pub fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
) -> io::Result<u64> {
    io::copy(reader, writer)
}

/// Total length of a seekable source; the position is restored afterwards.
pub fn stream_length<S: Seek + ?Sized>(source: &mut S) -> io::Result<u64> {
    let current = source.stream_position()?;
    let end = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(current))?;
    Ok(end)
}
