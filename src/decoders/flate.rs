//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses the flate2 crate. Output is bounded by the configured size limit so a
//! small hostile stream cannot expand without bound.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use crate::io::InputLimitedStream;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder {
    /// Maximum decoded size in bytes (0 = unlimited)
    pub max_output: usize,
}

impl FlateDecoder {
    fn limit(&self) -> u64 {
        if self.max_output == 0 {
            u64::MAX
        } else {
            self.max_output as u64 + 1
        }
    }

    fn read_bounded(&self, reader: Box<dyn Read + '_>) -> std::io::Result<Vec<u8>> {
        let mut limited = InputLimitedStream::owned(reader, self.limit());
        let mut output = Vec::new();
        limited.read_to_end(&mut output)?;
        Ok(output)
    }

    fn check_size(&self, output: Vec<u8>) -> Result<Vec<u8>> {
        if self.max_output > 0 && output.len() > self.max_output {
            return Err(Error::Decode(format!(
                "decompressed size exceeds limit of {} bytes",
                self.max_output
            )));
        }
        Ok(output)
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.read_bounded(Box::new(ZlibDecoder::new(input))) {
            Ok(output) => self.check_size(output),
            Err(e) => {
                // Some producers omit the zlib wrapper.
                log::debug!("Zlib decode failed ({}), trying raw deflate", e);
                match self.read_bounded(Box::new(DeflateDecoder::new(input))) {
                    Ok(output) if !output.is_empty() => self.check_size(output),
                    _ => Err(Error::Decode(format!("FlateDecode failed: {}", e))),
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
