//! PDF encryption support.
//!
//! Writers and parsers never talk to ciphers directly. They hold an
//! [`EncryptionHelper`] or [`DecryptionHelper`] that knows which object is
//! being processed and derives the per-object key.
//!
//! - RC4 encryption (40-bit and 128-bit) for PDF 1.4-1.5
//! - AES-128 encryption with CBC mode for PDF 1.6+
//!
//! # References
//!
//! - PDF Spec Section 7.6: Encryption
//! - PDF Spec Section 7.6.2: Algorithm 1 (object key derivation)

use crate::error::Result;
use crate::object::ObjectId;

mod aes;
mod rc4;
mod standard;

pub use aes::{aes128_decrypt, aes128_encrypt};
pub use rc4::rc4_crypt;
pub use standard::{StandardDecryption, StandardEncryption};

/// Encryption algorithm used in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// RC4 with 40-bit key (PDF 1.4, V=1, R=2)
    Rc4_40,
    /// RC4 with 128-bit key (PDF 1.5, V=2, R=3)
    Rc4_128,
    /// AES with 128-bit key in CBC mode (PDF 1.6, V=4, R=4)
    Aes128,
}

impl Algorithm {
    /// Get the document key length in bytes for this algorithm.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 => 16,
            Algorithm::Aes128 => 16,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128)
    }
}

/// Incremental encryptor for one stream's content.
pub trait StreamEncryptor {
    /// Encrypt the next chunk, returning the bytes ready for output.
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>>;

    /// Flush any held bytes (padding included).
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Write-side encryption capability.
///
/// `ObjectsContext` brackets every indirect object with `on_object_start` /
/// `on_object_end` and pauses string encryption while stream content is
/// written, since the stream encryptor already covers those bytes.
pub trait EncryptionHelper {
    /// True when the document is encrypted and encryption is not paused.
    fn is_encrypting(&self) -> bool;

    /// Encrypt a string belonging to the current object.
    fn encrypt_string(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// An indirect object begins.
    fn on_object_start(&mut self, id: ObjectId, generation: u16);

    /// The current indirect object ends.
    fn on_object_end(&mut self);

    /// Suspend string encryption; calls nest.
    fn pause_encryption(&mut self);

    /// Undo one `pause_encryption`.
    fn release_encryption(&mut self);

    /// Encryptor for stream content of the current object, or `None` when
    /// not encrypting.
    fn create_stream_encryptor(&self) -> Result<Option<Box<dyn StreamEncryptor>>>;
}

/// Read-side decryption capability.
pub trait DecryptionHelper {
    /// True when the document being read is encrypted.
    fn is_encrypted(&self) -> bool;

    /// True when the key needed for this document is known.
    fn can_decrypt_document(&self) -> bool;

    /// Decrypt a string belonging to the current object.
    fn decrypt_string(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a whole stream payload belonging to the current object.
    fn decrypt_stream(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_string(data)
    }

    /// An indirect object is about to be parsed.
    fn on_object_start(&mut self, id: ObjectId, generation: u16);

    /// The current object has been parsed.
    fn on_object_end(&mut self);
}
