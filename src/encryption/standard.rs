//! Standard security handler helpers built from an already derived document key.

use super::aes::{aes128_decrypt, aes128_encrypt, generate_iv, AesStreamEncryptor};
use super::rc4::{rc4_crypt, Rc4StreamEncryptor};
use super::{Algorithm, DecryptionHelper, EncryptionHelper, StreamEncryptor};
use crate::error::Result;
use crate::object::ObjectId;
use md5::{Digest, Md5};

/// Derive the object-specific key.
///
/// PDF Spec: Algorithm 1 - md5(key, low 3 bytes of the object number,
/// low 2 bytes of the generation, "sAlT" for AES), truncated to
/// min(n + 5, 16) bytes.
pub(crate) fn derive_object_key(key: &[u8], algorithm: Algorithm, id: ObjectId, generation: u16) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(&id.to_le_bytes()[..3]);
    hasher.update(generation.to_le_bytes());
    if algorithm.is_aes() {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();
    let key_length = (key.len() + 5).min(16);
    hash[..key_length].to_vec()
}

/// Encryption helper for the standard security handler.
pub struct StandardEncryption {
    key: Vec<u8>,
    algorithm: Algorithm,
    current: Option<(ObjectId, u16)>,
    pause_level: usize,
}

impl StandardEncryption {
    /// Create a helper from the document encryption key.
    pub fn new(key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            key,
            algorithm,
            current: None,
            pause_level: 0,
        }
    }

    /// The algorithm in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn object_key(&self) -> Option<Vec<u8>> {
        self.current
            .map(|(id, generation)| derive_object_key(&self.key, self.algorithm, id, generation))
    }
}

impl EncryptionHelper for StandardEncryption {
    fn is_encrypting(&self) -> bool {
        self.current.is_some() && self.pause_level == 0
    }

    fn encrypt_string(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = match self.object_key() {
            Some(key) => key,
            None => return Ok(data.to_vec()),
        };
        match self.algorithm {
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => Ok(rc4_crypt(&key, data)),
            Algorithm::Aes128 => aes128_encrypt(&key, &generate_iv(), data),
        }
    }

    fn on_object_start(&mut self, id: ObjectId, generation: u16) {
        self.current = Some((id, generation));
    }

    fn on_object_end(&mut self) {
        self.current = None;
    }

    fn pause_encryption(&mut self) {
        self.pause_level += 1;
    }

    fn release_encryption(&mut self) {
        self.pause_level = self.pause_level.saturating_sub(1);
    }

    fn create_stream_encryptor(&self) -> Result<Option<Box<dyn StreamEncryptor>>> {
        if !self.is_encrypting() {
            return Ok(None);
        }
        let key = match self.object_key() {
            Some(key) => key,
            None => return Ok(None),
        };
        let encryptor: Box<dyn StreamEncryptor> = match self.algorithm {
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => Box::new(Rc4StreamEncryptor::new(&key)),
            Algorithm::Aes128 => Box::new(AesStreamEncryptor::new(&key)?),
        };
        Ok(Some(encryptor))
    }
}

/// Decryption helper for the standard security handler.
///
/// A helper built with [`StandardDecryption::locked`] reports the document as
/// encrypted but cannot decrypt it.
pub struct StandardDecryption {
    key: Option<Vec<u8>>,
    algorithm: Algorithm,
    current: Option<(ObjectId, u16)>,
}

impl StandardDecryption {
    /// Create a helper that knows the document key.
    pub fn new(key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            key: Some(key),
            algorithm,
            current: None,
        }
    }

    /// Helper for an encrypted document whose key is unknown.
    pub fn locked(algorithm: Algorithm) -> Self {
        Self {
            key: None,
            algorithm,
            current: None,
        }
    }
}

impl DecryptionHelper for StandardDecryption {
    fn is_encrypted(&self) -> bool {
        true
    }

    fn can_decrypt_document(&self) -> bool {
        self.key.is_some()
    }

    fn decrypt_string(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (key, (id, generation)) = match (&self.key, self.current) {
            (Some(key), Some(current)) => (key, current),
            _ => return Ok(data.to_vec()),
        };
        let object_key = derive_object_key(key, self.algorithm, id, generation);
        match self.algorithm {
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => Ok(rc4_crypt(&object_key, data)),
            Algorithm::Aes128 => aes128_decrypt(&object_key, data),
        }
    }

    fn on_object_start(&mut self, id: ObjectId, generation: u16) {
        self.current = Some((id, generation));
    }

    fn on_object_end(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_derivation_rc4() {
        let key = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        let k1 = derive_object_key(&key, Algorithm::Rc4_40, 1, 0);
        let k2 = derive_object_key(&key, Algorithm::Rc4_40, 2, 0);
        let k3 = derive_object_key(&key, Algorithm::Rc4_40, 1, 1);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.len(), 10);
    }

    #[test]
    fn test_object_key_derivation_aes128() {
        let key = vec![0u8; 16];
        let k = derive_object_key(&key, Algorithm::Aes128, 1, 0);
        assert_eq!(k.len(), 16);
        assert_ne!(k, derive_object_key(&key, Algorithm::Rc4_128, 1, 0));
    }

    #[test]
    fn test_not_encrypting_outside_objects() {
        let mut helper = StandardEncryption::new(vec![1; 5], Algorithm::Rc4_40);
        assert!(!helper.is_encrypting());
        assert_eq!(helper.encrypt_string(b"abc").unwrap(), b"abc");

        helper.on_object_start(4, 0);
        assert!(helper.is_encrypting());
        helper.pause_encryption();
        helper.pause_encryption();
        helper.release_encryption();
        assert!(!helper.is_encrypting());
        assert!(helper.create_stream_encryptor().unwrap().is_none());
        helper.release_encryption();
        assert!(helper.is_encrypting());
        helper.on_object_end();
        assert!(!helper.is_encrypting());
    }

    #[test]
    fn test_string_round_trip_rc4() {
        let mut enc = StandardEncryption::new(vec![9; 16], Algorithm::Rc4_128);
        let mut dec = StandardDecryption::new(vec![9; 16], Algorithm::Rc4_128);
        enc.on_object_start(12, 0);
        dec.on_object_start(12, 0);
        let cipher = enc.encrypt_string(b"Secret title").unwrap();
        assert_ne!(cipher, b"Secret title");
        assert_eq!(dec.decrypt_string(&cipher).unwrap(), b"Secret title");
    }

    #[test]
    fn test_stream_round_trip_aes() {
        let mut enc = StandardEncryption::new(vec![5; 16], Algorithm::Aes128);
        let mut dec = StandardDecryption::new(vec![5; 16], Algorithm::Aes128);
        enc.on_object_start(3, 0);
        dec.on_object_start(3, 0);

        let mut stream = enc.create_stream_encryptor().unwrap().unwrap();
        let mut out = stream.update(b"BT /F1 12 Tf ").unwrap();
        out.extend(stream.update(b"(hello) Tj ET").unwrap());
        out.extend(stream.finish().unwrap());

        assert_eq!(dec.decrypt_stream(&out).unwrap(), b"BT /F1 12 Tf (hello) Tj ET");
    }

    #[test]
    fn test_locked_helper() {
        let dec = StandardDecryption::locked(Algorithm::Rc4_40);
        assert!(dec.is_encrypted());
        assert!(!dec.can_decrypt_document());
    }
}
