//! AES-128 in CBC mode for PDF 1.6+ standard security.
//!
//! Encrypted strings and streams carry their 16-byte IV in front of the
//! ciphertext and use PKCS#7 padding.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

use super::StreamEncryptor;
use crate::error::{Error, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use md5::{Digest, Md5};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK: usize = 16;

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != BLOCK {
        return Err(Error::Encryption(format!(
            "AES-128 key must be 16 bytes, got {}",
            key.len()
        )));
    }
    Ok(())
}

/// Fresh 16-byte IV from a v4 UUID and the clock, hashed with MD5.
pub(crate) fn generate_iv() -> [u8; BLOCK] {
    let mut hasher = Md5::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    hasher.update(now.as_nanos().to_le_bytes());
    let mut iv = [0u8; BLOCK];
    iv.copy_from_slice(&hasher.finalize());
    iv
}

/// Encrypt a buffer: IV followed by the PKCS#7 padded ciphertext.
pub fn aes128_encrypt(key: &[u8], iv: &[u8; BLOCK], data: &[u8]) -> Result<Vec<u8>> {
    let mut encryptor = AesStreamEncryptor::with_iv(key, *iv)?;
    let mut out = encryptor.update(data)?;
    out.extend(Box::new(encryptor).finish()?);
    Ok(out)
}

/// Decrypt IV-prefixed ciphertext and strip PKCS#7 padding.
pub fn aes128_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;
    if data.len() < BLOCK {
        return Err(Error::Encryption("AES data shorter than its IV".to_string()));
    }
    let (iv, body) = data.split_at(BLOCK);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body.len() % BLOCK != 0 {
        return Err(Error::Encryption(
            "Encrypted data length must be multiple of 16".to_string(),
        ));
    }

    let mut buffer = body.to_vec();
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    let decrypted = cipher
        .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
        .map_err(|_| Error::Encryption("AES decryption failed".to_string()))?;

    let padding = decrypted.last().copied().unwrap_or(0) as usize;
    if padding == 0 || padding > BLOCK || padding > decrypted.len() {
        return Err(Error::Encryption("Invalid PKCS#7 padding".to_string()));
    }
    let data_len = decrypted.len() - padding;
    if decrypted[data_len..].iter().any(|&b| b as usize != padding) {
        return Err(Error::Encryption("Invalid PKCS#7 padding".to_string()));
    }
    Ok(decrypted[..data_len].to_vec())
}

/// Incremental CBC encryptor.
///
/// The IV is emitted before the first ciphertext block; an incomplete block is
/// held until more input arrives or `finish` pads it.
pub(crate) struct AesStreamEncryptor {
    cipher: Aes128CbcEnc,
    iv: [u8; BLOCK],
    wrote_iv: bool,
    pending: Vec<u8>,
}

impl AesStreamEncryptor {
    pub(crate) fn new(key: &[u8]) -> Result<Self> {
        Self::with_iv(key, generate_iv())
    }

    pub(crate) fn with_iv(key: &[u8], iv: [u8; BLOCK]) -> Result<Self> {
        check_key(key)?;
        Ok(Self {
            cipher: Aes128CbcEnc::new(key.into(), iv.as_slice().into()),
            iv,
            wrote_iv: false,
            pending: Vec::with_capacity(BLOCK),
        })
    }

    fn take_iv(&mut self, out: &mut Vec<u8>) {
        if !self.wrote_iv {
            out.extend_from_slice(&self.iv);
            self.wrote_iv = true;
        }
    }

    fn encrypt_block(&mut self, block: &mut [u8]) {
        self.cipher
            .encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

impl StreamEncryptor for AesStreamEncryptor {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() + BLOCK * 2);
        self.take_iv(&mut out);

        self.pending.extend_from_slice(data);
        let full = self.pending.len() / BLOCK * BLOCK;
        let mut blocks: Vec<u8> = self.pending.drain(..full).collect();
        for chunk in blocks.chunks_mut(BLOCK) {
            self.encrypt_block(chunk);
        }
        out.extend(blocks);
        Ok(out)
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(BLOCK * 2);
        self.take_iv(&mut out);

        // PKCS#7: an empty remainder still gets a full padding block.
        let padding = BLOCK - self.pending.len();
        let mut last = std::mem::take(&mut self.pending);
        last.resize(BLOCK, padding as u8);
        self.encrypt_block(&mut last);
        out.extend(last);
        Ok(out)
    }
}
