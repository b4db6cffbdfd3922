//! RC4 for PDF standard security (40 and 128 bit keys).
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

use super::StreamEncryptor;
use crate::error::Result;

/// RC4 keystream state.
pub(crate) struct Rc4Cipher {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4Cipher {
    /// Key schedule. PDF keys are 5-16 bytes; an empty key yields the
    /// identity permutation.
    pub(crate) fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, val) in s.iter_mut().enumerate() {
            *val = i as u8;
        }

        if !key.is_empty() {
            let mut j = 0u8;
            for i in 0..256 {
                j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
                s.swap(i, j as usize);
            }
        }

        Self { s, i: 0, j: 0 }
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);
        self.s.swap(self.i as usize, self.j as usize);
        let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
        self.s[k as usize]
    }

    /// XOR the keystream into `data`, continuing where the last call stopped.
    pub(crate) fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

/// Encrypt or decrypt a whole buffer (RC4 is symmetric).
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut cipher = Rc4Cipher::new(key);
    let mut result = data.to_vec();
    cipher.apply_keystream(&mut result);
    result
}

/// Stream encryptor producing output byte for byte.
pub(crate) struct Rc4StreamEncryptor {
    cipher: Rc4Cipher,
}

impl Rc4StreamEncryptor {
    pub(crate) fn new(key: &[u8]) -> Self {
        Self {
            cipher: Rc4Cipher::new(key),
        }
    }
}

impl StreamEncryptor for Rc4StreamEncryptor {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = data.to_vec();
        self.cipher.apply_keystream(&mut out);
        Ok(out)
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
