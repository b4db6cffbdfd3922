//! PDF object parser.
//!
//! Combines tokens from the [`Tokenizer`] into complete objects using
//! recursive descent with a token pushback queue:
//!
//! 1. Read a token (from the pushback queue first)
//! 2. Classify it
//! 3. For composite types (arrays, dictionaries) recurse
//!
//! An integer may start an indirect reference (`12 0 R`); the parser reads
//! two tokens ahead and pushes them back when they do not complete one, so
//! `12 0 obj` yields `12`, `0` and the `obj` symbol.
//!
//! A dictionary directly followed by the `stream` keyword becomes a
//! [`StreamInput`] holding the position of the first content byte; the
//! content itself is left for the caller.
//!
//! # Error Handling
//!
//! `parse_new_object` reports failures as `None`, logging the reason.

use crate::encryption::DecryptionHelper;
use crate::error::{Error, Result};
use crate::lexer::{decode_name_escapes, parse_number, Number, Tokenizer};
use crate::object::{Dictionary, Object, ObjectRef, StreamInput};
use crate::parser_config::ParserOptions;
use std::collections::VecDeque;
use std::io::{Read, Seek};

/// Fallback string decryption for encrypted documents whose key the
/// decryption helper does not know.
pub trait ParserExtender {
    /// True when `decrypt_string` should be applied.
    fn supports_decryption(&self) -> bool;

    /// Decrypt a string token's bytes.
    fn decrypt_string(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Decode escape sequences in PDF literal strings.
///
/// ISO 32000-1:2008, Section 7.3.4.2:
///
/// - `\n`, `\r`, `\t`, `\b`, `\f`, `\(`, `\)`, `\\`
/// - `\ddd` → byte with octal code (1-3 digits)
/// - `\<newline>` → line continuation (ignored)
/// - an unescaped CR or CRLF reads as a single LF
///
/// ```
/// # use charta::parser::decode_literal_string_escapes;
/// let decoded = decode_literal_string_escapes(b"Section \\247 71.01");
/// assert_eq!(decoded, b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'\\' if i + 1 < raw.len() => {
                i += 1;
                match raw[i] {
                    b'n' => result.push(b'\n'),
                    b'r' => result.push(b'\r'),
                    b't' => result.push(b'\t'),
                    b'b' => result.push(0x08),
                    b'f' => result.push(0x0C),
                    b'\n' => {},
                    b'\r' => {
                        if raw.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'0'..=b'7' => {
                        let mut value = 0u32;
                        let mut len = 0;
                        while len < 3 && i + len < raw.len() && (b'0'..=b'7').contains(&raw[i + len]) {
                            value = value * 8 + (raw[i + len] - b'0') as u32;
                            len += 1;
                        }
                        result.push((value & 0xFF) as u8);
                        i += len - 1;
                    },
                    // \( \) \\ and unknown escapes: the character itself
                    other => result.push(other),
                }
                i += 1;
            },
            b'\r' => {
                result.push(b'\n');
                i += 1;
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            byte => {
                result.push(byte);
                i += 1;
            },
        }
    }

    result
}

/// Decode hex string content: whitespace ignored, odd length padded with 0.
///
/// ```
/// # use charta::parser::decode_hex;
/// assert_eq!(decode_hex(b"90 1F A").unwrap(), vec![0x90, 0x1F, 0xA0]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(hex_bytes.len() / 2 + 1);
    let mut high: Option<u8> = None;
    for &byte in hex_bytes {
        if byte.is_ascii_whitespace() || byte == 0 {
            continue;
        }
        let nibble = (byte as char).to_digit(16).ok_or_else(|| {
            Error::Decode(format!("invalid hex digit 0x{:02X} in hex string", byte))
        })? as u8;
        match high.take() {
            Some(h) => result.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

/// Streaming parser for PDF objects.
pub struct PdfObjectParser<R> {
    tokenizer: Tokenizer<R>,
    pushback: VecDeque<Vec<u8>>,
    decryption: Option<Box<dyn DecryptionHelper>>,
    extender: Option<Box<dyn ParserExtender>>,
    options: ParserOptions,
}

impl<R: Read + Seek> PdfObjectParser<R> {
    /// Parse from the source's current position with default options.
    pub fn new(source: R) -> Self {
        Self::with_options(source, ParserOptions::default())
    }

    /// Parse with explicit options.
    pub fn with_options(source: R, options: ParserOptions) -> Self {
        Self {
            tokenizer: Tokenizer::new(source),
            pushback: VecDeque::new(),
            decryption: None,
            extender: None,
            options,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Install the decryption helper used for string objects.
    pub fn set_decryption_helper(&mut self, helper: Option<Box<dyn DecryptionHelper>>) {
        self.decryption = helper;
    }

    /// The installed decryption helper.
    pub fn decryption_helper_mut(&mut self) -> Option<&mut (dyn DecryptionHelper + 'static)> {
        self.decryption.as_deref_mut()
    }

    /// Install a fallback string decryptor.
    pub fn set_parser_extender(&mut self, extender: Option<Box<dyn ParserExtender>>) {
        self.extender = extender;
    }

    /// Drop pushed back tokens and the tokenizer lookahead.
    pub fn reset_read_state(&mut self) {
        self.pushback.clear();
        self.tokenizer.reset_read_state();
    }

    /// Continue parsing at an absolute position.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.pushback.clear();
        self.tokenizer.set_position(position)?;
        Ok(())
    }

    /// Position of the tokenizer (pushed back tokens not accounted for).
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.tokenizer.position()?)
    }

    /// Raw access to the source for reading stream content.
    pub fn source_mut(&mut self) -> &mut R {
        self.pushback.clear();
        self.tokenizer.source_mut()
    }

    /// Unwrap, returning the source.
    pub fn into_inner(self) -> R {
        self.tokenizer.into_inner()
    }

    /// Parse the next object; `None` at end of input or on failure.
    pub fn parse_new_object(&mut self) -> Option<Object> {
        match self.parse_object(0) {
            Ok(object) => object,
            Err(e) => {
                log::debug!("Failed to parse object: {}", e);
                None
            },
        }
    }

    fn next_token(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(token) = self.pushback.pop_front() {
            return Ok(Some(token));
        }
        Ok(self.tokenizer.next_token()?)
    }

    fn error(&mut self, reason: impl Into<String>) -> Error {
        Error::ParseError {
            offset: self.tokenizer.position().unwrap_or(0),
            reason: reason.into(),
        }
    }

    fn maybe_decrypt(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let helper = match self.decryption.as_deref() {
            Some(helper) if helper.is_encrypted() => helper,
            _ => return Ok(data),
        };
        if helper.can_decrypt_document() {
            return helper.decrypt_string(&data);
        }
        match self.extender.as_deref() {
            Some(extender) if extender.supports_decryption() => extender.decrypt_string(&data),
            _ => Ok(data),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<Option<Object>> {
        if depth > self.options.max_nesting {
            return Err(Error::RecursionLimitExceeded(self.options.max_nesting));
        }
        let token = match self.next_token()? {
            Some(token) => token,
            None => return Ok(None),
        };

        let object = match token.as_slice() {
            b"true" => Object::Boolean(true),
            b"false" => Object::Boolean(false),
            b"null" => Object::Null,
            b"<<" => self.parse_dictionary(depth)?,
            b"[" => self.parse_array(depth)?,
            b">>" | b"]" => {
                let reason = format!("unexpected '{}'", String::from_utf8_lossy(&token));
                return Err(self.error(reason));
            },
            [b'(', ..] => {
                if token.len() < 2 || token[token.len() - 1] != b')' {
                    return Err(self.error("unterminated literal string"));
                }
                let decoded = decode_literal_string_escapes(&token[1..token.len() - 1]);
                Object::LiteralString(self.maybe_decrypt(decoded)?)
            },
            [b'<', ..] => {
                if token.len() < 2 || token[token.len() - 1] != b'>' {
                    return Err(self.error("unterminated hex string"));
                }
                let decoded = decode_hex(&token[1..token.len() - 1])?;
                Object::HexString(self.maybe_decrypt(decoded)?)
            },
            [b'/', rest @ ..] => match decode_name_escapes(rest) {
                Some(name) => Object::Name(name),
                None => {
                    let reason = format!("malformed name escape in {}", String::from_utf8_lossy(&token));
                    return Err(self.error(reason));
                },
            },
            _ => match parse_number(&token) {
                Some(Number::Integer(value)) => self.maybe_reference(value)?,
                Some(Number::Real(value)) => Object::Real(value),
                None => Object::Symbol(String::from_utf8_lossy(&token).into_owned()),
            },
        };
        Ok(Some(object))
    }

    /// Having read an integer, check for `G R` following it.
    fn maybe_reference(&mut self, value: i64) -> Result<Object> {
        if value <= 0 {
            return Ok(Object::Integer(value));
        }
        let second = match self.next_token()? {
            Some(token) => token,
            None => return Ok(Object::Integer(value)),
        };
        let generation = match parse_number(&second) {
            Some(Number::Integer(generation)) if (0..=i64::from(u16::MAX)).contains(&generation) => generation,
            _ => {
                self.pushback.push_front(second);
                return Ok(Object::Integer(value));
            },
        };
        let third = match self.next_token()? {
            Some(token) => token,
            None => {
                self.pushback.push_front(second);
                return Ok(Object::Integer(value));
            },
        };
        if third == b"R" {
            return Ok(Object::Reference(ObjectRef::new(value as u64, generation as u16)));
        }
        self.pushback.push_front(third);
        self.pushback.push_front(second);
        Ok(Object::Integer(value))
    }

    fn parse_array(&mut self, depth: usize) -> Result<Object> {
        let mut items = Vec::new();
        loop {
            match self.next_token()? {
                None => return Err(self.error("unterminated array")),
                Some(token) if token == b"]" => break,
                Some(token) => {
                    self.pushback.push_front(token);
                    let item = self
                        .parse_object(depth + 1)?
                        .ok_or_else(|| self.error("unterminated array"))?;
                    items.push(item);
                },
            }
        }
        Ok(Object::Array(items))
    }

    fn parse_dictionary(&mut self, depth: usize) -> Result<Object> {
        let mut dict = Dictionary::new();
        loop {
            let token = match self.next_token()? {
                None => return Err(self.error("unterminated dictionary")),
                Some(token) => token,
            };
            if token == b">>" {
                break;
            }
            let key = match token.split_first().and_then(|(first, rest)| match first {
                b'/' => decode_name_escapes(rest),
                _ => None,
            }) {
                Some(key) => key,
                None => {
                    let reason = format!("dictionary key is not a name: {}", String::from_utf8_lossy(&token));
                    return Err(self.error(reason));
                },
            };
            let value = match self.next_token()? {
                Some(token) if token == b">>" => return Err(self.error(format!("missing value for /{}", key))),
                Some(token) => {
                    self.pushback.push_front(token);
                    self.parse_object(depth + 1)?
                        .ok_or_else(|| self.error("unterminated dictionary"))?
                },
                None => return Err(self.error("unterminated dictionary")),
            };
            if dict.contains_key(&key) {
                if self.options.strict {
                    log::warn!("Duplicate dictionary key /{}, keeping the first value", key);
                } else {
                    log::debug!("Duplicate dictionary key /{}, keeping the first value", key);
                }
                continue;
            }
            dict.insert(key, value);
        }

        match self.next_token()? {
            Some(token) if token == b"stream" => {
                if !self.pushback.is_empty() {
                    return Err(self.error("stream keyword after pushed back tokens"));
                }
                let content_start = self.tokenizer.position()?;
                Ok(Object::StreamInput(StreamInput { dict, content_start }))
            },
            Some(token) => {
                self.pushback.push_front(token);
                Ok(Object::Dictionary(dict))
            },
            None => Ok(Object::Dictionary(dict)),
        }
    }
}
