//! PDF tokenizer over a seekable byte source.
//!
//! Tokens are returned as raw byte strings exactly as they appear in the
//! input (strings keep their delimiters, names keep the leading `/`); the
//! object parser classifies them. Whitespace (space, \t, \r, \n, \0, \f)
//! and comments (% to EOL) are skipped.
//!
//! The tokenizer holds at most one byte of lookahead, so the current read
//! position is always `source position - (0 or 1)`. After the `stream`
//! keyword the end-of-line marker is consumed, which leaves the position at
//! the first content byte.

use crate::writer::primitive_writer::{is_delimiter, is_whitespace};
use nom::{
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, opt},
    sequence::preceded,
    IResult,
};
use std::io::{self, Read, Seek, SeekFrom};

/// Numeric value of a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5, 7.)
    Real(f64),
}

fn digits_or_zero(bytes: Option<&[u8]>) -> &str {
    bytes.and_then(|b| std::str::from_utf8(b).ok()).unwrap_or("0")
}

/// Parse a number (PDF Ref 1.7, Section 3.2.2).
///
/// - Integers: 123, -98, +17, 0
/// - Reals: 3.14, -2.5, .5, 0., -.002
fn number(input: &[u8]) -> IResult<&[u8], Number> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    // Must have digits before or after the decimal point
    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let negative = sign == Some('-');

    let value = match frac_part {
        Some(frac) => {
            let text = format!("{}.{}", digits_or_zero(int_part), digits_or_zero(frac));
            let real: f64 = text.parse().map_err(|_| {
                nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
            })?;
            Number::Real(if negative { -real } else { real })
        },
        None => {
            let text = digits_or_zero(int_part);
            match text.parse::<i64>() {
                Ok(integer) => Number::Integer(if negative { -integer } else { integer }),
                // Out of i64 range; keep the magnitude as a real.
                Err(_) => {
                    let real: f64 = text.parse().unwrap_or(0.0);
                    Number::Real(if negative { -real } else { real })
                },
            }
        },
    };
    Ok((input, value))
}

/// Classify a whole token as a number.
pub fn parse_number(token: &[u8]) -> Option<Number> {
    all_consuming(number)(token).ok().map(|(_, value)| value)
}

/// Decode `#XX` escapes in a name (without the leading `/`).
///
/// PDF Spec: ISO 32000-1:2008, Section 7.3.5 - Name Objects.
/// A `#` not followed by two hex digits makes the name invalid.
///
/// ```
/// # use charta::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C").as_deref(), Some("A B#C"));
/// assert_eq!(decode_name_escapes(b"A#"), None);
/// ```
pub fn decode_name_escapes(name: &[u8]) -> Option<String> {
    let mut decoded = Vec::with_capacity(name.len());
    let mut i = 0;
    while i < name.len() {
        if name[i] == b'#' {
            let pair = name.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(pair).ok()?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
            continue;
        }
        decoded.push(name[i]);
        i += 1;
    }
    Some(String::from_utf8_lossy(&decoded).into_owned())
}

fn unterminated() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unterminated literal string")
}

/// Byte tokenizer with one byte of lookahead.
pub struct Tokenizer<R> {
    source: R,
    pending: Option<u8>,
}

impl<R: Read + Seek> Tokenizer<R> {
    /// Tokenize from the source's current position.
    pub fn new(source: R) -> Self {
        Self { source, pending: None }
    }

    /// Forget the lookahead byte (call after moving the source).
    pub fn reset_read_state(&mut self) {
        self.pending = None;
    }

    /// Move to an absolute position.
    pub fn set_position(&mut self, position: u64) -> io::Result<()> {
        self.source.seek(SeekFrom::Start(position))?;
        self.reset_read_state();
        Ok(())
    }

    /// Position of the next byte the tokenizer will look at.
    pub fn position(&mut self) -> io::Result<u64> {
        let position = self.source.stream_position()?;
        Ok(position - u64::from(self.pending.is_some()))
    }

    /// Direct access to the source. The lookahead byte is discarded, so
    /// callers should seek before reading.
    pub fn source_mut(&mut self) -> &mut R {
        self.reset_read_state();
        &mut self.source
    }

    /// Unwrap, returning the source.
    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pending.take() {
            return Ok(Some(byte));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.source.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn skip_line(&mut self) -> io::Result<()> {
        while let Some(byte) = self.read_byte()? {
            if byte == b'\n' {
                break;
            }
            if byte == b'\r' {
                match self.read_byte()? {
                    Some(b'\n') | None => {},
                    Some(other) => self.pending = Some(other),
                }
                break;
            }
        }
        Ok(())
    }

    /// Consume the end-of-line marker that follows `stream`: CRLF, LF, or a
    /// lone CR.
    fn skip_stream_eol(&mut self) -> io::Result<()> {
        match self.read_byte()? {
            Some(b'\r') => match self.read_byte()? {
                Some(b'\n') | None => {},
                Some(other) => self.pending = Some(other),
            },
            Some(b'\n') | None => {},
            Some(other) => self.pending = Some(other),
        }
        Ok(())
    }

    fn read_literal_string(&mut self, token: &mut Vec<u8>) -> io::Result<()> {
        let mut depth = 1usize;
        while let Some(byte) = self.read_byte()? {
            token.push(byte);
            match byte {
                b'\\' => {
                    let escaped = self.read_byte()?.ok_or_else(unterminated)?;
                    token.push(escaped);
                },
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                },
                _ => {},
            }
        }
        if depth > 0 {
            return Err(unterminated());
        }
        Ok(())
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> io::Result<Option<Vec<u8>>> {
        let first = loop {
            match self.read_byte()? {
                None => return Ok(None),
                Some(b'%') => self.skip_line()?,
                Some(byte) if is_whitespace(byte) => {},
                Some(byte) => break byte,
            }
        };

        let mut token = vec![first];
        match first {
            b'(' => self.read_literal_string(&mut token)?,
            b'<' => match self.read_byte()? {
                Some(b'<') => token.push(b'<'),
                Some(byte) => {
                    let mut next = Some(byte);
                    while let Some(byte) = next {
                        token.push(byte);
                        if byte == b'>' {
                            break;
                        }
                        next = self.read_byte()?;
                    }
                },
                None => {},
            },
            b'>' => match self.read_byte()? {
                Some(b'>') => token.push(b'>'),
                other => self.pending = other,
            },
            b'[' | b']' | b'{' | b'}' | b')' => {},
            _ => {
                while let Some(byte) = self.read_byte()? {
                    if is_whitespace(byte) || is_delimiter(byte) {
                        self.pending = Some(byte);
                        break;
                    }
                    token.push(byte);
                }
            },
        }

        if token == b"stream" {
            // Whitespace other than the EOL would belong to the content.
            if self.pending.is_some_and(|b| b != b'\r' && b != b'\n') {
                return Ok(Some(token));
            }
            self.skip_stream_eol()?;
        }
        Ok(Some(token))
    }
}
