//! Textual encoding of PDF primitives.
//!
//! Every write is followed by a separator so consecutive tokens never run
//! together. Names escape delimiters and non-regular characters as `#XX`;
//! literal strings escape parentheses, backslashes and control bytes so any
//! byte sequence survives a round trip through the parser.

use crate::error::Result;
use crate::object::ObjectRef;
use std::io::Write;

/// What follows a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSeparator {
    /// A single space
    Space,
    /// A line feed
    EndLine,
    /// Nothing
    None,
}

/// Writes primitive tokens into a byte sink.
pub struct PrimitiveWriter<'a, W: Write + ?Sized> {
    out: &'a mut W,
}

/// Characters that end a regular token.
pub(crate) fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// PDF whitespace (PDF Ref 1.7, Table 3.1).
pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Format a real the way it is written: up to five decimals, trailing zeros
/// trimmed, at least one digit after the point.
pub(crate) fn format_real(value: f64) -> String {
    if !value.is_finite() {
        log::warn!("Writing non-finite real {} as 0.0", value);
        return "0.0".to_string();
    }
    let mut formatted = format!("{:.5}", value);
    while formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.push('0');
    }
    if formatted == "-0.0" {
        formatted.remove(0);
    }
    formatted
}

impl<'a, W: Write + ?Sized> PrimitiveWriter<'a, W> {
    /// Wrap a sink.
    pub fn new(out: &'a mut W) -> Self {
        Self { out }
    }

    fn separator(&mut self, separator: TokenSeparator) -> Result<()> {
        match separator {
            TokenSeparator::Space => self.out.write_all(b" ")?,
            TokenSeparator::EndLine => self.out.write_all(b"\n")?,
            TokenSeparator::None => {},
        }
        Ok(())
    }

    /// Write a bare keyword followed by a line feed.
    pub fn write_keyword(&mut self, keyword: &str) -> Result<()> {
        self.out.write_all(keyword.as_bytes())?;
        self.end_line()
    }

    /// Write a bare token such as `R` or `obj`.
    pub fn write_symbol(&mut self, symbol: &str, separator: TokenSeparator) -> Result<()> {
        self.out.write_all(symbol.as_bytes())?;
        self.separator(separator)
    }

    /// Write a line feed.
    pub fn end_line(&mut self) -> Result<()> {
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Write `/Name`.
    pub fn write_name(&mut self, name: &str, separator: TokenSeparator) -> Result<()> {
        self.out.write_all(b"/")?;
        for byte in name.bytes() {
            if (0x21..=0x7E).contains(&byte) && !is_delimiter(byte) && byte != b'#' {
                self.out.write_all(&[byte])?;
            } else {
                write!(self.out, "#{:02X}", byte)?;
            }
        }
        self.separator(separator)
    }

    /// Write an integer.
    pub fn write_integer(&mut self, value: i64, separator: TokenSeparator) -> Result<()> {
        write!(self.out, "{}", value)?;
        self.separator(separator)
    }

    /// Write a real number.
    pub fn write_real(&mut self, value: f64, separator: TokenSeparator) -> Result<()> {
        self.out.write_all(format_real(value).as_bytes())?;
        self.separator(separator)
    }

    /// Write `true` or `false`.
    pub fn write_boolean(&mut self, value: bool, separator: TokenSeparator) -> Result<()> {
        self.out
            .write_all(if value { b"true" as &[u8] } else { b"false" })?;
        self.separator(separator)
    }

    /// Write `null`.
    pub fn write_null(&mut self, separator: TokenSeparator) -> Result<()> {
        self.out.write_all(b"null")?;
        self.separator(separator)
    }

    /// Write `(...)` with escapes.
    pub fn write_literal_string(&mut self, data: &[u8], separator: TokenSeparator) -> Result<()> {
        self.out.write_all(b"(")?;
        for &byte in data {
            match byte {
                b'(' => self.out.write_all(b"\\(")?,
                b')' => self.out.write_all(b"\\)")?,
                b'\\' => self.out.write_all(b"\\\\")?,
                b'\n' => self.out.write_all(b"\\n")?,
                b'\r' => self.out.write_all(b"\\r")?,
                b'\t' => self.out.write_all(b"\\t")?,
                0x08 => self.out.write_all(b"\\b")?,
                0x0C => self.out.write_all(b"\\f")?,
                0x20..=0x7E => self.out.write_all(&[byte])?,
                _ => write!(self.out, "\\{:03o}", byte)?,
            }
        }
        self.out.write_all(b")")?;
        self.separator(separator)
    }

    /// Write `<...>` in uppercase hex.
    pub fn write_hex_string(&mut self, data: &[u8], separator: TokenSeparator) -> Result<()> {
        self.out.write_all(b"<")?;
        for byte in data {
            write!(self.out, "{:02X}", byte)?;
        }
        self.out.write_all(b">")?;
        self.separator(separator)
    }

    /// Write `N G R`.
    pub fn write_indirect_reference(&mut self, reference: ObjectRef, separator: TokenSeparator) -> Result<()> {
        write!(self.out, "{} {} R", reference.id, reference.gen)?;
        self.separator(separator)
    }

    /// Write `[` followed by a space.
    pub fn start_array(&mut self) -> Result<()> {
        self.out.write_all(b"[ ")?;
        Ok(())
    }

    /// Write `]`.
    pub fn end_array(&mut self, separator: TokenSeparator) -> Result<()> {
        self.out.write_all(b"]")?;
        self.separator(separator)
    }
}
