//! Type 2 charstring flattening.
//!
//! Subroutine calls are replaced by the body of the called subroutine, so
//! the subset can be written without global or local subroutines. Operands
//! are copied with their original encoding; only the subroutine number
//! consumed by `callsubr`/`callgsubr` is dropped.

use super::font::CffFont;
use super::index::Index;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Subroutine nesting limit of the Type 2 format.
const MAX_SUBR_DEPTH: usize = 10;

const HSTEM: u16 = 1;
const VSTEM: u16 = 3;
const CALLSUBR: u16 = 10;
const RETURN: u16 = 11;
const ENDCHAR: u16 = 14;
const HSTEMHM: u16 = 18;
const HINTMASK: u16 = 19;
const CNTRMASK: u16 = 20;
const VSTEMHM: u16 = 23;
const CALLGSUBR: u16 = 29;

/// Base and accent character codes (standard encoding) of an `endchar`
/// used as `seac`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AccentedCharacter {
    pub(crate) base: u8,
    pub(crate) accent: u8,
}

/// A glyph program with every subroutine call inlined.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlattenedGlyph {
    pub(crate) program: Vec<u8>,
    pub(crate) accented: Option<AccentedCharacter>,
}

struct Operand {
    encoded: Vec<u8>,
    value: f64,
}

struct Flattener<'f, 'a> {
    font: &'f CffFont<'a>,
    local_subrs: Option<&'f Index<'a>>,
    gid: u16,
    output: Vec<u8>,
    operands: Vec<Operand>,
    stem_count: usize,
    accented: Option<AccentedCharacter>,
    finished: bool,
}

/// Flatten the charstring of glyph `gid`.
pub(crate) fn flatten_glyph(font: &CffFont<'_>, gid: u16) -> Result<FlattenedGlyph> {
    let program = font.char_strings.get(gid as usize).ok_or(Error::GlyphOutOfRange {
        glyph: u32::from(gid),
        count: font.glyph_count() as u32,
    })?;
    let mut flattener = Flattener {
        font,
        local_subrs: font.local_subrs(gid),
        gid,
        output: Vec::with_capacity(program.len()),
        operands: Vec::new(),
        stem_count: 0,
        accented: None,
        finished: false,
    };
    flattener.run(program, 0)?;
    flattener.flush_operands();
    Ok(FlattenedGlyph {
        program: flattener.output,
        accented: flattener.accented,
    })
}

/// Number added to a subroutine operand to index the INDEX.
fn subr_bias(count: usize) -> i64 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}

impl Flattener<'_, '_> {
    fn error(&self, reason: impl std::fmt::Display) -> Error {
        log::error!("Charstring of glyph {}: {}", self.gid, reason);
        Error::Font(format!("charstring of glyph {}: {}", self.gid, reason))
    }

    fn run(&mut self, program: &[u8], depth: usize) -> Result<()> {
        if depth > MAX_SUBR_DEPTH {
            return Err(self.error("subroutines nested too deeply"));
        }

        let mut i = 0;
        while i < program.len() && !self.finished {
            let b0 = program[i];
            let operand_len = match b0 {
                28 => 3,
                32..=246 => 1,
                247..=254 => 2,
                255 => 5,
                _ => 0,
            };
            if operand_len > 0 {
                let encoded = program
                    .get(i..i + operand_len)
                    .ok_or_else(|| self.error("operand is truncated"))?;
                self.operands.push(Operand {
                    encoded: encoded.to_vec(),
                    value: operand_value(encoded),
                });
                i += operand_len;
                continue;
            }

            let operator = if b0 == 12 {
                let b1 = *program.get(i + 1).ok_or_else(|| self.error("escape operator is truncated"))?;
                i += 2;
                0x0C00 | u16::from(b1)
            } else {
                i += 1;
                u16::from(b0)
            };

            match operator {
                CALLSUBR | CALLGSUBR => self.call_subroutine(operator, depth)?,
                RETURN => return Ok(()),
                ENDCHAR => {
                    if self.operands.len() >= 4 {
                        let count = self.operands.len();
                        self.accented = Some(AccentedCharacter {
                            base: self.operands[count - 2].value as u8,
                            accent: self.operands[count - 1].value as u8,
                        });
                    }
                    self.emit_operator(operator);
                    self.finished = true;
                },
                HSTEM | VSTEM | HSTEMHM | VSTEMHM => {
                    self.stem_count += self.operands.len() / 2;
                    self.emit_operator(operator);
                },
                HINTMASK | CNTRMASK => {
                    // pending operands are an implicit vstemhm
                    self.stem_count += self.operands.len() / 2;
                    self.emit_operator(operator);
                    let mask_len = self.stem_count.div_ceil(8);
                    let mask = program
                        .get(i..i + mask_len)
                        .ok_or_else(|| self.error("hint mask is truncated"))?;
                    self.output.extend_from_slice(mask);
                    i += mask_len;
                },
                _ => self.emit_operator(operator),
            }
        }
        Ok(())
    }

    fn call_subroutine(&mut self, operator: u16, depth: usize) -> Result<()> {
        let number = self
            .operands
            .pop()
            .ok_or_else(|| self.error("subroutine call without a number"))?
            .value as i64;
        let font = self.font;
        let subrs = if operator == CALLSUBR {
            self.local_subrs.ok_or_else(|| self.error("callsubr without local subroutines"))?
        } else {
            &font.global_subrs
        };
        let index = number + subr_bias(subrs.len());
        let body = usize::try_from(index)
            .ok()
            .and_then(|index| subrs.get(index))
            .ok_or_else(|| self.error(format!("subroutine {} does not exist", number)))?;
        self.run(body, depth + 1)
    }

    fn flush_operands(&mut self) {
        for operand in self.operands.drain(..) {
            self.output.extend_from_slice(&operand.encoded);
        }
    }

    fn emit_operator(&mut self, operator: u16) {
        self.flush_operands();
        if operator > 0xFF {
            self.output.push(12);
        }
        self.output.push(operator as u8);
    }
}

fn operand_value(encoded: &[u8]) -> f64 {
    let b0 = encoded[0];
    match b0 {
        28 => f64::from(BigEndian::read_i16(&encoded[1..3])),
        32..=246 => f64::from(i32::from(b0) - 139),
        247..=250 => f64::from((i32::from(b0) - 247) * 256 + i32::from(encoded[1]) + 108),
        251..=254 => f64::from(-(i32::from(b0) - 251) * 256 - i32::from(encoded[1]) - 108),
        _ => f64::from(BigEndian::read_i32(&encoded[1..5])) / 65536.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_values() {
        assert_eq!(operand_value(&[139]), 0.0);
        assert_eq!(operand_value(&[32]), -107.0);
        assert_eq!(operand_value(&[247, 0]), 108.0);
        assert_eq!(operand_value(&[251, 0]), -108.0);
        assert_eq!(operand_value(&[28, 0x01, 0x00]), 256.0);
        assert_eq!(operand_value(&[255, 0, 1, 0x80, 0]), 1.5);
    }

    #[test]
    fn test_bias() {
        assert_eq!(subr_bias(0), 107);
        assert_eq!(subr_bias(1240), 1131);
        assert_eq!(subr_bias(33900), 32768);
    }
}
