//! CFF DICT data: operand/operator sequences keyed by operator.

use super::malformed;
use crate::error::Result;
use byteorder::{BigEndian, ByteOrder};

/// Operators this crate reads or rewrites. Two byte operators are
/// `12 << 8 | second byte`.
pub(crate) mod op {
    pub(crate) const CHARSET: u16 = 15;
    pub(crate) const ENCODING: u16 = 16;
    pub(crate) const CHAR_STRINGS: u16 = 17;
    pub(crate) const PRIVATE: u16 = 18;
    pub(crate) const SUBRS: u16 = 19;
    pub(crate) const CHARSTRING_TYPE: u16 = 0x0C06;
    pub(crate) const POSTSCRIPT: u16 = 0x0C15;
    pub(crate) const ROS: u16 = 0x0C1E;
    pub(crate) const FD_ARRAY: u16 = 0x0C24;
    pub(crate) const FD_SELECT: u16 = 0x0C25;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Integer(i32),
    /// Packed BCD nibbles following the `30` prefix, terminator included
    Real(Vec<u8>),
}

impl Operand {
    pub(crate) fn as_integer(&self) -> Option<i32> {
        match self {
            Operand::Integer(value) => Some(*value),
            Operand::Real(_) => None,
        }
    }
}

/// Parsed DICT, entries in their original order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dict {
    entries: Vec<(u16, Vec<Operand>)>,
}

impl Dict {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut operands = Vec::new();
        let mut i = 0;
        let byte = |at: usize| {
            data.get(at)
                .copied()
                .ok_or_else(|| malformed("DICT operand is truncated"))
        };

        while i < data.len() {
            let b0 = data[i];
            match b0 {
                0..=11 | 13..=21 => {
                    entries.push((u16::from(b0), std::mem::take(&mut operands)));
                    i += 1;
                },
                12 => {
                    entries.push((0x0C00 | u16::from(byte(i + 1)?), std::mem::take(&mut operands)));
                    i += 2;
                },
                28 => {
                    let raw = data.get(i + 1..i + 3).ok_or_else(|| malformed("DICT operand is truncated"))?;
                    operands.push(Operand::Integer(i32::from(BigEndian::read_i16(raw))));
                    i += 3;
                },
                29 => {
                    let raw = data.get(i + 1..i + 5).ok_or_else(|| malformed("DICT operand is truncated"))?;
                    operands.push(Operand::Integer(BigEndian::read_i32(raw)));
                    i += 5;
                },
                30 => {
                    let start = i + 1;
                    let mut end = start;
                    loop {
                        let nibbles = byte(end)?;
                        end += 1;
                        if nibbles & 0x0F == 0x0F || nibbles >> 4 == 0x0F {
                            break;
                        }
                    }
                    operands.push(Operand::Real(data[start..end].to_vec()));
                    i = end;
                },
                32..=246 => {
                    operands.push(Operand::Integer(i32::from(b0) - 139));
                    i += 1;
                },
                247..=250 => {
                    let b1 = i32::from(byte(i + 1)?);
                    operands.push(Operand::Integer((i32::from(b0) - 247) * 256 + b1 + 108));
                    i += 2;
                },
                251..=254 => {
                    let b1 = i32::from(byte(i + 1)?);
                    operands.push(Operand::Integer(-(i32::from(b0) - 251) * 256 - b1 - 108));
                    i += 2;
                },
                _ => return Err(malformed(format!("reserved DICT byte {}", b0))),
            }
        }
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, operator: u16) -> Option<&[Operand]> {
        self.entries
            .iter()
            .find(|(entry_operator, _)| *entry_operator == operator)
            .map(|(_, operands)| operands.as_slice())
    }

    pub(crate) fn contains(&self, operator: u16) -> bool {
        self.get(operator).is_some()
    }

    /// First operand of `operator` as an integer.
    pub(crate) fn integer(&self, operator: u16) -> Option<i32> {
        self.get(operator)?.first()?.as_integer()
    }

    /// `(size, offset)` operands of a `Private` entry.
    pub(crate) fn private_range(&self) -> Option<(i32, i32)> {
        match self.get(op::PRIVATE)? {
            [size, offset] => Some((size.as_integer()?, offset.as_integer()?)),
            _ => None,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u16, &[Operand])> {
        self.entries.iter().map(|(operator, operands)| (*operator, operands.as_slice()))
    }
}

/// Append an integer operand in its shortest encoding.
pub(crate) fn write_integer(out: &mut Vec<u8>, value: i32) {
    match value {
        -107..=107 => out.push((value + 139) as u8),
        108..=1131 => {
            let value = value - 108;
            out.push(((value >> 8) + 247) as u8);
            out.push(value as u8);
        },
        -1131..=-108 => {
            let value = -value - 108;
            out.push(((value >> 8) + 251) as u8);
            out.push(value as u8);
        },
        -32768..=32767 => {
            out.push(28);
            out.extend_from_slice(&(value as i16).to_be_bytes());
        },
        _ => write_fixed_integer(out, value),
    }
}

/// Append an integer in the 5 byte form, whatever its magnitude.
pub(crate) fn write_fixed_integer(out: &mut Vec<u8>, value: i32) {
    out.push(29);
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_operator(out: &mut Vec<u8>, operator: u16) {
    if operator > 0xFF {
        out.push(12);
    }
    out.push(operator as u8);
}

pub(crate) fn write_entry(out: &mut Vec<u8>, operator: u16, operands: &[Operand]) {
    for operand in operands {
        match operand {
            Operand::Integer(value) => write_integer(out, *value),
            Operand::Real(nibbles) => {
                out.push(30);
                out.extend_from_slice(nibbles);
            },
        }
    }
    write_operator(out, operator);
}

/// Append a 5 byte integer to be patched later; returns its position.
pub(crate) fn write_placeholder(out: &mut Vec<u8>) -> usize {
    let position = out.len();
    write_fixed_integer(out, 0);
    position
}

/// Overwrite the placeholder at `position` with `value`.
pub(crate) fn patch_placeholder(buffer: &mut [u8], position: usize, value: i32) {
    BigEndian::write_i32(&mut buffer[position + 1..position + 5], value);
}
