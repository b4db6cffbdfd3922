//! Predictor decoding for Flate-compressed streams.
//!
//! Cross-reference streams from most producers use PNG predictors (10-15),
//! where every row starts with a tag selecting the filter for that row.

use crate::error::{Error, Result};
use crate::object::Dictionary;

/// PNG row filter selected by the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngFilter {
    /// Row is stored as-is
    None,
    /// Difference from the byte one pixel to the left
    Sub,
    /// Difference from the byte above
    Up,
    /// Difference from the average of left and above
    Average,
    /// Difference from the Paeth predictor
    Paeth,
}

impl PngFilter {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PngFilter::None),
            1 => Ok(PngFilter::Sub),
            2 => Ok(PngFilter::Up),
            3 => Ok(PngFilter::Average),
            4 => Ok(PngFilter::Paeth),
            _ => Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
        }
    }
}

/// Decode parameters for stream decoders (`/DecodeParms`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read the parameters from a `/DecodeParms` dictionary.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &str, default: i64| dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default);
        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1).max(1) as usize,
            colors: int("Colors", 1).max(1) as usize,
            bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
        }
    }

    /// Bytes of sample data in one row.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least 1.
    pub fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Unsupported(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let stride = row_len + 1;

    let mut output = Vec::with_capacity(data.len() / stride * row_len);
    let mut previous = vec![0u8; row_len];
    let mut current = vec![0u8; row_len];

    for encoded in data.chunks(stride) {
        if encoded.len() < stride {
            // Trailing partial row, usually padding after the last record.
            log::debug!("Ignoring {} trailing predictor bytes", encoded.len());
            break;
        }
        let filter = PngFilter::from_tag(encoded[0])?;
        for (i, &byte) in encoded[1..].iter().enumerate() {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match filter {
                PngFilter::None => 0,
                PngFilter::Sub => left,
                PngFilter::Up => up,
                PngFilter::Average => ((left as u16 + up as u16) / 2) as u8,
                PngFilter::Paeth => paeth(left, up, up_left),
            };
            current[i] = byte.wrapping_add(predicted);
        }
        output.extend_from_slice(&current);
        std::mem::swap(&mut previous, &mut current);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_no_predictor() {
        let params = DecodeParams::default();
        assert_eq!(decode_predictor(b"abc", &params).unwrap(), b"abc");
    }

    #[test]
    fn test_png_up_rows() {
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..Default::default()
        };
        // Row 1: none [1,2,3]; row 2: up deltas [1,1,1] -> [2,3,4]
        let data = [0, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(decode_predictor(&data, &params).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_and_paeth() {
        let params = DecodeParams {
            predictor: 15,
            columns: 2,
            ..Default::default()
        };
        let data = [1, 5, 1, 4, 0, 0];
        let decoded = decode_predictor(&data, &params).unwrap();
        assert_eq!(&decoded[..2], &[5, 6]);
        // Paeth with left 0 at i=0 and up 5 picks up.
        assert_eq!(decoded[2], 5);
    }

    #[test]
    fn test_invalid_tag() {
        let params = DecodeParams {
            predictor: 12,
            columns: 1,
            ..Default::default()
        };
        assert!(decode_predictor(&[9, 0], &params).is_err());
    }

    #[test]
    fn test_from_dict() {
        let mut dict = Dictionary::new();
        dict.insert("Predictor".into(), Object::Integer(12));
        dict.insert("Columns".into(), Object::Integer(5));
        let params = DecodeParams::from_dict(&dict);
        assert_eq!(params.predictor, 12);
        assert_eq!(params.row_bytes(), 5);
    }
}
