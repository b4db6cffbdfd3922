//! Stream decoder implementations for PDF filters.
//!
//! Reading back what this crate writes (and the cross-reference and object
//! streams of files being modified) needs FlateDecode plus predictors.
//! Other filters are reported as unsupported.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser_config::ParserOptions;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams, PngFilter};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Filter names listed in a stream dictionary's `/Filter` entry.
pub fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode parameters for the filter at `index`.
fn decode_params(dict: &Dictionary, index: usize) -> Option<DecodeParams> {
    match dict.get("DecodeParms") {
        Some(Object::Dictionary(params)) if index == 0 => Some(DecodeParams::from_dict(params)),
        Some(Object::Array(items)) => items
            .get(index)
            .and_then(|o| match o {
                Object::Dictionary(params) => Some(DecodeParams::from_dict(params)),
                _ => None,
            }),
        _ => None,
    }
}

/// Decode raw stream bytes according to the stream dictionary.
pub fn decode_stream(dict: &Dictionary, data: &[u8], options: &ParserOptions) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for (index, name) in filter_names(dict).iter().enumerate() {
        let decoder: Box<dyn StreamDecoder> = match name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder {
                max_output: options.max_decompressed_size,
            }),
            other => return Err(Error::Unsupported(format!("filter /{}", other))),
        };
        current = decoder.decode(&current)?;
        log::trace!("{} produced {} bytes", decoder.name(), current.len());

        if let Some(params) = decode_params(dict, index) {
            current = decode_predictor(&current, &params)?;
        }
    }
    Ok(current)
}
