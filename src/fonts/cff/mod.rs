//! Compact Font Format subsetting.
//!
//! The subset writer reads the first font of a CFF (bare, or the `CFF `
//! table of an OpenType font) and rebuilds it around the selected glyphs:
//!
//! ```text
//! Header | Name INDEX | Top DICT INDEX | String INDEX | Global Subr INDEX (empty)
//! Encoding (non CID) | Charset | FDSelect (CID) | CharStrings INDEX
//! Private DICT | FD Private DICTs + FDArray INDEX (CID)
//! ```
//!
//! Offsets in the Top DICT are written as 5 byte placeholders and patched
//! once the positions of the structures they point to are known.

mod charstring;
mod dict;
mod encoding;
mod font;
mod index;
#[cfg(test)]
pub(crate) mod testing;
mod writer;

pub use writer::CffSubsetWriter;

use crate::error::Error;

fn malformed(reason: impl Into<String>) -> Error {
    let reason = reason.into();
    log::error!("Malformed CFF: {}", reason);
    Error::Font(format!("malformed CFF: {}", reason))
}
