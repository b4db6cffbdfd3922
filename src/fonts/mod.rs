//! Embedded font programs.
//!
//! The subset writers rebuild a font program so that it only carries the
//! glyphs a document uses:
//!
//! - [`TrueTypeSubsetWriter`] rewrites the sfnt table directory of a
//!   TrueType font, keeping the original glyph ids (unused glyphs become
//!   empty) so that content streams can keep using them;
//! - [`cff::CffSubsetWriter`] rebuilds a CFF font (bare or inside an
//!   OpenType container) with flattened charstrings. Glyphs are renumbered
//!   0..n in ascending original id order.
//!
//! Both writers force glyph 0, close the selection over glyph dependencies
//! (composite components, `seac` accents) and honor the OS/2 `fsType`
//! embedding permission. A font that must not be embedded produces
//! [`SubsetOutcome::NotEmbedded`], which is not an error.
//!
//! [`embed_true_type_subset`] and [`embed_cff_subset`] write the results as
//! `FontFile2` and `FontFile3` streams.

pub mod cff;
mod embed;
mod fs_type;
mod sfnt;
mod truetype;

pub use embed::{embed_cff_subset, embed_true_type_subset};
pub use fs_type::FsType;
pub use sfnt::{FontKind, SfntFace};
pub use truetype::TrueTypeSubsetWriter;

use crate::error::Result;
use bytes::Bytes;
use std::path::Path;

/// Raw font file contents plus the face to use inside a collection.
#[derive(Debug, Clone)]
pub struct FontProgram {
    data: Bytes,
    face_index: u32,
}

impl FontProgram {
    /// Wrap font file bytes; the first face is used.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            face_index: 0,
        }
    }

    /// Read a font file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        log::debug!("Loaded font program {} ({} bytes)", path.as_ref().display(), data.len());
        Ok(Self::new(data))
    }

    /// Select a face of a font collection.
    pub fn with_face_index(mut self, face_index: u32) -> Self {
        self.face_index = face_index;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    /// A bare CFF font starts with its header (major version 1) instead
    /// of an sfnt version tag.
    pub(crate) fn is_bare_cff(&self) -> bool {
        self.data.len() >= 4 && self.data[0] == 1 && self.data[1] == 0
    }
}

/// Result of a subset request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetOutcome {
    /// The rebuilt font program
    Embedded(Vec<u8>),
    /// The font's license forbids embedding
    NotEmbedded,
}

impl SubsetOutcome {
    pub fn is_embedded(&self) -> bool {
        matches!(self, SubsetOutcome::Embedded(_))
    }

    /// The font program, if one was produced.
    pub fn into_program(self) -> Option<Vec<u8>> {
        match self {
            SubsetOutcome::Embedded(program) => Some(program),
            SubsetOutcome::NotEmbedded => None,
        }
    }
}
