// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]
#![allow(clippy::len_without_is_empty)]

//! # Charta
//!
//! PDF construction and incremental modification engine.
//!
//! ## Core Features
//!
//! ### Writing
//! - **Indirect objects**: allocation, placement and deletion through a
//!   cross-reference registry, written out as a classic `xref` table or an
//!   xref stream
//! - **Streams**: Flate compression and per-object encryption, with
//!   `/Length` either direct or as a trailing indirect object
//! - **Sessions**: the complete writer state can be saved to a state file and
//!   resumed later
//!
//! ### Modification
//! - **Incremental updates**: objects of an existing document can be
//!   replaced or deleted by appending a new revision
//! - **Object parsing**: a tokenizer and object parser for the PDF syntax,
//!   including object streams and xref streams
//!
//! ### Fonts
//! - **TrueType subsets**: glyph closure over composite glyphs, rebuilt table
//!   directory with valid checksums
//! - **CFF subsets**: charstrings with inlined subroutines, `seac` accents,
//!   CID keyed fonts with FDSelect/FDArray
//! - **FSType**: fonts whose license forbids embedding are skipped
//!
//! ## Architecture
//!
//! ```text
//! PdfDocumentWriter ─── PdfReader (modified documents)
//!        │
//! ObjectsContext ─── IndirectObjectsReferenceRegistry
//!        │
//! PrimitiveWriter / PdfStream ─── EncryptionHelper
//!        │
//! OutputStream
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use charta::object::ObjectRef;
//! use charta::writer::{PdfDocumentWriter, TokenSeparator};
//! use charta::WriterConfig;
//!
//! # fn main() -> charta::Result<()> {
//! let mut writer = PdfDocumentWriter::start(Vec::new(), WriterConfig::default())?;
//! let ctx = writer.objects_context();
//! let catalog = ctx.start_new_indirect_object()?;
//! let dict = ctx.start_dictionary()?;
//! ctx.write_key(&dict, "Type")?;
//! ctx.write_name("Catalog", TokenSeparator::EndLine)?;
//! ctx.end_dictionary(dict)?;
//! ctx.end_indirect_object()?;
//!
//! let pdf = writer.end(Some(ObjectRef::new(catalog, 0)), None)?;
//! assert!(pdf.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Core PDF parsing
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod reader;
pub mod xref;

// Stream decoders
pub mod decoders;

// Encryption support
pub mod encryption;

// Output sinks and stream plumbing
pub mod io;

// Font subsetting and embedding
pub mod fonts;

// PDF writing
pub mod writer;

// Configuration
pub mod config;

// Re-exports
pub use config::{WriterConfig, XrefFormat};
pub use error::{Error, Result};
pub use object::{Dictionary, Object, ObjectId, ObjectRef};
pub use parser_config::ParserOptions;
pub use reader::PdfReader;
pub use writer::{ObjectsContext, PdfDocumentWriter};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
