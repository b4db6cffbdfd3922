//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! PdfDocumentWriter (header, trailer, incremental update, suspend/resume)
//!     ↓
//! ObjectsContext (indirect objects, dictionaries, streams, xref)
//!     ↓                      ↓
//! PrimitiveWriter        PdfStream (Flate → encryption → sink)
//!     ↓
//! OutputStream (position aware sink)
//! ```
//!
//! `IndirectObjectsReferenceRegistry` records where every object was
//! written; the xref section is produced from it. A session can be saved
//! to a state file ([`StateWriter`]) and picked up again
//! ([`StateReader`]).

mod dictionary_context;
mod document;
mod objects_context;
mod pdf_stream;
pub(crate) mod primitive_writer;
mod registry;
mod state;
mod subset_prefix;

pub use dictionary_context::DictionaryContext;
pub use document::PdfDocumentWriter;
pub use objects_context::ObjectsContext;
pub use pdf_stream::{PdfStream, StreamState, StreamWriter};
pub use primitive_writer::{PrimitiveWriter, TokenSeparator};
pub use registry::{
    IndirectObjectsReferenceRegistry, ObjectWriteInformation, ReferenceType, MAX_GENERATION, MAX_WRITE_POSITION,
};
pub use state::{StateOutput, StateReader, StateWriter, STATE_FILE_HEADER};
pub use subset_prefix::UppercaseSequence;
