//! Error types for the PDF library.
//!
//! This module defines all error types that can occur while writing, reading
//! and subsetting.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF construction and parsing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Object id was never handed out by the registry
    #[error("Object {0} was not allocated")]
    ObjectNotAllocated(u64),

    /// Object already has a recorded write position
    #[error("Object {id} was already written at position {position}")]
    ObjectAlreadyWritten {
        /// Object id
        id: u64,
        /// Position recorded by the earlier write
        position: u64,
    },

    /// Write position does not fit an xref entry
    #[error("Write position {0} exceeds the 10 digit xref limit")]
    PositionOutOfRange(u64),

    /// Object generation cannot grow any further
    #[error("Object {0} has reached the maximum generation number")]
    GenerationExhausted(u64),

    /// Object is marked in use but nothing was ever written for it
    #[error("Object {0} is marked as used but was never written")]
    ObjectNotWritten(u64),

    /// Dictionary closed out of order
    #[error("Dictionary nesting violation: closing a dictionary that is not the innermost one")]
    NestingViolation,

    /// Dictionary closed with no open dictionary
    #[error("Dictionary stack underflow")]
    DictionaryStackUnderflow,

    /// Key written twice into the same dictionary
    #[error("Duplicate dictionary key: /{0}")]
    DuplicateKey(String),

    /// Stream used outside the state that allows the call
    #[error("Invalid stream state: expected {expected}, found {found}")]
    InvalidStreamState {
        /// State required by the call
        expected: &'static str,
        /// Current state
        found: &'static str,
    },

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: u64,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference section
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u64, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(usize),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Encryption or decryption failure
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Malformed font program
    #[error("Font error: {0}")]
    Font(String),

    /// Font program is not of the kind the writer handles
    #[error("Wrong font kind: expected {expected}, found {found}")]
    WrongFontKind {
        /// Kind the writer handles
        expected: &'static str,
        /// Kind of the supplied program
        found: &'static str,
    },

    /// Required sfnt table is missing
    #[error("Required font table is missing: {0}")]
    MissingTable(String),

    /// Glyph index beyond the font's glyph count
    #[error("Glyph {glyph} is out of range (font has {count} glyphs)")]
    GlyphOutOfRange {
        /// Requested glyph id
        glyph: u32,
        /// Number of glyphs in the font
        count: u32,
    },

    /// Session state file is missing a required entry
    #[error("Invalid state file: {0}")]
    InvalidState(String),
}
