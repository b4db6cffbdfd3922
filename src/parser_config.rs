/// Parser options for reading documents and state files.
///
/// # Example
///
/// ```
/// use charta::parser_config::ParserOptions;
///
/// let strict = ParserOptions::strict();
/// assert!(strict.strict);
///
/// let custom = ParserOptions {
///     strict: false,
///     max_nesting: 32,
///     max_decompressed_size: 16 * 1024 * 1024,
/// };
/// assert_eq!(custom.max_nesting, 32);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Report recoverable irregularities (such as duplicate dictionary keys)
    /// at warning level instead of debug level.
    ///
    /// Both modes keep the first occurrence of a duplicated key.
    pub strict: bool,

    /// Maximum array/dictionary nesting depth
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_nesting: usize,

    /// Maximum decoded stream size in bytes (0 disables the check)
    pub max_decompressed_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: irregularities are logged as warnings.
    pub fn strict() -> Self {
        Self {
            strict: true,
            max_nesting: 100,
            max_decompressed_size: 100 * 1024 * 1024,
        }
    }

    /// Lenient mode: irregularities are logged at debug level.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: 100,
            max_decompressed_size: 100 * 1024 * 1024,
        }
    }
}
