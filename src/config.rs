//! Configuration for document writing.

/// Cross-reference section flavor written at the end of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XrefFormat {
    /// Classic `xref` table with 20-byte entries
    #[default]
    Table,
    /// Cross-reference stream (`/Type /XRef`, PDF 1.5+)
    Stream,
}

/// PDF writing configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// PDF version written in the header, e.g. "1.4".
    pub pdf_version: String,

    /// Flate-compress stream content.
    pub compress_streams: bool,

    /// Cross-reference flavor.
    pub xref_format: XrefFormat,

    /// First value of the subset font prefix sequence.
    pub subset_prefix_seed: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            pdf_version: "1.4".to_string(),
            compress_streams: true,
            xref_format: XrefFormat::Table,
            subset_prefix_seed: "AAAAAA".to_string(),
        }
    }

    /// Set the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compression(mut self, enable: bool) -> Self {
        self.compress_streams = enable;
        self
    }

    /// Choose the cross-reference flavor.
    ///
    /// Xref streams need PDF 1.5; the header version is raised when lower.
    pub fn with_xref_format(mut self, format: XrefFormat) -> Self {
        self.xref_format = format;
        if format == XrefFormat::Stream && self.pdf_version.as_str() < "1.5" {
            self.pdf_version = "1.5".to_string();
        }
        self
    }

    /// Set the first subset prefix.
    pub fn with_subset_prefix_seed(mut self, seed: impl Into<String>) -> Self {
        self.subset_prefix_seed = seed.into();
        self
    }
}
