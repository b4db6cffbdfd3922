//! OS/2 `fsType` embedding permissions.

use bitflags::bitflags;

bitflags! {
    /// Embedding licensing rights of a font, from the OS/2 table.
    ///
    /// An empty set means installable embedding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FsType: u16 {
        /// Must not be embedded
        const RESTRICTED_LICENSE = 0x0002;
        /// Embed for preview and print only
        const PREVIEW_AND_PRINT = 0x0004;
        /// Embed for editing
        const EDITABLE = 0x0008;
        /// Must be embedded whole
        const NO_SUBSETTING = 0x0100;
        /// Only bitmaps may be embedded
        const BITMAP_EMBEDDING_ONLY = 0x0200;
    }
}

impl FsType {
    /// Read the raw field; unknown bits are kept.
    pub fn from_raw(value: u16) -> Self {
        Self::from_bits_retain(value)
    }

    /// Whether the font program may be embedded in a document.
    pub fn can_embed(self) -> bool {
        !self.contains(Self::RESTRICTED_LICENSE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installable_embedding() {
        assert!(FsType::from_raw(0).can_embed());
    }

    #[test]
    fn test_restricted_license() {
        assert!(!FsType::from_raw(0x0002).can_embed());
        assert!(!FsType::from_raw(0x0102).can_embed());
    }

    #[test]
    fn test_other_bits_allow_embedding() {
        let fs_type = FsType::from_raw(0x0104);
        assert!(fs_type.can_embed());
        assert!(fs_type.contains(FsType::NO_SUBSETTING));
        assert!(fs_type.contains(FsType::PREVIEW_AND_PRINT));
    }

    #[test]
    fn test_unknown_bits_retained() {
        assert_eq!(FsType::from_raw(0x8000).bits(), 0x8000);
    }
}
