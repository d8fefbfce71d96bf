use bitflags::bitflags;

use super::consts::*;

bitflags! {
    /// Per-file flag set, as stored in the archive's block table entry.
    /// `COMPRESSED` is the union of the two ways a file's contents can be
    /// compressed: `COMPRESS_PK` (the whole file, PKWARE-implode only) and
    /// `COMPRESS_MULTI` (per-block, any codec combination).
    pub struct FileFlags: u32 {
        const EXISTS = MPQ_FILE_EXISTS;
        const ENCRYPTED = MPQ_FILE_ENCRYPTED;
        const BLOCK_OFFSET_ADJUSTED_KEY = MPQ_FILE_ADJUST_KEY;
        const SINGLE_UNIT = MPQ_FILE_SINGLE_UNIT;
        const COMPRESS_PK = MPQ_FILE_IMPLODE;
        const COMPRESS_MULTI = MPQ_FILE_COMPRESS;
        const FILE_HAS_METADATA = MPQ_FILE_SECTOR_CRC;
        const COMPRESSED = Self::COMPRESS_PK.bits | Self::COMPRESS_MULTI.bits;
    }
}

impl FileFlags {
    pub fn is_compressed(self) -> bool {
        self.intersects(FileFlags::COMPRESSED)
    }

    pub fn is_encrypted(self) -> bool {
        self.contains(FileFlags::ENCRYPTED)
    }

    pub fn is_single_unit(self) -> bool {
        self.contains(FileFlags::SINGLE_UNIT)
    }

    pub fn is_key_adjusted(self) -> bool {
        self.contains(FileFlags::BLOCK_OFFSET_ADJUSTED_KEY)
    }

    pub fn has_metadata(self) -> bool {
        self.contains(FileFlags::FILE_HAS_METADATA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_is_union_of_pk_and_multi() {
        assert!(FileFlags::COMPRESS_PK.is_compressed());
        assert!(FileFlags::COMPRESS_MULTI.is_compressed());
        assert!(!FileFlags::ENCRYPTED.is_compressed());
    }
}
