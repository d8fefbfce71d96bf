use super::flags::FileFlags;

/// Immutable metadata describing where a single file lives inside an MPQ
/// archive and how it is stored. This is the input the archive-level
/// directory (hash table / block table), out of scope for this crate,
/// is expected to hand over once it has resolved a filename to a block
/// table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    /// Byte offset of the file payload inside the archive stream.
    pub file_position: u64,
    /// Decoded/logical size in bytes.
    pub file_size: u64,
    /// Stored size in bytes (may equal `file_size`).
    pub compressed_size: u64,
    pub flags: FileFlags,
    /// 32-bit key fed to the crypto primitive. `0` means "unknown" and
    /// triggers recovery at open time for multi-block compressed files.
    pub encryption_seed: u32,
    /// The seed before `adjust_seed` is applied; required to re-emit the
    /// file under a different archive position.
    pub base_encryption_seed: u32,
}

impl FileEntry {
    /// A file this short is exempt from the "encryption key is required"
    /// rule: there isn't a full word of ciphertext to even decrypt.
    pub(crate) fn is_too_short_to_need_a_key(&self) -> bool {
        self.file_size < 4
    }

    pub(crate) fn needs_encryption_key(&self) -> bool {
        self.flags.is_encrypted() && !self.is_too_short_to_need_a_key()
    }

    pub(crate) fn has_known_seed(&self) -> bool {
        self.encryption_seed != 0
    }
}
