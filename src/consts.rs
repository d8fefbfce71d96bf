//! Bit-level constants for the MoPaQ file format: flag bits, hash "types"
//! fed into the crypto table lookup, and the compression-type bits used in
//! a multi-codec block's leading byte.

// Hash "type" selectors, mixed into the crypto table index. `0x0`/`0x100`
// /`0x200` are used by the archive's hash table (out of scope for this
// crate); `0x300` selects a file encryption key from a filename.
pub(crate) const MPQ_HASH_FILE_KEY: u32 = 0x300;
pub(crate) const MPQ_HASH_KEY2_MIX: u32 = 0x400;

// File flag bits (block table entry flags in the wider MPQ format).
pub(crate) const MPQ_FILE_IMPLODE: u32 = 0x0000_0100;
pub(crate) const MPQ_FILE_COMPRESS: u32 = 0x0000_0200;
pub(crate) const MPQ_FILE_ENCRYPTED: u32 = 0x0001_0000;
pub(crate) const MPQ_FILE_ADJUST_KEY: u32 = 0x0002_0000;
pub(crate) const MPQ_FILE_SINGLE_UNIT: u32 = 0x0100_0000;
pub(crate) const MPQ_FILE_SECTOR_CRC: u32 = 0x0400_0000;
pub(crate) const MPQ_FILE_EXISTS: u32 = 0x8000_0000;

// Compression-type bits, found as the leading byte of each sector in a
// `CompressMulti` file.
pub(crate) const COMPRESSION_HUFFMAN: u8 = 0x01;
pub(crate) const COMPRESSION_ZLIB: u8 = 0x02;
pub(crate) const COMPRESSION_PKLIB: u8 = 0x08;
pub(crate) const COMPRESSION_BZIP2: u8 = 0x10;
pub(crate) const COMPRESSION_SPARSE: u8 = 0x20;
pub(crate) const COMPRESSION_IMA_ADPCM_MONO: u8 = 0x40;
pub(crate) const COMPRESSION_IMA_ADPCM_STEREO: u8 = 0x80;
pub(crate) const COMPRESSION_LZMA: u8 = 0x12;
