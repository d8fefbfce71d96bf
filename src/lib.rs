//! A random-access reader and re-encoder for a single file contained
//! within a MoPaQ (MPQ) archive.
//!
//! This crate does not open archives, parse hash/block tables, or
//! resolve filenames — it consumes a [`FileEntry`] (wherever that comes
//! from) and a shared byte stream positioned over the whole archive, and
//! turns that into a lazily-materialized, seekable view of one file's
//! logical bytes, plus a [`MpqFileStream::transform`] operation for
//! re-emitting that file under a different compression/encryption/
//! blocking policy.

mod block_index;
mod codec;
mod consts;
mod crypto;
mod entry;
mod error;
mod flags;
mod reader;
mod reencode;

pub use codec::Codec;
pub use entry::FileEntry;
pub use error::Error;
pub use flags::FileFlags;
pub use reader::MpqFileStream;

/// The byte-stream shape this crate needs from whatever opened the
/// archive: seekable and readable, nothing else. Blanket-implemented so
/// any `Read + Seek` type (a `File`, a `Cursor<Vec<u8>>`, ...) already
/// satisfies it — it exists purely for bound clarity at this crate's
/// public API boundaries, not as a seam meant to be implemented directly.
pub trait BlockSource: std::io::Read + std::io::Seek {}
impl<T: std::io::Read + std::io::Seek> BlockSource for T {}
