//! `MpqFileStream`: the validate-then-serve state machine that turns a
//! [`FileEntry`] plus a shared archive stream into a lazy, seekable byte
//! stream.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use byteorder::{ReadBytesExt, LE};
use log::{debug, trace};

use super::block_index::BlockIndex;
use super::codec;
use super::crypto;
use super::entry::FileEntry;
use super::error::Error;
use super::flags::FileFlags;

/// Whether a stream owns its underlying archive handle (and so is the
/// last to let go of it) or merely borrows one shared among several
/// files. Recorded for documentation/assertion purposes only — `R`'s own
/// `Drop` impl already runs correctly either way once the last `Arc`
/// reference is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Owned,
    Borrowed,
}

/// A random-access, read-only view of one file inside an MPQ archive.
pub struct MpqFileStream<R> {
    archive: Arc<Mutex<R>>,
    ownership: Ownership,
    entry: FileEntry,
    block_size: u32,
    block_index: Option<BlockIndex>,
    /// The seed used to key per-block decryption (`base_seed + i`); the
    /// block-offset table itself, when present, was keyed `base_seed - 1`.
    /// May differ from `entry.encryption_seed` when recovered at open time.
    base_seed: u32,
    position: u64,
    cache: Option<(usize, Vec<u8>)>,
    can_read: bool,
    last_validation_error: Option<Error>,
}

impl<R: crate::BlockSource> MpqFileStream<R> {
    /// Builds a stream over an archive stream shared with other files.
    pub fn open(archive: Arc<Mutex<R>>, entry: FileEntry, block_size: u32) -> MpqFileStream<R> {
        Self::new(archive, Ownership::Borrowed, entry, block_size)
    }

    /// Builds a stream that owns its backing reader outright — for a file
    /// extracted to its own standalone encrypted/compressed blob rather
    /// than addressed from within an open archive.
    pub fn from_standalone(reader: R, entry: FileEntry, block_size: u32) -> MpqFileStream<R> {
        Self::new(Arc::new(Mutex::new(reader)), Ownership::Owned, entry, block_size)
    }

    fn new(
        archive: Arc<Mutex<R>>,
        ownership: Ownership,
        entry: FileEntry,
        block_size: u32,
    ) -> MpqFileStream<R> {
        let mut stream = MpqFileStream {
            archive,
            ownership,
            entry,
            block_size,
            block_index: None,
            base_seed: entry.encryption_seed,
            position: 0,
            cache: None,
            can_read: false,
            last_validation_error: None,
        };

        match stream.validate() {
            Ok((block_index, base_seed)) => {
                stream.block_index = block_index;
                stream.base_seed = base_seed;
                stream.can_read = true;
            }
            Err(err) => {
                debug!("file stream failed open-time validation: {}", err);
                stream.last_validation_error = Some(err);
                stream.can_read = false;
            }
        }

        stream
    }

    /// Runs the open-time validation described for single-unit and
    /// multi-block files, returning the decoded block index (if any) and
    /// the resolved base seed on success.
    fn validate(&self) -> Result<(Option<BlockIndex>, u32), Error> {
        if self.entry.flags.is_single_unit() {
            self.validate_single_unit()?;
            return Ok((None, self.entry.encryption_seed));
        }

        if !self.entry.flags.is_compressed() {
            if self.entry.needs_encryption_key() && !self.entry.has_known_seed() {
                return Err(Error::UnknownEncryptionKey);
            }
            return Ok((None, self.entry.encryption_seed));
        }

        let block_count = div_ceil(self.entry.file_size, u64::from(self.block_size)) as usize;
        let offsets_count = block_count + 1 + usize::from(self.entry.flags.has_metadata());

        let raw = self.read_raw(0, offsets_count * 4)?;
        let mut cursor = &raw[..];
        let mut words: Vec<u32> = Vec::with_capacity(offsets_count);
        for _ in 0..offsets_count {
            words.push(cursor.read_u32::<LE>()?);
        }

        let base_seed = if self.entry.flags.is_encrypted() {
            let seed = if self.entry.has_known_seed() {
                self.entry.encryption_seed
            } else {
                let plain0 = 4 * offsets_count as u32;
                let max_plain1 = self.block_size + plain0;
                let recovered =
                    crypto::try_recover_seed(words[0], words[1], plain0, max_plain1)
                        .ok_or(Error::UnknownEncryptionKey)?;
                trace!("recovered encryption seed for multi-block file");
                recovered.wrapping_add(1)
            };

            let table_key = seed.wrapping_sub(1);
            crypto::decrypt_words_for_table(&mut words, table_key);
            seed
        } else {
            self.entry.encryption_seed
        };

        let block_index = BlockIndex::new(words, self.block_size, self.entry.flags.has_metadata())?;
        self.peek_block_codecs(&block_index, base_seed)?;

        Ok((Some(block_index), base_seed))
    }

    fn validate_single_unit(&self) -> Result<(), Error> {
        if self.entry.needs_encryption_key() && !self.entry.has_known_seed() {
            return Err(Error::UnknownEncryptionKey);
        }

        if !self.entry.flags.contains(FileFlags::COMPRESS_MULTI) {
            return Ok(());
        }

        let peek_len = (self.entry.compressed_size as usize).min(4);
        if peek_len == 0 {
            return Ok(());
        }

        let mut peek = self.read_raw(0, peek_len)?;
        if self.entry.flags.is_encrypted() && peek.len() >= 4 {
            crypto::decrypt_block(&mut peek, self.entry.encryption_seed);
        }

        if !codec::is_known_codec_byte(peek[0]) {
            return Err(Error::UnsupportedCodec {
                kind: format!("0x{:02X}", peek[0]),
            });
        }

        Ok(())
    }

    /// Peeks each block's leading codec byte so that an unknown
    /// combination is caught at open time rather than on first read.
    fn peek_block_codecs(&self, block_index: &BlockIndex, base_seed: u32) -> Result<(), Error> {
        if !self.entry.flags.contains(FileFlags::COMPRESS_MULTI) {
            return Ok(());
        }

        for i in 0..block_index.block_count() {
            let (offset, len) = block_index
                .range(i)
                .expect("block_count bounds every valid range");
            let expected_len = self.expected_block_len(i, block_index.block_count());

            if (len as u64) == expected_len {
                continue;
            }

            let mut peek = self.read_raw(u64::from(offset), 1)?;
            if self.entry.flags.is_encrypted() {
                let seed = base_seed.wrapping_add(i as u32);
                let mut word = self.read_raw(u64::from(offset), 4.min(len as usize))?;
                if word.len() == 4 {
                    crypto::decrypt_block(&mut word, seed);
                    peek[0] = word[0];
                }
            }

            if !codec::is_known_codec_byte(peek[0]) {
                return Err(Error::UnsupportedCodec {
                    kind: format!("0x{:02X}", peek[0]),
                });
            }
        }

        Ok(())
    }

    fn expected_block_len(&self, index: usize, block_count: usize) -> u64 {
        if index + 1 == block_count {
            let full = index as u64 * u64::from(self.block_size);
            self.entry.file_size.saturating_sub(full)
        } else {
            u64::from(self.block_size)
        }
    }

    fn read_raw(&self, offset: u64, len: usize) -> Result<Vec<u8>, Error> {
        let mut guard = self.archive.lock().expect("archive stream mutex poisoned");
        guard.seek(SeekFrom::Start(self.entry.file_position + offset))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = guard.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::InsufficientData {
                    got: filled,
                    wanted: len,
                });
            }
            filled += n;
        }

        Ok(buf)
    }

    /// Declared logical length of the file, independent of `can_read`.
    pub fn length(&self) -> u64 {
        self.entry.file_size
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn can_read(&self) -> bool {
        self.can_read
    }

    pub fn can_seek(&self) -> bool {
        self.can_read
    }

    pub fn last_validation_error(&self) -> Option<&Error> {
        self.last_validation_error.as_ref()
    }

    /// The descriptor this stream was opened with — exposed so the
    /// re-encoder can read `base_encryption_seed`/`flags` without
    /// duplicating them as separate fields.
    pub(crate) fn entry(&self) -> FileEntry {
        self.entry
    }

    fn ensure_readable(&self) -> Result<(), Error> {
        if self.can_read {
            Ok(())
        } else {
            Err(Error::not_supported(
                "stream failed open-time validation and cannot be read",
            ))
        }
    }

    pub fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut buf = [0u8; 1];
        let n = self.read_into(&mut buf)?;
        Ok(if n == 1 { Some(buf[0]) } else { None })
    }

    /// Copies the file's stored (encrypted/compressed) payload verbatim,
    /// with no decryption or decompression — for archive repackers that
    /// want to pass a file through untouched.
    pub fn copy_raw_to<W: Write>(&self, sink: &mut W) -> Result<u64, Error> {
        self.ensure_readable()?;

        let mut guard = self.archive.lock().expect("archive stream mutex poisoned");
        guard.seek(SeekFrom::Start(self.entry.file_position))?;

        let mut remaining = self.entry.compressed_size;
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let chunk = (buf.len() as u64).min(remaining) as usize;
            guard.read_exact(&mut buf[..chunk])?;
            sink.write_all(&buf[..chunk])?;
            remaining -= chunk as u64;
        }

        Ok(self.entry.compressed_size)
    }

    fn load_single_unit(&mut self) -> Result<&[u8], Error> {
        if let Some((0, _)) = self.cache {
            return Ok(&self.cache.as_ref().unwrap().1);
        }

        let mut raw = self.read_raw(0, self.entry.compressed_size as usize)?;

        if self.entry.flags.is_encrypted() {
            crypto::decrypt_block(&mut raw, self.entry.encryption_seed);
        }

        let materialized = if self.entry.flags.contains(FileFlags::COMPRESS_MULTI) {
            codec::decompress_multi(&raw, self.entry.file_size as usize)?
        } else if self.entry.flags.contains(FileFlags::COMPRESS_PK) {
            codec::decompress_pk_whole_file(&raw, self.entry.file_size as usize)?
        } else {
            raw
        };

        self.cache = Some((0, materialized));
        trace!("loaded single-unit payload");
        Ok(&self.cache.as_ref().unwrap().1)
    }

    fn load_block(&mut self, i: usize) -> Result<&[u8], Error> {
        if let Some((cached, _)) = self.cache {
            if cached == i {
                return Ok(&self.cache.as_ref().unwrap().1);
            }
        }

        let block_count = self
            .block_index
            .as_ref()
            .map(|idx| idx.block_count())
            .unwrap_or_else(|| div_ceil(self.entry.file_size, u64::from(self.block_size)) as usize);
        let expected_len = self.expected_block_len(i, block_count) as usize;

        let (offset, len) = match &self.block_index {
            Some(index) => index
                .range(i)
                .ok_or_else(|| Error::corrupt(format!("block index {} out of range", i)))?,
            None => (i as u32 * self.block_size, expected_len as u32),
        };

        let mut raw = self.read_raw(u64::from(offset), len as usize)?;

        if self.entry.flags.is_encrypted() && raw.len() >= 4 {
            let seed = self.base_seed.wrapping_add(i as u32);
            crypto::decrypt_block(&mut raw, seed);
        }

        let materialized = if self.entry.flags.is_compressed() && raw.len() != expected_len {
            if self.entry.flags.contains(FileFlags::COMPRESS_PK) {
                codec::decompress_pk_whole_file(&raw, expected_len)?
            } else {
                codec::decompress_multi(&raw, expected_len)?
            }
        } else {
            raw
        };

        debug!("loaded block {} ({} bytes)", i, materialized.len());
        self.cache = Some((i, materialized));
        Ok(&self.cache.as_ref().unwrap().1)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.ensure_readable()?;

        if self.position >= self.entry.file_size {
            return Ok(0);
        }

        let mut total = 0;
        while total < buf.len() && self.position < self.entry.file_size {
            let position = self.position;
            let is_single_unit = self.entry.flags.is_single_unit();

            let (block_data, block_start) = if is_single_unit {
                (self.load_single_unit()?, 0u64)
            } else {
                let block_size = u64::from(self.block_size);
                let block_index = position / block_size;
                let block_start = block_index * block_size;
                (self.load_block(block_index as usize)?, block_start)
            };

            let offset_in_block = (position - block_start) as usize;
            if offset_in_block >= block_data.len() {
                break;
            }

            let available = block_data.len() - offset_in_block;
            let want = buf.len() - total;
            let n = available.min(want);

            buf[total..total + n].copy_from_slice(&block_data[offset_in_block..offset_in_block + n]);
            total += n;
            self.position += n as u64;
        }

        Ok(total)
    }
}

impl<R: crate::BlockSource> Read for MpqFileStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io_err)
    }
}

impl<R: crate::BlockSource> Seek for MpqFileStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.can_read {
            return Err(io_err(Error::not_supported(
                "cannot seek an unreadable stream",
            )));
        }

        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(delta) => self.position as i64 + delta,
            SeekFrom::End(delta) => self.entry.file_size as i64 + delta,
        };

        if new_pos < 0 || new_pos as u64 > self.entry.file_size {
            return Err(io_err(Error::not_supported("seek out of range")));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

/// `write`/`set_length` always fail with `NotSupported`, per the
/// read-only contract; `flush` is a no-op.
impl<R: crate::BlockSource> Write for MpqFileStream<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io_err(Error::not_supported(
            "file streams opened from an archive are read-only",
        )))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn io_err(err: Error) -> io::Error {
    match err {
        Error::IoError { cause } => cause,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_archive(payload: &[u8]) -> Arc<Mutex<Cursor<Vec<u8>>>> {
        Arc::new(Mutex::new(Cursor::new(payload.to_vec())))
    }

    fn plain_entry(file_size: u64) -> FileEntry {
        FileEntry {
            file_position: 0,
            file_size,
            compressed_size: file_size,
            flags: FileFlags::EXISTS | FileFlags::SINGLE_UNIT,
            encryption_seed: 0,
            base_encryption_seed: 0,
        }
    }

    #[test]
    fn single_unit_uncompressed_unencrypted_round_trips() {
        let payload = vec![7u8; 100];
        let archive = make_archive(&payload);
        let entry = plain_entry(100);

        let mut stream = MpqFileStream::open(archive, entry, 4096);
        assert!(stream.can_read());
        assert_eq!(stream.length(), 100);

        let mut out = vec![0u8; 200];
        let n = stream.read(&mut out).unwrap();
        assert_eq!(n, 100);
        assert_eq!(&out[..100], payload.as_slice());

        stream.seek(SeekFrom::Start(50)).unwrap();
        let mut tail = vec![0u8; 1000];
        let n = stream.read(&mut tail).unwrap();
        assert_eq!(n, 50);
    }

    #[test]
    fn multi_block_zlib_compressed_loads_one_block_at_a_time() {
        let block_size = 4096u32;
        let file_size = 10000u64;
        let blocks: Vec<Vec<u8>> = (0..3)
            .map(|i| vec![i as u8; block_size as usize])
            .collect();
        let mut blocks = blocks;
        blocks[2].truncate((file_size - 2 * block_size as u64) as usize);

        let compressed: Vec<Vec<u8>> = blocks
            .iter()
            .map(|b| {
                let z = codec::Codec::Zlib.compress(b);
                let mut out = vec![codec::Codec::Zlib.flag_byte()];
                out.extend_from_slice(&z);
                out
            })
            .collect();

        let mut offsets = vec![0u32; compressed.len() + 1];
        offsets[0] = 4 * offsets.len() as u32;
        for (i, c) in compressed.iter().enumerate() {
            offsets[i + 1] = offsets[i] + c.len() as u32;
        }

        let mut payload = Vec::new();
        for o in &offsets {
            payload.extend_from_slice(&o.to_le_bytes());
        }
        for c in &compressed {
            payload.extend_from_slice(c);
        }

        let archive = make_archive(&payload);
        let entry = FileEntry {
            file_position: 0,
            file_size,
            compressed_size: payload.len() as u64,
            flags: FileFlags::EXISTS | FileFlags::COMPRESS_MULTI,
            encryption_seed: 0,
            base_encryption_seed: 0,
        };

        let mut stream = MpqFileStream::open(archive, entry, block_size);
        assert!(stream.can_read());

        let mut out = vec![0u8; file_size as usize];
        let n = stream.read(&mut out).unwrap();
        assert_eq!(n, file_size as usize);
        assert_eq!(&out[..block_size as usize], blocks[0].as_slice());

        stream.seek(SeekFrom::Start(block_size as u64)).unwrap();
        let mut one = [0u8; 1];
        stream.read_exact(&mut one).unwrap();
        assert_eq!(one[0], blocks[1][0]);
    }

    #[test]
    fn unknown_codec_byte_marks_unreadable() {
        let mut payload = vec![0x12u8];
        payload.extend_from_slice(&[0u8; 9]);

        let archive = make_archive(&payload);
        let entry = FileEntry {
            file_position: 0,
            file_size: 10,
            compressed_size: 10,
            flags: FileFlags::EXISTS | FileFlags::SINGLE_UNIT | FileFlags::COMPRESS_MULTI,
            encryption_seed: 0,
            base_encryption_seed: 0,
        };

        let stream = MpqFileStream::open(archive, entry, 4096);
        assert!(!stream.can_read());
    }

    #[test]
    fn short_encrypted_file_with_unknown_seed_is_still_readable() {
        let payload = vec![1u8, 2, 3];
        let archive = make_archive(&payload);
        let entry = FileEntry {
            file_position: 0,
            file_size: 3,
            compressed_size: 3,
            flags: FileFlags::EXISTS | FileFlags::SINGLE_UNIT | FileFlags::ENCRYPTED,
            encryption_seed: 0,
            base_encryption_seed: 0,
        };

        let stream = MpqFileStream::open(archive, entry, 4096);
        assert!(stream.can_read());
    }
}
