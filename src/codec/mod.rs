//! The codec registry (spec.md §4.1): a pure mapping from a multi-codec
//! block's leading compression-type byte to a decompression pipeline, plus
//! the compression half used by the re-encoder.

mod adpcm;
mod bzip2_codec;
mod huffman;
mod pkware;
mod zlib;

use super::consts::*;
use super::error::Error;

/// The compressor a caller selects for re-encoding (spec.md §4.6). Only
/// the two codecs this crate can also *compress* with are offered here —
/// PKWARE-implode, Huffman and ADPCM are decode-only in this crate (see
/// DESIGN.md), matching how `transform` is actually exercised in
/// spec.md's testable properties (always `codec = zlib`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Zlib,
    Bzip2,
}

impl Codec {
    pub(crate) fn flag_byte(self) -> u8 {
        match self {
            Codec::Zlib => COMPRESSION_ZLIB,
            Codec::Bzip2 => COMPRESSION_BZIP2,
        }
    }

    pub(crate) fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            Codec::Zlib => zlib::compress(data),
            Codec::Bzip2 => bzip2_codec::compress(data),
        }
    }
}

/// Decompresses one `CompressMulti` block. `codec_byte` is the block's
/// leading byte; the remainder of `input` is the payload.
pub(crate) fn decompress_multi(input: &[u8], expected_len: usize) -> Result<Vec<u8>, Error> {
    if input.is_empty() {
        return Err(Error::corrupt("multi-codec block has no codec byte"));
    }

    let codec_byte = input[0];
    let payload = &input[1..];

    let output = match codec_byte {
        COMPRESSION_HUFFMAN => huffman::decompress(payload, expected_len)?,
        COMPRESSION_ZLIB => zlib::decompress(payload, expected_len)?,
        COMPRESSION_PKLIB => pkware::decompress_block(payload, expected_len)?,
        COMPRESSION_BZIP2 => bzip2_codec::decompress(payload, expected_len)?,
        COMPRESSION_IMA_ADPCM_MONO => adpcm::decompress_mono(payload, expected_len)?,
        COMPRESSION_IMA_ADPCM_STEREO => adpcm::decompress_stereo(payload, expected_len)?,

        b if b == COMPRESSION_IMA_ADPCM_MONO | COMPRESSION_HUFFMAN => {
            let intermediate = huffman::decompress(payload, expected_len.max(payload.len() * 2))?;
            adpcm::decompress_mono(&intermediate, expected_len)?
        }
        b if b == COMPRESSION_IMA_ADPCM_MONO | COMPRESSION_PKLIB => {
            let intermediate = pkware::decompress_block(payload, expected_len)?;
            adpcm::decompress_mono(&intermediate, expected_len)?
        }
        b if b == COMPRESSION_IMA_ADPCM_STEREO | COMPRESSION_HUFFMAN => {
            let intermediate = huffman::decompress(payload, expected_len.max(payload.len() * 2))?;
            adpcm::decompress_stereo(&intermediate, expected_len)?
        }
        b if b == COMPRESSION_IMA_ADPCM_STEREO | COMPRESSION_PKLIB => {
            let intermediate = pkware::decompress_block(payload, expected_len)?;
            adpcm::decompress_stereo(&intermediate, expected_len)?
        }

        COMPRESSION_LZMA | COMPRESSION_SPARSE => {
            return Err(Error::UnsupportedCodec {
                kind: format!("0x{:02X}", codec_byte),
            })
        }
        b if b == COMPRESSION_SPARSE | COMPRESSION_ZLIB
            || b == COMPRESSION_SPARSE | COMPRESSION_BZIP2 =>
        {
            return Err(Error::UnsupportedCodec {
                kind: format!("0x{:02X}", codec_byte),
            })
        }

        other => {
            return Err(Error::UnsupportedCodec {
                kind: format!("0x{:02X}", other),
            })
        }
    };

    if output.len() != expected_len {
        return Err(Error::corrupt(format!(
            "codec 0x{:02X} produced {} bytes, expected {}",
            codec_byte,
            output.len(),
            expected_len
        )));
    }

    Ok(output)
}

/// Whether a codec byte is one this registry can dispatch (used at
/// open-time validation, per spec.md §4.3, to mark a stream unreadable
/// without attempting the decompression).
pub(crate) fn is_known_codec_byte(byte: u8) -> bool {
    matches!(
        byte,
        COMPRESSION_HUFFMAN
            | COMPRESSION_ZLIB
            | COMPRESSION_PKLIB
            | COMPRESSION_BZIP2
            | COMPRESSION_IMA_ADPCM_MONO
            | COMPRESSION_IMA_ADPCM_STEREO
    ) || byte == COMPRESSION_IMA_ADPCM_MONO | COMPRESSION_HUFFMAN
        || byte == COMPRESSION_IMA_ADPCM_MONO | COMPRESSION_PKLIB
        || byte == COMPRESSION_IMA_ADPCM_STEREO | COMPRESSION_HUFFMAN
        || byte == COMPRESSION_IMA_ADPCM_STEREO | COMPRESSION_PKLIB
}

/// The whole-file PKWARE-implode path (spec.md §4.1's "separate PK-specific
/// path"), used when `CompressPK` selects implode for the entire file
/// rather than per-block multi-codec dispatch.
pub(crate) fn decompress_pk_whole_file(
    input: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, Error> {
    pkware::decompress_whole_file(input, expected_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_zlib() {
        let original = b"hello hello hello hello hello".to_vec();
        let compressed = zlib::compress(&original);
        let mut block = vec![COMPRESSION_ZLIB];
        block.extend_from_slice(&compressed);

        let result = decompress_multi(&block, original.len()).unwrap();
        assert_eq!(result, original);
    }

    #[test]
    fn rejects_lzma() {
        let block = vec![COMPRESSION_LZMA, 0, 0, 0];
        assert!(matches!(
            decompress_multi(&block, 10),
            Err(Error::UnsupportedCodec { .. })
        ));
    }

    #[test]
    fn rejects_unknown_combination() {
        let block = vec![0xFF];
        assert!(decompress_multi(&block, 10).is_err());
    }

    #[test]
    fn is_known_codec_byte_matches_dispatch_table() {
        assert!(is_known_codec_byte(COMPRESSION_ZLIB));
        assert!(is_known_codec_byte(
            COMPRESSION_IMA_ADPCM_STEREO | COMPRESSION_PKLIB
        ));
        assert!(!is_known_codec_byte(COMPRESSION_LZMA));
        assert!(!is_known_codec_byte(0xFF));
    }
}
