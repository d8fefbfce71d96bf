use super::super::error::Error;

/// Adapted from the teacher crate's `decode_mpq_block` zlib branch,
/// generalized to return a `Result` instead of mutating a shared buffer.
pub(crate) fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, Error> {
    let mut decompressed = vec![0u8; expected_len];
    let mut decompressor = flate2::Decompress::new(true);
    let status = decompressor.decompress(input, &mut decompressed, flate2::FlushDecompress::Finish);

    match status {
        Ok(flate2::Status::BufError) | Err(_) => {
            return Err(Error::corrupt("zlib stream did not decompress cleanly"))
        }
        Ok(_) => {}
    }

    decompressed.resize(decompressor.total_out() as usize, 0);
    Ok(decompressed)
}

pub(crate) fn compress(input: &[u8]) -> Vec<u8> {
    let mut compressor = flate2::Compress::new(flate2::Compression::default(), true);
    let mut output = Vec::with_capacity(input.len());
    compressor
        .compress_vec(input, &mut output, flate2::FlushCompress::Finish)
        .expect("in-memory zlib compression cannot fail");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = compress(&original);
        let decompressed = decompress(&compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }
}
