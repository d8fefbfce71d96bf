use super::super::error::Error;

/// Adapted from the teacher crate's `decode_mpq_block` bzip2 branch.
pub(crate) fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, Error> {
    let mut decompressed = vec![0u8; expected_len];
    let mut decompressor = bzip2::Decompress::new(false);
    let status = decompressor.decompress(input, &mut decompressed);

    match status {
        Ok(bzip2::Status::Ok) | Ok(bzip2::Status::StreamEnd) => {}
        _ => return Err(Error::corrupt("bzip2 stream did not decompress cleanly")),
    }

    decompressed.resize(decompressor.total_out() as usize, 0);
    Ok(decompressed)
}

pub(crate) fn compress(input: &[u8]) -> Vec<u8> {
    let mut compressor = bzip2::Compress::new(bzip2::Compression::Default, 30);
    let mut output = Vec::with_capacity(input.len());
    compressor
        .compress_vec(input, &mut output, bzip2::Action::Finish)
        .expect("in-memory bzip2 compression cannot fail");
    output
}
