use super::super::error::Error;

/// PKWARE-implode decompression, used both as the lone codec for a
/// `CompressPK` (whole-file) stream and as one pipeline stage inside a
/// `CompressMulti` block.
///
/// A `CompressPK` payload carries a historical quirk (spec.md §4.1, §9b):
/// if the first three bytes are zero, what follows is a 4-byte little-endian
/// length header, then either the raw bytes verbatim or a nested zlib
/// stream, depending on whether the declared length matches what remains.
pub(crate) fn decompress_whole_file(input: &[u8], expected_len: usize) -> Result<Vec<u8>, Error> {
    let output = if input.len() >= 7 && input[0] == 0 && input[1] == 0 && input[2] == 0 {
        let declared_len =
            u32::from_le_bytes([input[3], input[4], input[5], input[6]]) as usize;
        let payload = &input[7..];

        if declared_len == payload.len() {
            payload.to_vec()
        } else {
            super::zlib::decompress(payload, expected_len)?
        }
    } else {
        decompress_block(input, expected_len)?
    };

    if output.len() != expected_len {
        return Err(Error::corrupt(format!(
            "PKWARE-implode produced {} bytes, expected {}",
            output.len(),
            expected_len
        )));
    }

    Ok(output)
}

/// Plain PKWARE-implode decompression of one block, with no zero-prefix
/// escape (used inside a `CompressMulti` pipeline, where the escape does
/// not apply). The length check against the block's true expected output
/// happens once, centrally, in [`super::decompress`] — a mid-pipeline
/// stage's true output length generally isn't known in advance.
pub(crate) fn decompress_block(input: &[u8], _expected_len: usize) -> Result<Vec<u8>, Error> {
    explode::explode(input).map_err(|e| Error::corrupt(format!("PKWARE-implode failed: {}", e)))
}
