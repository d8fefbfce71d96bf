use super::error::Error;

/// The decoded, already-validated block-offset table of a multi-block
/// compressed file: `N+1` offsets (or `N+2` when `FileHasMetadata` is set),
/// measured from the file's payload start.
///
/// A `BlockIndex` value is always internally consistent once constructed —
/// `new` is the only entry point and it enforces every invariant spec.md
/// §3 lists, so nothing downstream needs to re-check them.
#[derive(Debug, Clone)]
pub(crate) struct BlockIndex {
    offsets: Vec<u32>,
    /// Present only when `FileHasMetadata` was set; retained verbatim but
    /// never interpreted (its sector-checksum contents aren't validated,
    /// per spec).
    metadata_slot: Option<u32>,
}

impl BlockIndex {
    /// `offsets` is the raw, already-decrypted table as read from the
    /// archive, with the trailing metadata slot (if any) still included.
    pub(crate) fn new(
        mut offsets: Vec<u32>,
        block_size: u32,
        has_metadata: bool,
    ) -> Result<BlockIndex, Error> {
        let metadata_slot = if has_metadata {
            offsets.pop()
        } else {
            None
        };

        if offsets.is_empty() {
            return Err(Error::corrupt("block-offset table has no entries"));
        }

        let expected_first = 4 * (offsets.len() as u32 + u32::from(has_metadata));
        if offsets[0] != expected_first {
            return Err(Error::corrupt(format!(
                "block-offset table self-size mismatch: expected {}, got {}",
                expected_first, offsets[0]
            )));
        }

        for pair in offsets.windows(2) {
            let delta = pair[1].checked_sub(pair[0]);
            match delta {
                Some(delta) if delta > 0 && delta <= block_size => {}
                _ => {
                    return Err(Error::corrupt(format!(
                        "block-offset table delta {:?} -> {:?} out of range (0, {}]",
                        pair[0], pair[1], block_size
                    )))
                }
            }
        }

        Ok(BlockIndex {
            offsets,
            metadata_slot,
        })
    }

    /// Offset and length of block `i`'s stored (encrypted/compressed)
    /// bytes, relative to the file's payload start.
    pub(crate) fn range(&self, i: usize) -> Option<(u32, u32)> {
        let start = *self.offsets.get(i)?;
        let end = *self.offsets.get(i + 1)?;
        Some((start, end - start))
    }

    /// Number of logical blocks (one less than the offset count).
    pub(crate) fn block_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn metadata_slot(&self) -> Option<u32> {
        self.metadata_slot
    }
}
