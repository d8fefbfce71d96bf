//! The MoPaQ symmetric block cipher over 32-bit words, plus the two
//! operations the file-stream core needs that the archive-level reader
//! never does: deriving a position-adjusted seed, and brute-forcing an
//! unknown seed from two known ciphertext words and one known plaintext
//! word (the block-offset table's own size).

use byte_slice_cast::*;

use lazy_static::lazy_static;

use super::consts::MPQ_HASH_KEY2_MIX;

lazy_static! {
    static ref CRYPTO_TABLE: [u32; 0x500] = generate_crypto_table();
}

fn generate_crypto_table() -> [u32; 0x500] {
    let mut crypto_table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    for i in 0..0x100 {
        for j in 0..5 {
            let index = i + j * 0x100;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t1 = (seed & 0xFFFF) << 0x10;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t2 = seed & 0xFFFF;

            crypto_table[index] = t1 | t2;
        }
    }

    crypto_table
}

fn decrypt_words(words: &mut [u32], mut key: u32) {
    let mut key2: u32 = 0xEEEE_EEEE;

    for word in words.iter_mut() {
        key2 = key2.wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        *word ^= key.wrapping_add(key2);
        let plain = *word;

        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        key2 = plain
            .wrapping_add(key2)
            .wrapping_add(key2 << 5)
            .wrapping_add(3);
    }
}

fn encrypt_words(words: &mut [u32], mut key: u32) {
    let mut key2: u32 = 0xEEEE_EEEE;

    for word in words.iter_mut() {
        key2 = key2.wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        let plain = *word;
        *word ^= key.wrapping_add(key2);

        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        key2 = plain
            .wrapping_add(key2)
            .wrapping_add(key2 << 5)
            .wrapping_add(3);
    }
}

/// Decrypts a block-offset table in place. Identical to [`decrypt_block`]
/// but over an already-parsed `&mut [u32]`, since the reader needs the
/// words as integers for validation immediately afterward anyway.
pub(crate) fn decrypt_words_for_table(words: &mut [u32], key: u32) {
    decrypt_words(words, key);
}

/// Decrypts `data` in place with `key`. Per spec, any trailing bytes that
/// don't make up a full 32-bit word are left untouched.
pub(crate) fn decrypt_block(data: &mut [u8], key: u32) {
    let word_count = data.len() / 4;
    let words = data[..word_count * 4].as_mut_slice_of::<u32>().unwrap();
    decrypt_words(words, key);
}

/// Encrypts `data` in place with `key`. Inverse of [`decrypt_block`].
pub(crate) fn encrypt_block(data: &mut [u8], key: u32) {
    let word_count = data.len() / 4;
    let words = data[..word_count * 4].as_mut_slice_of::<u32>().unwrap();
    encrypt_words(words, key);
}

/// Derives the position-specific seed used when `BlockOffsetAdjustedKey`
/// is set: moving a file within the archive changes the key that must be
/// used to encrypt/decrypt it.
pub(crate) fn adjust_seed(base_seed: u32, file_position: u32, file_size: u32) -> u32 {
    base_seed.wrapping_add(file_position) ^ file_size
}

/// Attempts to recover the key used to encrypt the block-offset table of a
/// multi-block compressed file, given:
/// - `cipher0`, `cipher1`: the first two encrypted 32-bit words of the
///   offset table.
/// - `plain0`: the table's known first plaintext word, `4 * len(offsets)`.
/// - `max_plain1`: an upper bound on the second plaintext word, i.e.
///   `block_size + plain0`.
///
/// On success, returns the key that decrypts the offset table itself
/// (conventionally `seed - 1`; the caller derives the per-block seed by
/// adding the block index plus one). Brute-forces the low byte of the key,
/// which is the only byte the cipher's internal state depends on before
/// the first word is processed.
pub(crate) fn try_recover_seed(
    cipher0: u32,
    cipher1: u32,
    plain0: u32,
    max_plain1: u32,
) -> Option<u32> {
    let temp = cipher0 ^ plain0;
    let base = temp.wrapping_sub(0xEEEE_EEEE);

    for low_byte in 0u32..0x100 {
        let key2_seed = CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + low_byte) as usize];
        let candidate = base.wrapping_sub(key2_seed);

        if candidate & 0xFF != low_byte {
            continue;
        }

        let mut probe = [cipher0, cipher1];
        decrypt_words(&mut probe, candidate);

        if probe[0] == plain0 && probe[1] > 0 && probe[1] <= max_plain1 {
            return Some(candidate);
        }
    }

    None
}
