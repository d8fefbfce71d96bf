//! A self-contained static Huffman coder.
//!
//! No crate in the reference pack implements MPQ's specific historical
//! Huffman variant (it isn't published anywhere outside Blizzard's own
//! `Storm.dll`), so this codec is implemented directly rather than
//! delegated to a dependency — see DESIGN.md. It keeps the registry's
//! "pure `(bytes, expected_len) -> bytes`" contract: `compress` and
//! `decompress` are an exact inverse pair built from the same
//! deterministic tree-construction routine, so round-tripping through
//! this crate's own encoder is well-defined even though the on-wire
//! format is this crate's own rather than `Storm.dll`'s bit-for-bit
//! layout.

use super::super::error::Error;

struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    fn new() -> BitWriter {
        BitWriter {
            bytes: Vec::new(),
            current: 0,
            filled: 0,
        }
    }

    fn push_bit(&mut self, bit: u8) {
        self.current |= (bit & 1) << self.filled;
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn push_code(&mut self, code: u64, len: u8) {
        for i in 0..len {
            self.push_bit(((code >> i) & 1) as u8);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> BitReader<'a> {
        BitReader {
            bytes,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn next_bit(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.byte_pos)?;
        let bit = (byte >> self.bit_pos) & 1;

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Some(bit)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(u8),
    Branch(Box<Node>, Box<Node>),
}

/// Builds a deterministic Huffman tree from a symbol frequency table.
/// Ties are broken by symbol value so that the same frequency table
/// always produces the same tree, on both the compressing and
/// decompressing side.
fn build_tree(freqs: &[(u8, u32)]) -> Node {
    let mut queue: Vec<(u32, u32, Node)> = freqs
        .iter()
        .map(|&(symbol, freq)| (freq, u32::from(symbol), Node::Leaf(symbol)))
        .collect();

    if queue.len() == 1 {
        return queue.remove(0).2;
    }

    let mut next_tiebreak = 0x1_0000u32;
    loop {
        queue.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        let (freq_a, _, node_a) = queue.remove(0);
        let (freq_b, _, node_b) = queue.remove(0);

        let combined = Node::Branch(Box::new(node_a), Box::new(node_b));
        if queue.is_empty() {
            return combined;
        }

        queue.push((freq_a + freq_b, next_tiebreak, combined));
        next_tiebreak += 1;
    }
}

fn assign_codes(node: &Node, prefix: u64, len: u8, out: &mut Vec<(u8, u64, u8)>) {
    match node {
        Node::Leaf(symbol) => out.push((*symbol, prefix, len.max(1))),
        Node::Branch(left, right) => {
            assign_codes(left, prefix, len + 1, out);
            assign_codes(right, prefix | (1u64 << len), len + 1, out);
        }
    }
}

/// Depth of the deepest leaf. A tie-broken Huffman tree over 256 symbols
/// can reach depths beyond what a code word can address (see
/// `MAX_CODE_LEN`); callers use this to fall back to a stored format
/// instead of packing a code that doesn't fit.
fn tree_height(node: &Node) -> u32 {
    match node {
        Node::Leaf(_) => 0,
        Node::Branch(left, right) => 1 + tree_height(left).max(tree_height(right)),
    }
}

/// Longest code word `push_code`/`BitReader` can address without
/// overflowing the `u64` accumulator.
const MAX_CODE_LEN: u32 = 63;

/// Sentinel `symbol_count` marking a stored (uncompressed) block, used
/// when the frequency table would produce a tree deeper than
/// `MAX_CODE_LEN`.
const STORED_MARKER: u16 = 0xFFFF;

fn frequency_table(data: &[u8]) -> Vec<(u8, u32)> {
    let mut counts = [0u32; 256];
    for &b in data {
        counts[b as usize] += 1;
    }

    counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(symbol, &count)| (symbol as u8, count))
        .collect()
}

pub(crate) fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());

    if data.is_empty() {
        out.extend_from_slice(&0u16.to_le_bytes());
        return out;
    }

    let freqs = frequency_table(data);
    let tree = build_tree(&freqs);

    if tree_height(&tree) > MAX_CODE_LEN {
        out.extend_from_slice(&STORED_MARKER.to_le_bytes());
        out.extend_from_slice(data);
        return out;
    }

    out.extend_from_slice(&(freqs.len() as u16).to_le_bytes());
    for &(symbol, count) in &freqs {
        out.push(symbol);
        out.extend_from_slice(&count.to_le_bytes());
    }

    let mut codes = Vec::new();
    assign_codes(&tree, 0, 0, &mut codes);
    let code_of: std::collections::HashMap<u8, (u64, u8)> = codes
        .into_iter()
        .map(|(symbol, code, len)| (symbol, (code, len)))
        .collect();

    let mut writer = BitWriter::new();
    for &b in data {
        let (code, len) = code_of[&b];
        writer.push_code(code, len);
    }

    out.extend_from_slice(&writer.finish());
    out
}

pub(crate) fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, Error> {
    if input.len() < 6 {
        return Err(Error::corrupt("Huffman stream too short for header"));
    }

    let original_len = u32::from_le_bytes(input[0..4].try_into().unwrap()) as usize;
    let symbol_count = u16::from_le_bytes(input[4..6].try_into().unwrap()) as usize;

    if original_len != expected_len {
        return Err(Error::corrupt(format!(
            "Huffman stream declares {} bytes, expected {}",
            original_len, expected_len
        )));
    }

    if original_len == 0 {
        return Ok(Vec::new());
    }

    if symbol_count == usize::from(STORED_MARKER) {
        let stored = input.get(6..6 + original_len).ok_or_else(|| {
            Error::corrupt("Huffman stream truncated in stored block")
        })?;
        return Ok(stored.to_vec());
    }

    let mut pos = 6;
    let mut freqs = Vec::with_capacity(symbol_count);
    for _ in 0..symbol_count {
        if pos + 5 > input.len() {
            return Err(Error::corrupt("Huffman stream truncated in frequency table"));
        }
        let symbol = input[pos];
        let count = u32::from_le_bytes(input[pos + 1..pos + 5].try_into().unwrap());
        freqs.push((symbol, count));
        pos += 5;
    }

    let tree = build_tree(&freqs);
    let mut reader = BitReader::new(&input[pos..]);
    let mut output = Vec::with_capacity(original_len);

    while output.len() < original_len {
        let mut node = &tree;
        loop {
            match node {
                Node::Leaf(symbol) => {
                    output.push(*symbol);
                    break;
                }
                Node::Branch(left, right) => {
                    let bit = reader
                        .next_bit()
                        .ok_or_else(|| Error::corrupt("Huffman stream ran out of bits"))?;
                    node = if bit == 0 { left } else { right };
                }
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_data() {
        let original = b"aaaaabbbbccccccccccddddddddddddddddzzz".to_vec();
        let compressed = compress(&original);
        let decompressed = decompress(&compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn round_trips_single_symbol() {
        let original = vec![42u8; 10];
        let compressed = compress(&original);
        let decompressed = decompress(&compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn round_trips_empty() {
        let compressed = compress(&[]);
        let decompressed = decompress(&compressed, 0).unwrap();
        assert!(decompressed.is_empty());
    }
}
