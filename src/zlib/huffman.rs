use std::{cmp::Reverse, collections::BinaryHeap};

use super::bits::{reverse_bits, BitCursor};
use crate::error::DecompressionError;

pub(crate) const MAX_CODE_LENGTH: usize = 15;

/// Codes at most this long resolve with a single table lookup.
const FAST_BITS: u32 = 9;

/// A canonical Huffman code prepared for decoding.
///
/// `counts` and `symbols` describe the code the way RFC 1951 defines it and
/// back the bit-at-a-time slow path; `fast` maps the next `FAST_BITS` input
/// bits straight to `(symbol << 4) | length` for the short codes.
#[derive(Debug, Clone)]
pub(crate) struct Huffman {
    counts: [u16; MAX_CODE_LENGTH + 1],
    symbols: Vec<u16>,
    fast: Vec<u32>,
    /// Unused code space left by the lengths; zero for a complete code.
    left: i32,
}

impl Huffman {
    /// Builds a decoder from per-symbol code lengths, zero meaning unused.
    /// Over-subscribed length sets are rejected; incomplete ones are kept so
    /// the caller can decide whether it tolerates them.
    pub(crate) fn new(lengths: &[u8]) -> Result<Self, DecompressionError> {
        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        for &length in lengths {
            counts[length as usize] += 1;
        }

        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(DecompressionError::InvalidCodeLengths("over-subscribed code"));
            }
        }

        let mut offsets = [0u16; MAX_CODE_LENGTH + 2];
        for length in 1..=MAX_CODE_LENGTH {
            offsets[length + 1] = offsets[length] + counts[length];
        }
        let mut symbols = vec![0u16; offsets[MAX_CODE_LENGTH + 1] as usize];
        for (symbol, &length) in lengths.iter().enumerate() {
            if length != 0 {
                symbols[offsets[length as usize] as usize] = symbol as u16;
                offsets[length as usize] += 1;
            }
        }

        let mut fast = vec![0u32; 1 << FAST_BITS];
        for (symbol, (&length, &code)) in lengths.iter().zip(&canonical_codes(lengths)).enumerate()
        {
            if length == 0 || length as u32 > FAST_BITS {
                continue;
            }
            let entry = (symbol as u32) << 4 | length as u32;
            let mut index = code as usize;
            while index < fast.len() {
                fast[index] = entry;
                index += 1 << length;
            }
        }

        Ok(Self {
            counts,
            symbols,
            fast,
            left,
        })
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.left == 0
    }

    /// An incomplete code is only acceptable when it has at most one symbol,
    /// coded with a single bit.
    pub(crate) fn is_complete_or_trivial(&self) -> bool {
        self.is_complete() || self.counts[2..].iter().all(|&count| count == 0)
    }

    /// Decodes one symbol. `Ok(None)` means the input ran out; the cursor may
    /// have moved and must be restored by the caller.
    pub(crate) fn decode(
        &self,
        cursor: &mut BitCursor,
        input: &[u8],
    ) -> Result<Option<u16>, DecompressionError> {
        let (bits, available) = cursor.peek(input, FAST_BITS);
        let entry = self.fast[bits as usize];
        let length = entry & 0xf;
        if length != 0 && length <= available {
            cursor.consume(length);
            return Ok(Some((entry >> 4) as u16));
        }

        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for &count in &self.counts[1..] {
            let Some(bit) = cursor.bits(input, 1) else {
                return Ok(None);
            };
            code |= bit as i32;
            let count = count as i32;
            if code - count < first {
                return Ok(Some(self.symbols[(index + code - first) as usize]));
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err(DecompressionError::InvalidCodeLengths("code isn't in the table"))
    }
}

/// Canonical codes for the given lengths, bit-reversed so they can be
/// written to, or matched against, an LSB-first stream directly.
pub(crate) fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut counts = [0u16; MAX_CODE_LENGTH + 1];
    for &length in lengths {
        counts[length as usize] += 1;
    }
    counts[0] = 0;
    let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + counts[bits - 1]) << 1;
        next_code[bits] = code;
    }
    lengths
        .iter()
        .map(|&length| {
            if length == 0 {
                return 0;
            }
            let code = next_code[length as usize];
            next_code[length as usize] += 1;
            reverse_bits(code, length)
        })
        .collect()
}

/// Optimal code lengths for `frequencies`, none longer than `max_length`.
///
/// When the unrestricted tree is too deep the frequencies are halved and
/// the tree rebuilt, which flattens it until it fits. At least two symbols
/// always get a code so that no code is a lone single bit.
pub(crate) fn code_lengths(frequencies: &[u32], max_length: u8) -> Vec<u8> {
    let mut frequencies = frequencies.to_vec();
    let used = frequencies.iter().filter(|&&f| f > 0).count();
    if used < 2 {
        frequencies
            .iter_mut()
            .filter(|f| **f == 0)
            .take(2 - used)
            .for_each(|f| *f = 1);
    }
    loop {
        let lengths = tree_depths(&frequencies);
        if lengths.iter().all(|&length| length <= max_length) {
            return lengths;
        }
        for frequency in frequencies.iter_mut().filter(|f| **f > 0) {
            *frequency = (*frequency >> 1).max(1);
        }
    }
}

fn tree_depths(frequencies: &[u32]) -> Vec<u8> {
    const ROOT: usize = usize::MAX;

    let mut parents = Vec::new();
    let mut leaves = vec![None; frequencies.len()];
    let mut heap = BinaryHeap::new();
    for (symbol, &frequency) in frequencies.iter().enumerate() {
        if frequency > 0 {
            leaves[symbol] = Some(parents.len());
            heap.push(Reverse((frequency as u64, parents.len())));
            parents.push(ROOT);
        }
    }
    while let (Some(Reverse((a, left))), Some(Reverse((b, right)))) = (heap.pop(), heap.pop()) {
        let node = parents.len();
        parents.push(ROOT);
        parents[left] = node;
        parents[right] = node;
        heap.push(Reverse((a + b, node)));
    }

    // Parents always have larger indices than their children.
    let mut depths = vec![0usize; parents.len()];
    for node in (0..parents.len()).rev() {
        if parents[node] != ROOT {
            depths[node] = depths[parents[node]] + 1;
        }
    }
    leaves
        .iter()
        .map(|leaf| leaf.map_or(0, |node| depths[node].min(u8::MAX as usize) as u8))
        .collect()
}
