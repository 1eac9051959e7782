//! Streaming DEFLATE with optional zlib framing.

mod bits;
mod deflate;
mod huffman;
mod inflate;
mod lz77;

pub use deflate::Deflator;
pub use inflate::Inflator;

use crate::error::DecompressionError;

/// Container around the DEFLATE blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Two-byte header and Adler-32 trailer, as standard PNGs use.
    #[default]
    Zlib,
    /// Bare DEFLATE blocks, as in Apple's CgBI variant.
    Raw,
}

pub(crate) const WINDOW_SIZE: usize = 1 << 15;
pub(crate) const MIN_MATCH: usize = 3;
pub(crate) const MAX_MATCH: usize = 258;
pub(crate) const END_OF_BLOCK: u16 = 256;

pub(crate) const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
pub(crate) const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
pub(crate) const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
pub(crate) const DISTANCE_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];
/// Order code length code lengths are transmitted in.
pub(crate) const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Literal/length code lengths of the fixed Huffman code.
pub(crate) fn fixed_literal_lengths() -> [u8; 288] {
    let mut lengths = [8u8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

pub(crate) fn fixed_distance_lengths() -> [u8; 30] {
    [5; 30]
}

/// Running Adler-32 of everything passed to `update`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self { a: 1, b: 0 }
    }
}

impl Adler32 {
    const MODULUS: u32 = 65521;
    /// Largest run of bytes before `b` could overflow a `u32`.
    const RUN: usize = 5552;

    pub(crate) fn update(&mut self, data: &[u8]) {
        for run in data.chunks(Self::RUN) {
            for &byte in run {
                self.a += byte as u32;
                self.b += self.a;
            }
            self.a %= Self::MODULUS;
            self.b %= Self::MODULUS;
        }
    }

    pub(crate) fn finish(&self) -> u32 {
        self.b << 16 | self.a
    }
}

/// Inflates a complete zlib stream held in memory, expanding to at most
/// `limit` bytes.
pub(crate) fn inflate_limited(data: &[u8], limit: usize) -> Result<Vec<u8>, DecompressionError> {
    let mut inflator = Inflator::new(Framing::Zlib).with_output_limit(limit);
    let mut out = Vec::new();
    inflator.push(data, &mut out)?;
    inflator.finish()?;
    Ok(out)
}

#[cfg(test)]
pub(crate) fn inflate_all(data: &[u8]) -> Result<Vec<u8>, DecompressionError> {
    inflate_limited(data, usize::MAX)
}
