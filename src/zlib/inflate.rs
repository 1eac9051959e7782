use std::mem;

use super::{
    bits::BitCursor, fixed_distance_lengths, fixed_literal_lengths, huffman::Huffman, Adler32,
    Framing, CODE_LENGTH_ORDER, DISTANCE_BASE, DISTANCE_EXTRA, END_OF_BLOCK, LENGTH_BASE,
    LENGTH_EXTRA, WINDOW_SIZE,
};
use crate::error::DecompressionError;

/// Unwraps a read that may run out of input, bailing out with `Ok(None)`.
macro_rules! need {
    ($read:expr) => {
        match $read {
            Some(value) => value,
            None => return Ok(None),
        }
    };
}

#[derive(Debug)]
struct Codes {
    literals: Huffman,
    distances: Huffman,
}

#[derive(Debug)]
enum State {
    StreamHeader,
    BlockHeader,
    Stored { remaining: usize },
    Codes(Box<Codes>),
    Trailer,
    Done,
}

enum Step {
    Next(State),
    /// Input ran out; the cursor sits where this state can resume from.
    Starved(State),
}

enum Symbol {
    Literal(u8),
    EndOfBlock,
    Match { length: usize, distance: usize },
}

/// The last 32 KiB of output, for back-references.
#[derive(Debug)]
struct Window {
    bytes: Vec<u8>,
    position: usize,
    filled: usize,
    /// Every byte ever emitted, not just those still in the window.
    total: usize,
}

impl Window {
    const MASK: usize = WINDOW_SIZE - 1;

    fn new() -> Self {
        Self {
            bytes: vec![0; WINDOW_SIZE],
            position: 0,
            filled: 0,
            total: 0,
        }
    }

    fn push(&mut self, byte: u8, out: &mut Vec<u8>) {
        self.bytes[self.position] = byte;
        self.position = (self.position + 1) & Self::MASK;
        self.filled = (self.filled + 1).min(WINDOW_SIZE);
        self.total += 1;
        out.push(byte);
    }

    fn copy(
        &mut self,
        distance: usize,
        length: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), DecompressionError> {
        if distance > self.filled {
            return Err(DecompressionError::DistanceTooFar {
                distance,
                available: self.filled,
            });
        }
        for _ in 0..length {
            let byte = self.bytes[(self.position + WINDOW_SIZE - distance) & Self::MASK];
            self.push(byte, out);
        }
        Ok(())
    }
}

/// Incremental DEFLATE decoder.
///
/// Compressed bytes may be pushed in slices of any size; a symbol, a block
/// header or a back-reference split across two pushes is picked up where it
/// left off. Everything the stream has produced so far is appended to the
/// caller's buffer on every push.
///
/// An output limit caps the total the stream may expand to; crossing it
/// fails the push before the extra bytes are written.
#[derive(Debug)]
pub struct Inflator {
    framing: Framing,
    limit: usize,
    state: State,
    /// Input received but not yet consumed by a complete read.
    input: Vec<u8>,
    cursor: BitCursor,
    window: Window,
    last_block: bool,
    adler: Adler32,
}

impl Inflator {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            limit: usize::MAX,
            state: match framing {
                Framing::Zlib => State::StreamHeader,
                Framing::Raw => State::BlockHeader,
            },
            input: Vec::new(),
            cursor: BitCursor::default(),
            window: Window::new(),
            last_block: false,
            adler: Adler32::default(),
        }
    }

    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Total bytes the stream has produced so far.
    pub fn total_out(&self) -> usize {
        self.window.total
    }

    fn reserve(&self, count: usize) -> Result<(), DecompressionError> {
        if self.limit - self.window.total < count {
            return Err(DecompressionError::OutputLimit(self.limit));
        }
        Ok(())
    }

    /// Decompresses as much of `data` as possible into `out`.
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), DecompressionError> {
        if self.is_finished() {
            if data.is_empty() {
                return Ok(());
            }
            return Err(DecompressionError::ExtraneousData);
        }
        self.input.extend_from_slice(data);
        let input = mem::take(&mut self.input);
        let mut checked = out.len();
        let result = self.run(&input, out, &mut checked);
        self.adler.update(&out[checked..]);
        self.input = input;
        self.input.drain(..self.cursor.position.min(self.input.len()));
        self.cursor.position = 0;
        result?;

        if self.is_finished() && (self.cursor.buffered_bytes() > 0 || !self.input.is_empty()) {
            return Err(DecompressionError::ExtraneousData);
        }
        Ok(())
    }

    /// Confirms the stream reached its final block and, for zlib framing,
    /// that the checksum matched.
    pub fn finish(&self) -> Result<(), DecompressionError> {
        if self.is_finished() {
            Ok(())
        } else {
            Err(DecompressionError::IncompleteImageDataCompressedDatastream)
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done)
    }

    fn run(
        &mut self,
        input: &[u8],
        out: &mut Vec<u8>,
        checked: &mut usize,
    ) -> Result<(), DecompressionError> {
        loop {
            let state = mem::replace(&mut self.state, State::Done);
            match self.step(state, input, out, checked)? {
                Step::Next(State::Done) => {
                    log::debug!("compressed stream finished");
                    return Ok(());
                }
                Step::Next(state) => self.state = state,
                Step::Starved(state) => {
                    self.state = state;
                    return Ok(());
                }
            }
        }
    }

    fn step(
        &mut self,
        state: State,
        input: &[u8],
        out: &mut Vec<u8>,
        checked: &mut usize,
    ) -> Result<Step, DecompressionError> {
        let checkpoint = self.cursor;
        match state {
            State::StreamHeader => {
                let Some(header) = self.cursor.bits(input, 16) else {
                    self.cursor = checkpoint;
                    return Ok(Step::Starved(state));
                };
                check_stream_header(header as u8, (header >> 8) as u8)?;
                Ok(Step::Next(State::BlockHeader))
            }
            State::BlockHeader => match block_header(&mut self.cursor, input)? {
                Some((last_block, next)) => {
                    self.last_block = last_block;
                    Ok(Step::Next(next))
                }
                None => {
                    self.cursor = checkpoint;
                    Ok(Step::Starved(state))
                }
            },
            State::Stored { mut remaining } => {
                while remaining > 0 {
                    if self.cursor.buffered_bytes() > 0 {
                        if let Some(byte) = self.cursor.bits(input, 8) {
                            self.reserve(1)?;
                            self.window.push(byte as u8, out);
                            remaining -= 1;
                        }
                        continue;
                    }
                    let bytes = self.cursor.take_aligned(input, remaining);
                    if bytes.is_empty() {
                        return Ok(Step::Starved(State::Stored { remaining }));
                    }
                    self.reserve(bytes.len())?;
                    for &byte in bytes {
                        self.window.push(byte, out);
                    }
                    remaining -= bytes.len();
                }
                Ok(Step::Next(self.after_block()))
            }
            State::Codes(codes) => loop {
                let checkpoint = self.cursor;
                match decode_symbol(&codes, &mut self.cursor, input)? {
                    None => {
                        self.cursor = checkpoint;
                        return Ok(Step::Starved(State::Codes(codes)));
                    }
                    Some(Symbol::Literal(byte)) => {
                        self.reserve(1)?;
                        self.window.push(byte, out)
                    }
                    Some(Symbol::Match { length, distance }) => {
                        self.reserve(length)?;
                        self.window.copy(distance, length, out)?
                    }
                    Some(Symbol::EndOfBlock) => return Ok(Step::Next(self.after_block())),
                }
            },
            State::Trailer => {
                self.cursor.align();
                let mut stored = 0u32;
                for _ in 0..4 {
                    let Some(byte) = self.cursor.bits(input, 8) else {
                        self.cursor = checkpoint;
                        return Ok(Step::Starved(state));
                    };
                    stored = stored << 8 | byte;
                }
                self.adler.update(&out[*checked..]);
                *checked = out.len();
                let computed = self.adler.finish();
                if stored != computed {
                    return Err(DecompressionError::ChecksumMismatch { stored, computed });
                }
                Ok(Step::Next(State::Done))
            }
            State::Done => Ok(Step::Next(State::Done)),
        }
    }

    fn after_block(&mut self) -> State {
        if !self.last_block {
            return State::BlockHeader;
        }
        match self.framing {
            Framing::Zlib => State::Trailer,
            Framing::Raw => {
                self.cursor.align();
                State::Done
            }
        }
    }
}

fn check_stream_header(cmf: u8, flg: u8) -> Result<(), DecompressionError> {
    if cmf & 0x0f != 8 {
        return Err(DecompressionError::UnsupportedMethod(cmf & 0x0f));
    }
    if cmf >> 4 > 7 {
        return Err(DecompressionError::InvalidWindowSize(cmf >> 4));
    }
    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
        return Err(DecompressionError::HeaderChecksum);
    }
    if flg & 0x20 != 0 {
        return Err(DecompressionError::PresetDictionary);
    }
    Ok(())
}

/// Reads a block header, including a dynamic block's code tables, as one
/// unit.
fn block_header(
    cursor: &mut BitCursor,
    input: &[u8],
) -> Result<Option<(bool, State)>, DecompressionError> {
    let header = need!(cursor.bits(input, 3));
    let last_block = header & 1 == 1;
    let state = match header >> 1 {
        0 => {
            cursor.align();
            let length = need!(cursor.bits(input, 16));
            let complement = need!(cursor.bits(input, 16));
            if length != !complement & 0xffff {
                return Err(DecompressionError::StoredLengthMismatch);
            }
            log::trace!("stored block, {length} bytes");
            State::Stored {
                remaining: length as usize,
            }
        }
        1 => {
            log::trace!("fixed Huffman block");
            State::Codes(Box::new(Codes {
                literals: Huffman::new(&fixed_literal_lengths())?,
                distances: Huffman::new(&fixed_distance_lengths())?,
            }))
        }
        2 => {
            let codes = need!(dynamic_codes(cursor, input)?);
            log::trace!("dynamic Huffman block");
            State::Codes(Box::new(codes))
        }
        _ => return Err(DecompressionError::ReservedBlockType),
    };
    Ok(Some((last_block, state)))
}

fn dynamic_codes(cursor: &mut BitCursor, input: &[u8]) -> Result<Option<Codes>, DecompressionError> {
    let literal_count = need!(cursor.bits(input, 5)) as usize + 257;
    let distance_count = need!(cursor.bits(input, 5)) as usize + 1;
    let code_length_count = need!(cursor.bits(input, 4)) as usize + 4;
    if literal_count > 286 || distance_count > 30 {
        return Err(DecompressionError::InvalidCodeLengths(
            "too many length or distance codes",
        ));
    }

    let mut code_length_lengths = [0u8; 19];
    for &symbol in &CODE_LENGTH_ORDER[..code_length_count] {
        code_length_lengths[symbol] = need!(cursor.bits(input, 3)) as u8;
    }
    let code_lengths = Huffman::new(&code_length_lengths)?;
    if !code_lengths.is_complete() {
        return Err(DecompressionError::InvalidCodeLengths(
            "incomplete code length code",
        ));
    }

    let total = literal_count + distance_count;
    let mut lengths = Vec::with_capacity(total);
    while lengths.len() < total {
        let symbol = need!(code_lengths.decode(cursor, input)?);
        let (length, repeat) = match symbol {
            0..=15 => (symbol as u8, 1),
            16 => {
                let previous = *lengths.last().ok_or(DecompressionError::InvalidCodeLengths(
                    "repeat with no previous length",
                ))?;
                (previous, 3 + need!(cursor.bits(input, 2)) as usize)
            }
            17 => (0, 3 + need!(cursor.bits(input, 3)) as usize),
            18 => (0, 11 + need!(cursor.bits(input, 7)) as usize),
            _ => return Err(DecompressionError::InvalidSymbol(symbol)),
        };
        if lengths.len() + repeat > total {
            return Err(DecompressionError::InvalidCodeLengths(
                "repeat runs past the last code",
            ));
        }
        lengths.extend(std::iter::repeat(length).take(repeat));
    }

    if lengths[END_OF_BLOCK as usize] == 0 {
        return Err(DecompressionError::InvalidCodeLengths(
            "missing end-of-block code",
        ));
    }
    let literals = Huffman::new(&lengths[..literal_count])?;
    if !literals.is_complete_or_trivial() {
        return Err(DecompressionError::InvalidCodeLengths(
            "incomplete literal/length code",
        ));
    }
    let distances = Huffman::new(&lengths[literal_count..])?;
    if !distances.is_complete_or_trivial() {
        return Err(DecompressionError::InvalidCodeLengths(
            "incomplete distance code",
        ));
    }
    Ok(Some(Codes {
        literals,
        distances,
    }))
}

fn decode_symbol(
    codes: &Codes,
    cursor: &mut BitCursor,
    input: &[u8],
) -> Result<Option<Symbol>, DecompressionError> {
    let symbol = need!(codes.literals.decode(cursor, input)?);
    let symbol = match symbol {
        0..=255 => Symbol::Literal(symbol as u8),
        END_OF_BLOCK => Symbol::EndOfBlock,
        257..=285 => {
            let index = (symbol - 257) as usize;
            let extra = need!(cursor.bits(input, LENGTH_EXTRA[index] as u32));
            let length = LENGTH_BASE[index] as usize + extra as usize;

            let distance_symbol = need!(codes.distances.decode(cursor, input)?);
            let index = distance_symbol as usize;
            if index >= DISTANCE_BASE.len() {
                return Err(DecompressionError::InvalidSymbol(distance_symbol));
            }
            let extra = need!(cursor.bits(input, DISTANCE_EXTRA[index] as u32));
            let distance = DISTANCE_BASE[index] as usize + extra as usize;
            Symbol::Match { length, distance }
        }
        _ => return Err(DecompressionError::InvalidSymbol(symbol)),
    };
    Ok(Some(symbol))
}

#[cfg(test)]
mod tests {
    use super::Inflator;
    use crate::{
        error::DecompressionError,
        zlib::{
            bits::BitWriter, fixed_literal_lengths, huffman::canonical_codes, inflate_all, Framing,
        },
    };

    fn sample_data(len: usize) -> Vec<u8> {
        let mut seed = 0x2545_f491u32;
        (0..len)
            .map(|i| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                if (i / 700) % 2 == 0 {
                    b"scanline "[i % 9]
                } else {
                    (seed >> 24) as u8
                }
            })
            .collect()
    }

    #[test]
    fn inflates_a_stored_block() {
        // One stored block holding a single 0x2a, then its Adler-32.
        let stream = [0x78, 0x01, 0x01, 0x01, 0x00, 0xfe, 0xff, 0x2a, 0x00, 0x2b, 0x00, 0x2b];
        assert_eq!(inflate_all(&stream), Ok(vec![0x2a]));
    }

    #[test]
    fn survives_one_byte_at_a_time() {
        let data = sample_data(100_000);
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&data, 9);
        let mut inflator = Inflator::new(Framing::Zlib);
        let mut out = Vec::new();
        for byte in &compressed {
            inflator.push(std::slice::from_ref(byte), &mut out).unwrap();
        }
        inflator.finish().unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn output_limit_is_exact() {
        let data = sample_data(5_000);
        for level in [0, 6] {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&data, level);
            let mut out = Vec::new();
            let mut inflator = Inflator::new(Framing::Zlib).with_output_limit(data.len());
            inflator.push(&compressed, &mut out).unwrap();
            assert!(inflator.is_finished());

            let mut out = Vec::new();
            let mut inflator = Inflator::new(Framing::Zlib).with_output_limit(data.len() - 1);
            assert_eq!(
                inflator.push(&compressed, &mut out),
                Err(DecompressionError::OutputLimit(data.len() - 1)),
                "level {level}"
            );
            assert!(out.len() < data.len());
        }
    }

    #[test]
    fn inflates_every_level_and_split() {
        let data = sample_data(70_000);
        for level in [0, 1, 6, 10] {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&data, level);
            for split in [1, 2, 7, 100, compressed.len() / 2] {
                let mut inflator = Inflator::new(Framing::Zlib);
                let mut out = Vec::new();
                for piece in compressed.chunks(split) {
                    inflator.push(piece, &mut out).unwrap();
                }
                assert!(inflator.is_finished(), "level {level}, split {split}");
                assert_eq!(out, data);
            }
        }
    }

    #[test]
    fn inflates_raw_streams() {
        let data = sample_data(5_000);
        let compressed = miniz_oxide::deflate::compress_to_vec(&data, 6);
        let mut inflator = Inflator::new(Framing::Raw);
        let mut out = Vec::new();
        inflator.push(&compressed, &mut out).unwrap();
        inflator.finish().unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn unterminated_streams_are_incomplete() {
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&sample_data(2_000), 6);
        let mut inflator = Inflator::new(Framing::Zlib);
        inflator
            .push(&compressed[..compressed.len() - 5], &mut Vec::new())
            .unwrap();
        let err = inflator.finish().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"incomplete image data: compressed datastream did not terminate");
    }

    #[test]
    fn rejects_bad_stream_headers() {
        assert_eq!(
            inflate_all(&[0x78, 0x00]),
            Err(DecompressionError::HeaderChecksum)
        );
        assert_eq!(
            inflate_all(&[0x77, 0x00]),
            Err(DecompressionError::UnsupportedMethod(7))
        );
        assert_eq!(
            inflate_all(&[0x88, 0x98]),
            Err(DecompressionError::InvalidWindowSize(8))
        );
        assert_eq!(
            inflate_all(&[0x78, 0x20]),
            Err(DecompressionError::PresetDictionary)
        );
    }

    #[test]
    fn checks_the_trailer_and_what_follows_it() {
        let mut compressed = miniz_oxide::deflate::compress_to_vec_zlib(b"checksummed", 6);
        let mut extra = compressed.clone();
        extra.push(0);
        assert_eq!(inflate_all(&extra), Err(DecompressionError::ExtraneousData));

        let last = compressed.len() - 1;
        compressed[last] ^= 1;
        assert!(matches!(
            inflate_all(&compressed),
            Err(DecompressionError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rejects_references_before_the_start() {
        let lengths = fixed_literal_lengths();
        let codes = canonical_codes(&lengths);
        let mut writer = BitWriter::default();
        writer.write_bits(0x78, 8);
        writer.write_bits(0x01, 8);
        writer.write_bits(1, 1);
        writer.write_bits(1, 2);
        writer.write_bits(codes[257] as u32, lengths[257] as u32);
        writer.write_bits(0, 5);
        writer.align();
        let stream = writer.take(usize::MAX);
        assert_eq!(
            inflate_all(&stream),
            Err(DecompressionError::DistanceTooFar {
                distance: 1,
                available: 0
            })
        );
    }

    #[test]
    fn rejects_reserved_blocks() {
        // BFINAL = 1, BTYPE = 11.
        assert_eq!(
            inflate_all(&[0x78, 0x01, 0b111]),
            Err(DecompressionError::ReservedBlockType)
        );
        assert_eq!(
            inflate_all(&[0x78, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00]),
            Err(DecompressionError::StoredLengthMismatch)
        );
    }
}
