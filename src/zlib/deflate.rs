use super::{
    bits::BitWriter,
    fixed_distance_lengths, fixed_literal_lengths,
    huffman::{canonical_codes, code_lengths},
    lz77::{Effort, Matcher, Token},
    Adler32, Framing, CODE_LENGTH_ORDER, DISTANCE_BASE, DISTANCE_EXTRA, END_OF_BLOCK,
    LENGTH_BASE, LENGTH_EXTRA, WINDOW_SIZE,
};
use crate::{options::CompressionLevel, utils::div_ceil};

/// Uncompressed bytes per DEFLATE block.
const BLOCK_SIZE: usize = 1 << 16;
const MAX_STORED: usize = 0xffff;

/// Incremental DEFLATE encoder.
///
/// Input is buffered until a full block is available, so pushing the same
/// bytes in different slices produces the same stream. Compressed bytes
/// accumulate until pulled.
#[derive(Debug)]
pub struct Deflator {
    framing: Framing,
    effort: Option<Effort>,
    /// One window of history followed by input not yet compressed.
    data: Vec<u8>,
    processed: usize,
    matcher: Matcher,
    writer: BitWriter,
    adler: Adler32,
    finished: bool,
}

impl Deflator {
    pub fn new(level: CompressionLevel, framing: Framing) -> Self {
        let mut writer = BitWriter::default();
        if framing == Framing::Zlib {
            writer.write_bytes(&stream_header(level));
        }
        Self {
            framing,
            effort: Effort::for_level(level.get()),
            data: Vec::new(),
            processed: 0,
            matcher: Matcher::new(),
            writer,
            adler: Adler32::default(),
            finished: false,
        }
    }

    /// Adds uncompressed input. Pushing after [`finish`](Self::finish) is a
    /// logic error.
    pub fn push(&mut self, data: &[u8]) {
        debug_assert!(!self.finished, "push after finish");
        self.adler.update(data);
        self.data.extend_from_slice(data);
        while self.data.len() - self.processed >= BLOCK_SIZE {
            self.compress_block(self.processed + BLOCK_SIZE, false);
        }
    }

    /// Compresses whatever input is left as the final block and appends the
    /// trailer.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.compress_block(self.data.len(), true);
        self.writer.align();
        if self.framing == Framing::Zlib {
            self.writer.write_bytes(&self.adler.finish().to_be_bytes());
        }
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Compressed bytes ready to be pulled.
    pub fn available(&self) -> usize {
        self.writer.available()
    }

    /// Takes up to `max` compressed bytes.
    pub fn pull(&mut self, max: usize) -> Vec<u8> {
        self.writer.take(max)
    }

    fn compress_block(&mut self, end: usize, last: bool) {
        let start = self.processed;
        match self.effort {
            None => write_stored(&mut self.writer, &self.data[start..end], last),
            Some(effort) => {
                let tokens = self.matcher.tokenize(&self.data, start, end, effort);
                write_block(
                    &mut self.writer,
                    &self.data[start..end],
                    &tokens,
                    last,
                );
            }
        }
        self.processed = end;

        if self.processed > 2 * WINDOW_SIZE {
            let shift = self.processed - WINDOW_SIZE;
            self.data.drain(..shift);
            self.matcher.slide(shift);
            self.processed -= shift;
        }
    }
}

fn stream_header(level: CompressionLevel) -> [u8; 2] {
    const CMF: u8 = 0x78;
    let flevel = match level.get() {
        0 | 1 => 0,
        2..=5 => 1,
        6 => 2,
        _ => 3,
    };
    let flg = flevel << 6;
    let check = (31 - (CMF as u16 * 256 + flg as u16) % 31) % 31;
    [CMF, flg | check as u8]
}

fn write_stored(writer: &mut BitWriter, bytes: &[u8], last: bool) {
    let pieces = div_ceil(bytes.len(), MAX_STORED).max(1);
    for index in 0..pieces {
        let piece = &bytes[index * MAX_STORED..((index + 1) * MAX_STORED).min(bytes.len())];
        writer.write_bits((last && index + 1 == pieces) as u32, 1);
        writer.write_bits(0b00, 2);
        writer.align();
        let length = piece.len() as u16;
        writer.write_bytes(&length.to_le_bytes());
        writer.write_bytes(&(!length).to_le_bytes());
        writer.write_bytes(piece);
    }
}

fn length_symbol(length: usize) -> usize {
    LENGTH_BASE.partition_point(|&base| base as usize <= length) - 1
}

fn distance_symbol(distance: usize) -> usize {
    DISTANCE_BASE.partition_point(|&base| base as usize <= distance) - 1
}

/// Symbol frequencies of one block, end-of-block included.
struct Frequencies {
    literals: [u32; 286],
    distances: [u32; 30],
}

impl Frequencies {
    fn count(tokens: &[Token]) -> Self {
        let mut frequencies = Self {
            literals: [0; 286],
            distances: [0; 30],
        };
        for token in tokens {
            match *token {
                Token::Literal(byte) => frequencies.literals[byte as usize] += 1,
                Token::Match { length, distance } => {
                    frequencies.literals[257 + length_symbol(length as usize)] += 1;
                    frequencies.distances[distance_symbol(distance as usize)] += 1;
                }
            }
        }
        frequencies.literals[END_OF_BLOCK as usize] += 1;
        frequencies
    }

    /// Bits the block body takes with the given code lengths.
    fn cost(&self, literal_lengths: &[u8], distance_lengths: &[u8]) -> u64 {
        let codes: u64 = self
            .literals
            .iter()
            .zip(literal_lengths)
            .chain(self.distances.iter().zip(distance_lengths))
            .map(|(&frequency, &length)| frequency as u64 * length as u64)
            .sum();
        let length_extra: u64 = self.literals[257..]
            .iter()
            .zip(LENGTH_EXTRA)
            .map(|(&frequency, extra)| frequency as u64 * extra as u64)
            .sum();
        let distance_extra: u64 = self
            .distances
            .iter()
            .zip(DISTANCE_EXTRA)
            .map(|(&frequency, extra)| frequency as u64 * extra as u64)
            .sum();
        codes + length_extra + distance_extra
    }
}

/// Code tables of a dynamic block and their run-length encoded header.
struct DynamicCodes {
    literal_lengths: Vec<u8>,
    distance_lengths: Vec<u8>,
    code_length_lengths: Vec<u8>,
    /// Code length symbols with their extra-bit values.
    runs: Vec<(u8, u8)>,
    literal_count: usize,
    distance_count: usize,
    code_length_count: usize,
}

impl DynamicCodes {
    fn new(frequencies: &Frequencies) -> Self {
        let literal_lengths = code_lengths(&frequencies.literals, 15);
        let distance_lengths = code_lengths(&frequencies.distances, 15);
        let used = |lengths: &[u8], minimum: usize| {
            lengths
                .iter()
                .rposition(|&length| length != 0)
                .map_or(minimum, |last| (last + 1).max(minimum))
        };
        let literal_count = used(&literal_lengths, 257);
        let distance_count = used(&distance_lengths, 1);

        let mut all = literal_lengths[..literal_count].to_vec();
        all.extend_from_slice(&distance_lengths[..distance_count]);
        let runs = run_lengths(&all);

        let mut code_length_frequencies = [0u32; 19];
        for &(symbol, _) in &runs {
            code_length_frequencies[symbol as usize] += 1;
        }
        let code_length_lengths = code_lengths(&code_length_frequencies, 7);
        let code_length_count = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&symbol| code_length_lengths[symbol] != 0)
            .map_or(4, |last| (last + 1).max(4));

        Self {
            literal_lengths,
            distance_lengths,
            code_length_lengths,
            runs,
            literal_count,
            distance_count,
            code_length_count,
        }
    }

    fn header_cost(&self) -> u64 {
        let runs: u64 = self
            .runs
            .iter()
            .map(|&(symbol, _)| {
                self.code_length_lengths[symbol as usize] as u64 + run_extra_bits(symbol) as u64
            })
            .sum();
        14 + 3 * self.code_length_count as u64 + runs
    }

    fn write_header(&self, writer: &mut BitWriter) {
        writer.write_bits((self.literal_count - 257) as u32, 5);
        writer.write_bits((self.distance_count - 1) as u32, 5);
        writer.write_bits((self.code_length_count - 4) as u32, 4);
        for &symbol in &CODE_LENGTH_ORDER[..self.code_length_count] {
            writer.write_bits(self.code_length_lengths[symbol] as u32, 3);
        }
        let codes = canonical_codes(&self.code_length_lengths);
        for &(symbol, extra) in &self.runs {
            let symbol = symbol as usize;
            writer.write_bits(codes[symbol] as u32, self.code_length_lengths[symbol] as u32);
            writer.write_bits(extra as u32, run_extra_bits(symbol as u8));
        }
    }
}

fn run_extra_bits(symbol: u8) -> u32 {
    match symbol {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// Run-length encodes code lengths with the repeat symbols 16, 17 and 18.
fn run_lengths(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut runs = Vec::new();
    let mut index = 0;
    while index < lengths.len() {
        let length = lengths[index];
        let run = lengths[index..].iter().take_while(|&&l| l == length).count();
        index += run;
        let mut left = run;
        if length == 0 {
            while left >= 11 {
                let repeat = left.min(138);
                runs.push((18, (repeat - 11) as u8));
                left -= repeat;
            }
            if left >= 3 {
                runs.push((17, (left - 3) as u8));
                left = 0;
            }
        } else {
            runs.push((length, 0));
            left -= 1;
            while left >= 3 {
                let repeat = left.min(6);
                runs.push((16, (repeat - 3) as u8));
                left -= repeat;
            }
        }
        runs.extend(std::iter::repeat((length, 0)).take(left));
    }
    runs
}

/// Writes one block the cheapest of the three ways DEFLATE allows.
fn write_block(writer: &mut BitWriter, bytes: &[u8], tokens: &[Token], last: bool) {
    let frequencies = Frequencies::count(tokens);
    let fixed_literals = fixed_literal_lengths();
    let fixed_distances = fixed_distance_lengths();
    let fixed_cost = frequencies.cost(&fixed_literals, &fixed_distances);
    let dynamic = DynamicCodes::new(&frequencies);
    let dynamic_cost = dynamic.header_cost()
        + frequencies.cost(&dynamic.literal_lengths, &dynamic.distance_lengths);
    let pieces = div_ceil(bytes.len(), MAX_STORED).max(1) as u64;
    let stored_cost = pieces * 40 + 8 * bytes.len() as u64;

    if stored_cost <= fixed_cost.min(dynamic_cost) {
        log::trace!("stored block, {} bytes", bytes.len());
        write_stored(writer, bytes, last);
    } else if fixed_cost <= dynamic_cost {
        log::trace!("fixed Huffman block, {} tokens", tokens.len());
        writer.write_bits(last as u32, 1);
        writer.write_bits(0b01, 2);
        write_tokens(writer, tokens, &fixed_literals, &fixed_distances);
    } else {
        log::trace!("dynamic Huffman block, {} tokens", tokens.len());
        writer.write_bits(last as u32, 1);
        writer.write_bits(0b10, 2);
        dynamic.write_header(writer);
        write_tokens(
            writer,
            tokens,
            &dynamic.literal_lengths,
            &dynamic.distance_lengths,
        );
    }
}

fn write_tokens(
    writer: &mut BitWriter,
    tokens: &[Token],
    literal_lengths: &[u8],
    distance_lengths: &[u8],
) {
    let literal_codes = canonical_codes(literal_lengths);
    let distance_codes = canonical_codes(distance_lengths);
    let write_literal = |writer: &mut BitWriter, symbol: usize| {
        writer.write_bits(literal_codes[symbol] as u32, literal_lengths[symbol] as u32);
    };
    for token in tokens {
        match *token {
            Token::Literal(byte) => write_literal(writer, byte as usize),
            Token::Match { length, distance } => {
                let (length, distance) = (length as usize, distance as usize);
                let index = length_symbol(length);
                write_literal(writer, 257 + index);
                writer.write_bits(
                    (length - LENGTH_BASE[index] as usize) as u32,
                    LENGTH_EXTRA[index] as u32,
                );
                let index = distance_symbol(distance);
                writer.write_bits(distance_codes[index] as u32, distance_lengths[index] as u32);
                writer.write_bits(
                    (distance - DISTANCE_BASE[index] as usize) as u32,
                    DISTANCE_EXTRA[index] as u32,
                );
            }
        }
    }
    write_literal(writer, END_OF_BLOCK as usize);
}
