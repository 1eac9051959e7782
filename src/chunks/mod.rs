use std::fmt;

use nom::{bytes::complete::take, number::complete::be_u32, sequence::tuple, IResult};

use crate::{
    crc::{calculate_crc, Crc32},
    error::{FramingError, Result},
    io::ByteSource,
    options::CrcPolicy,
};

pub mod bkgd;
pub mod ihdr;
pub mod phys;
pub mod plte;
pub mod text;
pub mod timestamp;
pub mod trns;

pub const SIGNATURE: &[u8; 8] = b"\x89PNG\x0d\x0a\x1a\x0a";

/// Largest chunk length the format allows.
const MAX_CHUNK_LENGTH: u32 = 0x7fff_ffff;

/// The four-letter tag naming a chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

#[allow(non_upper_case_globals)]
impl ChunkType {
    pub const IHDR: Self = Self(*b"IHDR");
    pub const PLTE: Self = Self(*b"PLTE");
    pub const IDAT: Self = Self(*b"IDAT");
    pub const IEND: Self = Self(*b"IEND");
    pub const CgBI: Self = Self(*b"CgBI");
    pub const tRNS: Self = Self(*b"tRNS");
    pub const bKGD: Self = Self(*b"bKGD");
    pub const hIST: Self = Self(*b"hIST");
    pub const gAMA: Self = Self(*b"gAMA");
    pub const cHRM: Self = Self(*b"cHRM");
    pub const sRGB: Self = Self(*b"sRGB");
    pub const iCCP: Self = Self(*b"iCCP");
    pub const sBIT: Self = Self(*b"sBIT");
    pub const pHYs: Self = Self(*b"pHYs");
    pub const sPLT: Self = Self(*b"sPLT");
    pub const tIME: Self = Self(*b"tIME");
    pub const tEXt: Self = Self(*b"tEXt");
    pub const zTXt: Self = Self(*b"zTXt");
    pub const iTXt: Self = Self(*b"iTXt");

    /// Decoders must understand critical chunks; the case of the first
    /// letter carries the flag.
    pub fn is_critical(self) -> bool {
        self.0[0] & 0x20 == 0
    }

    fn is_valid(self) -> bool {
        self.0.iter().all(u8::is_ascii_alphabetic)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({self})")
    }
}

/// A chunk whose framing and CRC have been checked but whose payload hasn't
/// been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub kind: ChunkType,
    pub data: Vec<u8>,
}

pub(crate) trait ParseableChunk: Sized {
    const HEADER: ChunkType;

    fn to_bytes(&self) -> Vec<u8>;
}

/// Frames `payload` as a complete chunk: length, type, payload and CRC.
pub fn encode_chunk(kind: ChunkType, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 12);
    bytes.extend((payload.len() as u32).to_be_bytes());
    bytes.extend(kind.0);
    bytes.extend(payload);
    bytes.extend(calculate_crc(&[&kind.0, payload]).to_be_bytes());
    bytes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Signature,
    Header,
    Body { length: u32, kind: ChunkType },
}

/// Splits a byte source into chunks, one call at a time.
///
/// The reader remembers how far it got, so a source that runs dry halfway
/// through a chunk can be topped up and polled again.
#[derive(Debug)]
pub(crate) struct ChunkReader {
    state: ReadState,
    crc: CrcPolicy,
}

impl ChunkReader {
    pub(crate) fn new(crc: CrcPolicy) -> Self {
        Self {
            state: ReadState::Signature,
            crc,
        }
    }

    /// Returns `Ok(None)` when the source needs more data.
    pub(crate) fn next_chunk<S: ByteSource>(&mut self, source: &mut S) -> Result<Option<RawChunk>> {
        loop {
            match self.state {
                ReadState::Signature => {
                    let Some(signature) = source.read(SIGNATURE.len()) else {
                        return Ok(None);
                    };
                    if signature != SIGNATURE {
                        return Err(FramingError::BadSignature.into());
                    }
                    self.state = ReadState::Header;
                }
                ReadState::Header => {
                    let Some(header) = source.read(8) else {
                        return Ok(None);
                    };
                    let (length, kind) = chunk_header(&header)
                        .map(|(_, parsed)| parsed)
                        .map_err(|_| FramingError::Truncated)?;
                    if length > MAX_CHUNK_LENGTH {
                        return Err(FramingError::OversizedChunk(length).into());
                    }
                    if !kind.is_valid() {
                        return Err(FramingError::InvalidChunkType(kind.0).into());
                    }
                    self.state = ReadState::Body { length, kind };
                }
                ReadState::Body { length, kind } => {
                    let Some(mut body) = source.read(length as usize + 4) else {
                        return Ok(None);
                    };
                    self.state = ReadState::Header;
                    let stored_bytes = body.split_off(length as usize);
                    let stored = u32::from_be_bytes([
                        stored_bytes[0],
                        stored_bytes[1],
                        stored_bytes[2],
                        stored_bytes[3],
                    ]);
                    let mut crc = Crc32::new();
                    crc.update(&kind.0);
                    crc.update(&body);
                    let computed = crc.finish();
                    if stored != computed {
                        match self.crc {
                            CrcPolicy::Strict => {
                                return Err(FramingError::CrcMismatch {
                                    chunk: kind,
                                    stored,
                                    computed,
                                }
                                .into())
                            }
                            CrcPolicy::Lenient => {
                                log::warn!("ignoring CRC mismatch in {kind} chunk");
                            }
                        }
                    }
                    log::trace!("read {kind} chunk, {length} bytes");
                    return Ok(Some(RawChunk { kind, data: body }));
                }
            }
        }
    }
}

fn chunk_header(input: &[u8]) -> IResult<&[u8], (u32, ChunkType)> {
    let (rest, (length, kind)) = tuple((be_u32, take(4usize)))(input)?;
    let kind = ChunkType([kind[0], kind[1], kind[2], kind[3]]);
    Ok((rest, (length, kind)))
}
