use thiserror::Error;

use crate::chunks::{ihdr::ColorType, ChunkType};

pub type Result<T, E = PngError> = std::result::Result<T, E>;

/// Every way a decode or encode can fail.
///
/// The variants follow the stages of the pipeline: chunk framing, chunk
/// ordering, the compressed stream, scanline filters, ancillary payloads and
/// construction-time validation of the image itself.
#[derive(Debug, Error)]
pub enum PngError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    #[error(transparent)]
    Decompression(#[from] DecompressionError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("failed to write to sink: {0}")]
    Io(#[from] std::io::Error),
    /// The decoder already failed or completed; start a new one.
    #[error("decoder has already stopped")]
    Stopped,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FramingError {
    #[error("input doesn't start with the PNG signature")]
    BadSignature,
    #[error("input ended before the IEND chunk")]
    Truncated,
    #[error("chunk length {0} exceeds 2^31 - 1")]
    OversizedChunk(u32),
    #[error("invalid chunk type bytes {0:?}")]
    InvalidChunkType([u8; 4]),
    #[error("CRC mismatch in {chunk} chunk: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        chunk: ChunkType,
        stored: u32,
        computed: u32,
    },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum OrderingError {
    #[error("{chunk} chunk must appear before {before}")]
    MisplacedChunk { chunk: ChunkType, before: ChunkType },
    #[error("{0} chunk may only appear once")]
    DuplicateSingleton(ChunkType),
    #[error("missing required {0} chunk")]
    MissingRequired(ChunkType),
    #[error("{chunk} chunk is not allowed for color type {color_type:?}")]
    ForbiddenChunk {
        chunk: ChunkType,
        color_type: ColorType,
    },
    #[error("unknown critical chunk {0}")]
    UnknownCriticalChunk(ChunkType),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DecompressionError {
    #[error("unsupported zlib compression method {0}")]
    UnsupportedMethod(u8),
    #[error("zlib window size exponent {0} is larger than 7")]
    InvalidWindowSize(u8),
    #[error("zlib header check bits are wrong")]
    HeaderChecksum,
    #[error("zlib preset dictionaries are not allowed")]
    PresetDictionary,
    #[error("reserved DEFLATE block type")]
    ReservedBlockType,
    #[error("stored block length doesn't match its complement")]
    StoredLengthMismatch,
    #[error("invalid Huffman code lengths: {0}")]
    InvalidCodeLengths(&'static str),
    #[error("invalid Huffman symbol {0}")]
    InvalidSymbol(u16),
    #[error("back-reference distance {distance} exceeds {available} available bytes")]
    DistanceTooFar { distance: usize, available: usize },
    #[error("adler-32 mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("data found after the end of the compressed stream")]
    ExtraneousData,
    #[error("incomplete image data: compressed datastream did not terminate")]
    IncompleteImageDataCompressedDatastream,
    #[error("decompressed data exceeds the {0} byte limit")]
    OutputLimit(usize),
    #[error("decompressed data runs past the last scanline")]
    ExcessImageData,
    #[error("compressed stream ended before every scanline was decoded")]
    MissingImageData,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FilterError {
    #[error("unknown filter type {0}")]
    UnknownFilter(u8),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MetadataError {
    #[error("malformed {chunk} chunk: {reason}")]
    Malformed {
        chunk: ChunkType,
        reason: &'static str,
    },
    #[error("tIME chunk holds an impossible date or time")]
    InvalidTimestamp,
    #[error("palette index {0} is out of range")]
    PaletteIndex(u8),
}

impl MetadataError {
    pub(crate) fn malformed(chunk: ChunkType, reason: &'static str) -> Self {
        Self::Malformed { chunk, reason }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FormatError {
    #[error("image dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("image dimensions {width}x{height} exceed 2^31 - 1")]
    DimensionTooLarge { width: u32, height: u32 },
    #[error("image needs {needed} bytes, over the {limit} byte limit")]
    ImageTooLarge { needed: usize, limit: usize },
    #[error("unknown color type {0}")]
    UnknownColorType(u8),
    #[error("bit depth {bit_depth} is invalid for color type {color_type:?}")]
    InvalidBitDepth { bit_depth: u8, color_type: ColorType },
    #[error("unknown compression method {0}")]
    UnknownCompressionMethod(u8),
    #[error("unknown filter method {0}")]
    UnknownFilterMethod(u8),
    #[error("unknown interlace method {0}")]
    UnknownInterlaceMethod(u8),
    #[error("IHDR chunk must be 13 bytes")]
    MalformedHeader,
    #[error("palette length {0} isn't a positive multiple of 3")]
    PaletteLength(usize),
    #[error("palette has {entries} entries but bit depth {bit_depth} allows {max}")]
    PaletteTooLarge {
        entries: usize,
        bit_depth: u8,
        max: usize,
    },
    #[error("indexed images need a palette")]
    MissingPalette,
    #[error("only indexed images carry a palette, not {0:?}")]
    UnexpectedPalette(ColorType),
    #[error("pixel buffer is {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("sample value {value} doesn't fit in {bit_depth} bits")]
    SampleOutOfRange { value: u8, bit_depth: u8 },
    #[error("compression level {0} is outside 0..=9")]
    CompressionLevel(u8),
}
