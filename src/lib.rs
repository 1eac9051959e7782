pub mod chunks;
mod context;
mod crc;
mod decoder;
mod encoder;
pub mod error;
mod filters;
mod image;
mod interlacing;
mod io;
mod options;
mod pixel;
mod png;
mod scanlines;
mod utils;
mod validator;
pub mod zlib;

pub use chunks::{
    bkgd::Background,
    encode_chunk,
    ihdr::{ColorType, Header, Interlacing},
    phys::{PhysicalDimensions, Unit},
    plte::{Entry, Palette},
    text::TextEntry,
    timestamp::Timestamp,
    trns::Transparency,
    ChunkType, RawChunk,
};
pub use context::{DecodeContext, EncodeContext};
pub use decoder::{decode, Decoder, Status};
pub use encoder::Encoder;
pub use error::{PngError, Result};
pub use filters::{filter_scanline, reconstruct_scanline, Filter, FilterSet, Filterer};
pub use image::{AncillaryChunk, Image, Metadata, Placement, Variant};
pub use interlacing::{adam7_passes, Adam7Iter, SubImage};
pub use io::{ByteSink, ByteSource, MemorySource};
pub use options::{CompressionLevel, CrcPolicy, DecodeOptions, EncodeOptions};
pub use pixel::Pixel;
pub use png::PNG;
pub use scanlines::Assign;
pub use validator::{ChunkValidator, Phase};
