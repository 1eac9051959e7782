use super::{
    ihdr::{ColorType, Header},
    plte::Palette,
    trns::{grey, rgb},
    ChunkType, ParseableChunk,
};
use crate::error::MetadataError;

/// Preferred background color, in the image's own sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Greyscale(u16),
    Truecolor(u16, u16, u16),
    Palette(u8),
}

impl Background {
    pub(crate) fn parse(
        chunk_data: &[u8],
        header: &Header,
        palette: Option<&Palette>,
    ) -> Result<Self, MetadataError> {
        let malformed = |reason| MetadataError::malformed(ChunkType::bKGD, reason);
        match header.color_type() {
            ColorType::Greyscale | ColorType::GreyscaleWithAlpha => grey(chunk_data)
                .map(|(_, v)| Self::Greyscale(v))
                .map_err(|_| malformed("greyscale background must be 2 bytes")),
            ColorType::Truecolor | ColorType::TruecolorWithAlpha => rgb(chunk_data)
                .map(|(_, (r, g, b))| Self::Truecolor(r, g, b))
                .map_err(|_| malformed("truecolor background must be 6 bytes")),
            ColorType::IndexedColor => match chunk_data {
                [index] if (*index as usize) < palette.map_or(0, Palette::len) => {
                    Ok(Self::Palette(*index))
                }
                [_] => Err(malformed("background index is outside the palette")),
                _ => Err(malformed("indexed background must be 1 byte")),
            },
        }
    }
}

impl ParseableChunk for Background {
    const HEADER: ChunkType = ChunkType::bKGD;

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Greyscale(v) => v.to_be_bytes().to_vec(),
            Self::Truecolor(r, g, b) => [r, g, b].iter().flat_map(|c| c.to_be_bytes()).collect(),
            Self::Palette(index) => vec![*index],
        }
    }
}
