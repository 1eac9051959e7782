use nom::{combinator::all_consuming, number::complete::be_u16, sequence::tuple, IResult};

use super::{
    ihdr::{ColorType, Header},
    plte::Palette,
    ChunkType, ParseableChunk,
};
use crate::error::MetadataError;

/// Single-color or per-palette-entry transparency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transparency {
    Greyscale(u16),
    Truecolor(u16, u16, u16),
    /// Alpha for the first `n` palette entries; the rest are opaque.
    Palette(Vec<u8>),
}

impl Transparency {
    pub(crate) fn parse(
        chunk_data: &[u8],
        header: &Header,
        palette: Option<&Palette>,
    ) -> Result<Self, MetadataError> {
        let malformed = |reason| MetadataError::malformed(ChunkType::tRNS, reason);
        match header.color_type() {
            ColorType::Greyscale => grey(chunk_data)
                .map(|(_, v)| Self::Greyscale(v))
                .map_err(|_| malformed("greyscale transparency must be 2 bytes")),
            ColorType::Truecolor => rgb(chunk_data)
                .map(|(_, (r, g, b))| Self::Truecolor(r, g, b))
                .map_err(|_| malformed("truecolor transparency must be 6 bytes")),
            ColorType::IndexedColor => {
                let entries = palette.map_or(0, Palette::len);
                if chunk_data.len() > entries {
                    return Err(malformed("more alpha values than palette entries"));
                }
                Ok(Self::Palette(chunk_data.to_vec()))
            }
            ColorType::GreyscaleWithAlpha | ColorType::TruecolorWithAlpha => {
                Err(malformed("image already has an alpha channel"))
            }
        }
    }

    pub(crate) fn palette_alpha(&self, index: u8) -> u8 {
        match self {
            Self::Palette(alphas) => *alphas.get(index as usize).unwrap_or(&255),
            _ => 255,
        }
    }
}

impl ParseableChunk for Transparency {
    const HEADER: ChunkType = ChunkType::tRNS;

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Greyscale(v) => v.to_be_bytes().to_vec(),
            Self::Truecolor(r, g, b) => [r, g, b].iter().flat_map(|c| c.to_be_bytes()).collect(),
            Self::Palette(alphas) => alphas.clone(),
        }
    }
}

pub(crate) fn grey(input: &[u8]) -> IResult<&[u8], u16> {
    all_consuming(be_u16)(input)
}

pub(crate) fn rgb(input: &[u8]) -> IResult<&[u8], (u16, u16, u16)> {
    all_consuming(tuple((be_u16, be_u16, be_u16)))(input)
}
