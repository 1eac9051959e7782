use nom::{bytes::complete::take, combinator::map, multi::count, IResult};

use super::{ihdr::Header, ChunkType, ParseableChunk};
use crate::error::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry(pub u8, pub u8, pub u8);

/// Color table for indexed images, at most 256 entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Entry>,
}

impl Palette {
    pub fn new(colors: Vec<Entry>) -> Result<Self, FormatError> {
        if colors.is_empty() || colors.len() > 256 {
            return Err(FormatError::PaletteLength(colors.len() * 3));
        }
        Ok(Self { colors })
    }

    pub(crate) fn parse(chunk_data: &[u8]) -> Result<Self, FormatError> {
        if chunk_data.len() % 3 != 0 {
            return Err(FormatError::PaletteLength(chunk_data.len()));
        }
        let (_, colors) = entries(chunk_data, chunk_data.len() / 3)
            .map_err(|_| FormatError::PaletteLength(chunk_data.len()))?;
        Self::new(colors)
    }

    /// An indexed image can't address more entries than its bit depth allows.
    pub(crate) fn check_against(&self, header: &Header) -> Result<(), FormatError> {
        let max = 1usize << header.bit_depth().min(8);
        if self.colors.len() > max {
            return Err(FormatError::PaletteTooLarge {
                entries: self.colors.len(),
                bit_depth: header.bit_depth(),
                max,
            });
        }
        Ok(())
    }

    pub fn get_color(&self, index: u8) -> Option<&Entry> {
        self.colors.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl ParseableChunk for Palette {
    const HEADER: ChunkType = ChunkType::PLTE;

    fn to_bytes(&self) -> Vec<u8> {
        self.colors
            .iter()
            .flat_map(|Entry(r, g, b)| [*r, *g, *b])
            .collect()
    }
}

fn entries(chunk_data: &[u8], entry_count: usize) -> IResult<&[u8], Vec<Entry>> {
    count(
        map(take(3usize), |i: &[u8]| Entry(i[0], i[1], i[2])),
        entry_count,
    )(chunk_data)
}
