use super::{ChunkType, ParseableChunk};
use crate::error::MetadataError;
use nom::{
    combinator::all_consuming,
    number::complete::{be_u32, u8},
    sequence::tuple,
    IResult,
};

/// Intended pixel size or aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalDimensions {
    pub x_axis_ppu: u32,
    pub y_axis_ppu: u32,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Unknown,
    Meter,
}

impl From<u8> for Unit {
    fn from(value: u8) -> Self {
        if value == 1 {
            Self::Meter
        } else {
            Self::Unknown
        }
    }
}

impl PhysicalDimensions {
    pub(crate) fn parse(chunk_data: &[u8]) -> Result<Self, MetadataError> {
        let (_, (x_axis_ppu, y_axis_ppu, unit)) = fields(chunk_data)
            .map_err(|_| MetadataError::malformed(ChunkType::pHYs, "pHYs must be 9 bytes"))?;
        if unit > 1 {
            return Err(MetadataError::malformed(ChunkType::pHYs, "unknown unit"));
        }
        Ok(Self {
            x_axis_ppu,
            y_axis_ppu,
            unit: unit.into(),
        })
    }
}

impl ParseableChunk for PhysicalDimensions {
    const HEADER: ChunkType = ChunkType::pHYs;

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(9);
        bytes.extend(self.x_axis_ppu.to_be_bytes());
        bytes.extend(self.y_axis_ppu.to_be_bytes());
        bytes.push(matches!(self.unit, Unit::Meter) as u8);
        bytes
    }
}

fn fields(chunk_data: &[u8]) -> IResult<&[u8], (u32, u32, u8)> {
    all_consuming(tuple((be_u32, be_u32, u8)))(chunk_data)
}

#[cfg(test)]
mod tests {
    use super::{PhysicalDimensions, Unit};
    use crate::chunks::ParseableChunk;

    #[test]
    fn parses_pixels_per_meter() {
        let phys = PhysicalDimensions {
            x_axis_ppu: 2835,
            y_axis_ppu: 2835,
            unit: Unit::Meter,
        };
        assert_eq!(PhysicalDimensions::parse(&phys.to_bytes()), Ok(phys));
        assert!(PhysicalDimensions::parse(&[0; 8]).is_err());
        assert!(PhysicalDimensions::parse(&[0, 0, 0, 1, 0, 0, 0, 1, 2]).is_err());
    }
}
