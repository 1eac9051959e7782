use nom::{
    combinator::all_consuming,
    number::complete::{be_u32, u8},
    sequence::tuple,
    IResult,
};

use super::{ChunkType, ParseableChunk};
use crate::{error::FormatError, utils::packed_row_bytes};

const MAX_DIMENSION: u32 = 0x7fff_ffff;

/// Image geometry and sample format. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bit_depth: u8,
    pub(crate) color_type: ColorType,
    pub(crate) interlace_method: Interlacing,
}

impl Header {
    pub fn new(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: ColorType,
        interlace_method: Interlacing,
    ) -> Result<Self, FormatError> {
        if width == 0 || height == 0 {
            return Err(FormatError::ZeroDimension { width, height });
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(FormatError::DimensionTooLarge { width, height });
        }
        if !color_type.allowed_bit_depths().contains(&bit_depth) {
            return Err(FormatError::InvalidBitDepth {
                bit_depth,
                color_type,
            });
        }
        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace_method,
        })
    }

    pub(crate) fn parse(chunk_data: &[u8]) -> Result<Self, FormatError> {
        let (_, (width, height, bit_depth, color_type, compression, filter, interlace)) =
            raw_header(chunk_data).map_err(|_| FormatError::MalformedHeader)?;
        if compression != 0 {
            return Err(FormatError::UnknownCompressionMethod(compression));
        }
        if filter != 0 {
            return Err(FormatError::UnknownFilterMethod(filter));
        }
        Self::new(
            width,
            height,
            bit_depth,
            ColorType::try_from(color_type)?,
            Interlacing::try_from(interlace)?,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    pub fn interlace_method(&self) -> Interlacing {
        self.interlace_method
    }

    /// Byte distance between corresponding samples of neighbouring pixels,
    /// as the filters see it. Never less than one.
    pub(crate) fn filter_width(&self) -> usize {
        let channel_count = self.color_type.channel_count();
        let sample_width = usize::max(self.bit_depth as usize / 8, 1);
        channel_count * sample_width
    }

    pub(crate) fn pixel_width(&self) -> usize {
        self.color_type.channel_count() * self.bit_depth as usize
    }

    /// Length of one scanline `width` pixels wide, filter byte included.
    pub(crate) fn scanline_size(&self, width: usize) -> usize {
        packed_row_bytes(width, self.pixel_width()) + 1
    }

    /// Bytes each pixel takes in an [`Image`](crate::Image)'s buffer.
    /// Sub-byte samples are unpacked to one byte each.
    pub fn bytes_per_pixel(&self) -> usize {
        self.filter_width()
    }

    /// Size of the pixel buffer, or `None` if it doesn't fit in memory.
    pub fn image_bytes(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

impl ParseableChunk for Header {
    const HEADER: ChunkType = ChunkType::IHDR;

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(13);
        bytes.extend(&self.width.to_be_bytes());
        bytes.extend(&self.height.to_be_bytes());
        bytes.extend(&[
            self.bit_depth,
            self.color_type as u8,
            0,
            0,
            self.interlace_method as u8,
        ]);
        bytes
    }
}

type RawHeader = (u32, u32, u8, u8, u8, u8, u8);

fn raw_header(chunk_data: &[u8]) -> IResult<&[u8], RawHeader> {
    all_consuming(tuple((be_u32, be_u32, u8, u8, u8, u8, u8)))(chunk_data)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    #[default]
    Greyscale = 0,
    Truecolor = 2,
    IndexedColor = 3,
    GreyscaleWithAlpha = 4,
    TruecolorWithAlpha = 6,
}

impl TryFrom<u8> for ColorType {
    type Error = FormatError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Greyscale),
            2 => Ok(Self::Truecolor),
            3 => Ok(Self::IndexedColor),
            4 => Ok(Self::GreyscaleWithAlpha),
            6 => Ok(Self::TruecolorWithAlpha),
            other => Err(FormatError::UnknownColorType(other)),
        }
    }
}

impl ColorType {
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Greyscale => 1,
            Self::IndexedColor => 1,
            Self::GreyscaleWithAlpha => 2,
            Self::Truecolor => 3,
            Self::TruecolorWithAlpha => 4,
        }
    }

    pub fn allowed_bit_depths(&self) -> &'static [u8] {
        match self {
            Self::Greyscale => &[1, 2, 4, 8, 16],
            Self::IndexedColor => &[1, 2, 4, 8],
            Self::GreyscaleWithAlpha | Self::Truecolor | Self::TruecolorWithAlpha => &[8, 16],
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::GreyscaleWithAlpha | Self::TruecolorWithAlpha)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Interlacing {
    #[default]
    None,
    Adam7,
}

impl TryFrom<u8> for Interlacing {
    type Error = FormatError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Adam7),
            other => Err(FormatError::UnknownInterlaceMethod(other)),
        }
    }
}
