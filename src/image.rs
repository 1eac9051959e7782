use crate::{
    chunks::{
        bkgd::Background,
        ihdr::{ColorType, Header},
        phys::PhysicalDimensions,
        plte::Palette,
        text::{self, TextEntry},
        timestamp::Timestamp,
        trns::Transparency,
        ChunkType, ParseableChunk,
    },
    error::{FormatError, MetadataError},
};

/// How the pixel data was (or will be) stored on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Standard,
    /// Apple's CgBI files: raw DEFLATE without zlib framing, BGRA channel
    /// order and premultiplied alpha.
    Premultiplied,
}

/// Where an ancillary chunk sat relative to the critical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placement {
    BeforePalette,
    BeforeData,
    AfterData,
}

/// An ancillary chunk the codec carries along without interpreting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncillaryChunk {
    pub kind: ChunkType,
    pub data: Vec<u8>,
    pub placement: Placement,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub time: Option<Timestamp>,
    pub physical: Option<PhysicalDimensions>,
    /// Text, private and other ancillary chunks in stream order.
    pub chunks: Vec<AncillaryChunk>,
}

impl Metadata {
    /// Decodes every tEXt, zTXt and iTXt chunk.
    pub fn text(&self) -> Result<Vec<TextEntry>, MetadataError> {
        self.chunks
            .iter()
            .filter(|chunk| is_text(chunk.kind))
            .map(|chunk| text::parse(chunk.kind, &chunk.data))
            .collect()
    }

    pub fn chunks_at(&self, placement: Placement) -> impl Iterator<Item = &AncillaryChunk> {
        self.chunks
            .iter()
            .filter(move |chunk| chunk.placement == placement)
    }

    pub(crate) fn push(&mut self, kind: ChunkType, data: Vec<u8>, placement: Placement) {
        self.chunks.push(AncillaryChunk {
            kind,
            data,
            placement,
        });
    }
}

pub(crate) fn is_text(kind: ChunkType) -> bool {
    matches!(kind, ChunkType::tEXt | ChunkType::zTXt | ChunkType::iTXt)
}

/// A decoded image: its header, color tables, metadata and pixels.
///
/// Pixels are stored row-major, `bytes_per_pixel` bytes each. Samples below 8
/// bits take one byte apiece and keep their raw value; 16-bit samples are big
/// endian. The buffer's length is fixed when the image is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    header: Header,
    palette: Option<Palette>,
    transparency: Option<Transparency>,
    background: Option<Background>,
    metadata: Metadata,
    variant: Variant,
    pixels: Vec<u8>,
}

impl Image {
    pub fn new(header: Header, palette: Option<Palette>, pixels: Vec<u8>) -> Result<Self, FormatError> {
        check_palette(&header, palette.as_ref())?;
        let expected = header.image_bytes().ok_or(FormatError::ImageTooLarge {
            needed: usize::MAX,
            limit: usize::MAX,
        })?;
        if pixels.len() != expected {
            return Err(FormatError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        let bit_depth = header.bit_depth();
        if bit_depth < 8 {
            if let Some(&value) = pixels.iter().find(|&&sample| sample >> bit_depth != 0) {
                return Err(FormatError::SampleOutOfRange { value, bit_depth });
            }
        }
        Ok(Self {
            header,
            palette,
            transparency: None,
            background: None,
            metadata: Metadata::default(),
            variant: Variant::Standard,
            pixels,
        })
    }

    /// A zeroed image, refused if its buffer would exceed `limit` bytes.
    pub(crate) fn blank(
        header: Header,
        palette: Option<Palette>,
        limit: usize,
    ) -> Result<Self, FormatError> {
        let needed = header.image_bytes().unwrap_or(usize::MAX);
        if needed > limit {
            return Err(FormatError::ImageTooLarge { needed, limit });
        }
        Self::new(header, palette, vec![0; needed])
    }

    pub fn with_transparency(mut self, transparency: Transparency) -> Result<Self, MetadataError> {
        let checked = Transparency::parse(
            &transparency.to_bytes(),
            &self.header,
            self.palette.as_ref(),
        )?;
        self.transparency = Some(checked);
        Ok(self)
    }

    pub fn with_background(mut self, background: Background) -> Result<Self, MetadataError> {
        let checked =
            Background::parse(&background.to_bytes(), &self.header, self.palette.as_ref())?;
        self.background = Some(checked);
        Ok(self)
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn width(&self) -> u32 {
        self.header.width()
    }

    pub fn height(&self) -> u32 {
        self.header.height()
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn transparency(&self) -> Option<&Transparency> {
        self.transparency.as_ref()
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

fn check_palette(header: &Header, palette: Option<&Palette>) -> Result<(), FormatError> {
    match (header.color_type(), palette) {
        (ColorType::IndexedColor, Some(palette)) => palette.check_against(header),
        (ColorType::IndexedColor, None) => Err(FormatError::MissingPalette),
        (_, None) => Ok(()),
        (color_type, Some(_)) => Err(FormatError::UnexpectedPalette(color_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, Metadata, Placement};
    use crate::{
        chunks::{
            ihdr::{ColorType, Header, Interlacing},
            plte::{Entry, Palette},
            trns::Transparency,
            ChunkType,
        },
        error::FormatError,
    };

    fn header(bit_depth: u8, color_type: ColorType) -> Header {
        Header::new(2, 2, bit_depth, color_type, Interlacing::None).unwrap()
    }

    #[test]
    fn buffer_must_match_the_header() {
        let result = Image::new(header(16, ColorType::Truecolor), None, vec![0; 23]);
        assert_eq!(
            result,
            Err(FormatError::BufferLength {
                expected: 24,
                actual: 23
            })
        );
        assert!(Image::new(header(16, ColorType::Truecolor), None, vec![0; 24]).is_ok());
    }

    #[test]
    fn samples_must_fit_the_bit_depth() {
        assert_eq!(
            Image::new(header(2, ColorType::Greyscale), None, vec![0, 3, 4, 1]),
            Err(FormatError::SampleOutOfRange {
                value: 4,
                bit_depth: 2
            })
        );
    }

    #[test]
    fn palettes_belong_to_indexed_images() {
        let palette = Palette::new(vec![Entry(0, 0, 0), Entry(255, 255, 255)]).unwrap();
        assert_eq!(
            Image::new(header(1, ColorType::IndexedColor), None, vec![0; 4]),
            Err(FormatError::MissingPalette)
        );
        assert_eq!(
            Image::new(header(8, ColorType::Truecolor), Some(palette.clone()), vec![0; 12]),
            Err(FormatError::UnexpectedPalette(ColorType::Truecolor))
        );
        let image =
            Image::new(header(1, ColorType::IndexedColor), Some(palette), vec![1, 0, 0, 1]).unwrap();
        assert!(image
            .clone()
            .with_transparency(Transparency::Palette(vec![0, 0, 0]))
            .is_err());
        let image = image
            .with_transparency(Transparency::Palette(vec![0]))
            .unwrap();
        assert_eq!(image.transparency(), Some(&Transparency::Palette(vec![0])));
    }

    #[test]
    fn blank_images_respect_the_limit() {
        assert_eq!(
            Image::blank(header(8, ColorType::TruecolorWithAlpha), None, 15),
            Err(FormatError::ImageTooLarge {
                needed: 16,
                limit: 15
            })
        );
        let image = Image::blank(header(8, ColorType::TruecolorWithAlpha), None, 16).unwrap();
        assert_eq!(image.pixels(), [0; 16]);
    }

    #[test]
    fn text_is_read_from_raw_chunks() {
        let mut metadata = Metadata::default();
        metadata.push(ChunkType::tEXt, b"Title\0Lena".to_vec(), Placement::BeforeData);
        metadata.push(ChunkType(*b"prVt"), vec![1, 2, 3], Placement::AfterData);
        let text = metadata.text().unwrap();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].keyword, "Title");
        assert_eq!(text[0].text, "Lena");
        assert_eq!(metadata.chunks_at(Placement::AfterData).count(), 1);
    }
}
