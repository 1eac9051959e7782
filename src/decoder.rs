use std::mem;

use crate::{
    chunks::{
        bkgd::Background, ihdr::Header, phys::PhysicalDimensions, plte::Palette, text,
        timestamp::Timestamp, trns::Transparency, ChunkReader, ChunkType, RawChunk,
    },
    context::DecodeContext,
    error::{FramingError, OrderingError, PngError, Result},
    image::{is_text, Image, Metadata, Placement, Variant},
    io::{ByteSource, MemorySource},
    options::DecodeOptions,
    scanlines::Assign,
    validator::{ChunkValidator, Phase},
};

/// What a call to [`Decoder::advance`] got to.
#[derive(Debug)]
pub enum Status {
    /// The source ran dry; call again once it has more bytes.
    Pending,
    Complete(Image),
}

/// Everything read before the first IDAT chunk.
#[derive(Debug, Default)]
struct Preamble {
    variant: Variant,
    header: Option<Header>,
    palette: Option<Palette>,
    transparency: Option<Transparency>,
    background: Option<Background>,
    metadata: Metadata,
}

impl Preamble {
    fn header(&self) -> Result<&Header> {
        self.header
            .as_ref()
            .ok_or_else(|| OrderingError::MissingRequired(ChunkType::IHDR).into())
    }

    fn accept(&mut self, chunk: &RawChunk, validator: &mut ChunkValidator) -> Result<()> {
        match chunk.kind {
            ChunkType::CgBI => self.variant = Variant::Premultiplied,
            ChunkType::IHDR => {
                let header = Header::parse(&chunk.data)?;
                log::debug!(
                    "{}x{} {:?} at {} bits",
                    header.width(),
                    header.height(),
                    header.color_type(),
                    header.bit_depth()
                );
                validator.set_color_type(header.color_type());
                self.header = Some(header);
            }
            ChunkType::PLTE => {
                let palette = Palette::parse(&chunk.data)?;
                palette.check_against(self.header()?)?;
                self.palette = Some(palette);
            }
            ChunkType::tRNS => {
                let transparency =
                    Transparency::parse(&chunk.data, self.header()?, self.palette.as_ref())?;
                self.transparency = Some(transparency);
            }
            ChunkType::bKGD => {
                let background =
                    Background::parse(&chunk.data, self.header()?, self.palette.as_ref())?;
                self.background = Some(background);
            }
            ChunkType::pHYs => {
                self.metadata.physical = Some(PhysicalDimensions::parse(&chunk.data)?);
            }
            ChunkType::tIME => self.metadata.time = Some(Timestamp::parse(&chunk.data)?),
            kind => {
                if is_text(kind) {
                    text::validate(kind, &chunk.data)?;
                }
                let placement = match self.palette {
                    Some(_) => Placement::BeforeData,
                    None => Placement::BeforePalette,
                };
                self.metadata.push(kind, chunk.data.clone(), placement);
            }
        }
        Ok(())
    }

    fn into_image(self, limit: usize) -> Result<Image> {
        let header = *self.header()?;
        let mut image = Image::blank(header, self.palette, limit)?
            .with_metadata(self.metadata)
            .with_variant(self.variant);
        if let Some(transparency) = self.transparency {
            image = image.with_transparency(transparency)?;
        }
        if let Some(background) = self.background {
            image = image.with_background(background)?;
        }
        Ok(image)
    }
}

#[derive(Debug)]
enum Stage {
    Preamble(Box<Preamble>),
    Data(DecodeContext),
    /// The image was handed out, or an error ended the decode.
    Stopped,
}

/// Pull-driven PNG decoder.
///
/// Each [`advance`](Self::advance) reads as many whole chunks as the source
/// can supply. Running out of bytes is never an error: the decoder reports
/// [`Status::Pending`] and picks up where it stopped on the next call.
///
/// Any error ends the decode. So does handing out the finished image. Later
/// calls fail with [`PngError::Stopped`].
#[derive(Debug)]
pub struct Decoder {
    options: DecodeOptions,
    reader: ChunkReader,
    validator: ChunkValidator,
    stage: Stage,
}

impl Decoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            reader: ChunkReader::new(options.crc),
            options,
            validator: ChunkValidator::new(),
            stage: Stage::Preamble(Box::default()),
        }
    }

    pub fn advance<S: ByteSource>(&mut self, source: &mut S, assign: Assign) -> Result<Status> {
        if matches!(self.stage, Stage::Stopped) {
            return Err(PngError::Stopped);
        }
        let status = self.read_chunks(source, assign);
        if let Err(error) = &status {
            log::debug!("decode aborted: {error}");
            self.stage = Stage::Stopped;
        }
        status
    }

    fn read_chunks<S: ByteSource>(&mut self, source: &mut S, assign: Assign) -> Result<Status> {
        while let Some(chunk) = self.reader.next_chunk(source)? {
            self.validator.check(chunk.kind)?;
            let stage = mem::replace(&mut self.stage, Stage::Stopped);
            self.stage = match stage {
                Stage::Preamble(mut preamble) if chunk.kind != ChunkType::IDAT => {
                    preamble.accept(&chunk, &mut self.validator)?;
                    Stage::Preamble(preamble)
                }
                Stage::Preamble(preamble) => {
                    let image = preamble.into_image(self.options.max_image_bytes)?;
                    let mut context = DecodeContext::new(image);
                    context.push_data(&chunk.data, assign)?;
                    Stage::Data(context)
                }
                Stage::Data(mut context) if chunk.kind == ChunkType::IDAT => {
                    context.push_data(&chunk.data, assign)?;
                    Stage::Data(context)
                }
                Stage::Data(mut context) => {
                    context.push_ancillary(&chunk)?;
                    if context.is_finished() {
                        return Ok(Status::Complete(context.into_image()));
                    }
                    Stage::Data(context)
                }
                Stage::Stopped => return Err(PngError::Stopped),
            };
        }
        Ok(Status::Pending)
    }

    pub fn phase(&self) -> Phase {
        self.validator.phase()
    }

    pub fn header(&self) -> Option<&Header> {
        match &self.stage {
            Stage::Preamble(preamble) => preamble.header.as_ref(),
            Stage::Data(context) => Some(context.image().header()),
            Stage::Stopped => None,
        }
    }

    /// The partially decoded image, once image data has started arriving.
    pub fn image(&self) -> Option<&Image> {
        match &self.stage {
            Stage::Data(context) => Some(context.image()),
            _ => None,
        }
    }
}

/// Decodes a complete PNG held in memory.
pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<Image> {
    let mut decoder = Decoder::new(options.clone());
    match decoder.advance(&mut MemorySource::new(bytes), Assign::Exact)? {
        Status::Complete(image) => Ok(image),
        Status::Pending => Err(FramingError::Truncated.into()),
    }
}
