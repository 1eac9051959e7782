use crate::{
    chunks::{ihdr::Header, text, timestamp::Timestamp, ChunkType, RawChunk},
    error::{DecompressionError, OrderingError, Result},
    filters::{defilter, Filterer},
    image::{is_text, Image, Placement, Variant},
    options::EncodeOptions,
    scanlines::{gather_row, pack_samples, place_row, unpack_samples, Assign, ScanlineCursor},
    validator::allowed_after_data,
    zlib::{Deflator, Framing, Inflator},
};

fn framing(variant: Variant) -> Framing {
    match variant {
        Variant::Standard => Framing::Zlib,
        Variant::Premultiplied => Framing::Raw,
    }
}

/// Decode state for one image, from its first IDAT chunk to IEND.
///
/// Owns the image being filled in and the inflator feeding it. Chunks must be
/// pushed in the order they arrive.
#[derive(Debug)]
pub struct DecodeContext {
    image: Image,
    inflator: Inflator,
    cursor: ScanlineCursor,
    /// Decompressed bytes not yet forming a whole scanline.
    pending: Vec<u8>,
    /// The last reconstructed row of the current pass.
    previous: Vec<u8>,
    unpacked: Vec<u8>,
    finished: bool,
}

impl DecodeContext {
    pub fn new(image: Image) -> Self {
        log::debug!(
            "decoding {}x{} image, {:?}",
            image.width(),
            image.height(),
            image.header().interlace_method()
        );
        let cursor = ScanlineCursor::new(image.header());
        let expected = cursor.remaining_bytes(image.header());
        Self {
            inflator: Inflator::new(framing(image.variant())).with_output_limit(expected),
            cursor,
            image,
            pending: Vec::new(),
            previous: Vec::new(),
            unpacked: Vec::new(),
            finished: false,
        }
    }

    /// Feeds one IDAT payload and writes every scanline it completes into
    /// the image.
    ///
    /// The inflator never produces more than the image's scanlines hold, so
    /// a stream that expands further fails without buffering the excess.
    pub fn push_data(&mut self, payload: &[u8], assign: Assign) -> Result<()> {
        self.inflator
            .push(payload, &mut self.pending)
            .map_err(|error| match error {
                DecompressionError::OutputLimit(_) => DecompressionError::ExcessImageData,
                error => error,
            })?;

        let header: Header = *self.image.header();
        let bpp = header.filter_width();
        let mut consumed = 0;
        while let Some((sub, row)) = self.cursor.current() {
            let length = header.scanline_size(sub.width);
            let Some(line) = self.pending.get_mut(consumed..consumed + length) else {
                break;
            };
            let previous = (row > 0).then_some(&self.previous[..]);
            defilter(line, previous, bpp)?;
            unpack_samples(&line[1..], sub.width, header.bit_depth(), &mut self.unpacked);
            place_row(
                self.image.pixels_mut(),
                &header,
                &sub,
                row,
                &self.unpacked,
                assign,
            );
            self.previous.clear();
            self.previous.extend_from_slice(&line[1..]);
            consumed += length;
            self.cursor.advance();
        }
        self.pending.drain(..consumed);

        if self.cursor.is_done() && !self.pending.is_empty() {
            return Err(DecompressionError::ExcessImageData.into());
        }
        Ok(())
    }

    /// Handles a chunk that follows the image data.
    pub fn push_ancillary(&mut self, chunk: &RawChunk) -> Result<()> {
        match chunk.kind {
            ChunkType::IEND => self.finish(),
            kind if !allowed_after_data(kind) => Err(OrderingError::MisplacedChunk {
                chunk: kind,
                before: ChunkType::IDAT,
            }
            .into()),
            ChunkType::tIME => {
                let metadata = self.image.metadata_mut();
                if metadata.time.is_some() {
                    return Err(OrderingError::DuplicateSingleton(ChunkType::tIME).into());
                }
                metadata.time = Some(Timestamp::parse(&chunk.data)?);
                Ok(())
            }
            kind => {
                if is_text(kind) {
                    text::validate(kind, &chunk.data)?;
                }
                self.image
                    .metadata_mut()
                    .push(kind, chunk.data.clone(), Placement::AfterData);
                Ok(())
            }
        }
    }

    /// Checks that the compressed stream ended and filled every scanline.
    fn finish(&mut self) -> Result<()> {
        self.inflator.finish()?;
        if !self.cursor.is_done() {
            return Err(DecompressionError::MissingImageData.into());
        }
        self.finished = true;
        log::debug!("image data complete");
        Ok(())
    }

    /// Whether IEND has been pushed and accepted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The image as decoded so far.
    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn into_image(self) -> Image {
        self.image
    }
}

/// Encode state for one image: walks its scanlines in stream order, filters
/// and compresses them, and hands out IDAT payloads.
#[derive(Debug)]
pub struct EncodeContext<'a> {
    image: &'a Image,
    deflator: Deflator,
    filterer: Filterer,
    cursor: ScanlineCursor,
    samples: Vec<u8>,
    packed: Vec<u8>,
    filtered: Vec<u8>,
}

impl<'a> EncodeContext<'a> {
    pub fn new(image: &'a Image, options: &EncodeOptions) -> Self {
        let header = image.header();
        Self {
            image,
            deflator: Deflator::new(options.level, framing(image.variant())),
            filterer: Filterer::new(options.filters, header.filter_width()),
            cursor: ScanlineCursor::new(header),
            samples: Vec::new(),
            packed: Vec::new(),
            filtered: Vec::new(),
        }
    }

    /// The next IDAT payload, at most `hint` bytes, or `None` once the
    /// compressed stream has been handed out in full.
    pub fn pull(&mut self, hint: usize) -> Option<Vec<u8>> {
        let hint = hint.max(1);
        let header = *self.image.header();
        while self.deflator.available() < hint && !self.deflator.is_finished() {
            let Some((sub, row)) = self.cursor.current() else {
                self.deflator.finish();
                break;
            };
            if row == 0 {
                self.filterer.reset();
            }
            gather_row(self.image.pixels(), &header, &sub, row, &mut self.samples);
            pack_samples(&self.samples, header.bit_depth(), &mut self.packed);
            self.filtered.clear();
            self.filterer.filter_row(&self.packed, &mut self.filtered);
            self.deflator.push(&self.filtered);
            self.cursor.advance();
        }
        if self.deflator.available() == 0 {
            return None;
        }
        Some(self.deflator.pull(hint))
    }
}
