use crate::{
    chunks::{encode_chunk, ChunkType, ParseableChunk, SIGNATURE},
    context::EncodeContext,
    error::Result,
    image::{Image, Placement, Variant},
    io::ByteSink,
    options::EncodeOptions,
};

/// CgBI payload Xcode writes: version and flags.
const CGBI_PAYLOAD: [u8; 4] = [0x50, 0x00, 0x20, 0x06];

/// Frames chunks onto a sink.
struct ChunkWriter<'a, W> {
    sink: &'a mut W,
}

impl<W: ByteSink> ChunkWriter<'_, W> {
    fn raw(&mut self, kind: ChunkType, payload: &[u8]) -> Result<()> {
        log::trace!("writing {kind} chunk, {} bytes", payload.len());
        self.sink.write(&encode_chunk(kind, payload))?;
        Ok(())
    }

    fn typed<P: ParseableChunk>(&mut self, chunk: &P) -> Result<()> {
        self.raw(P::HEADER, &chunk.to_bytes())
    }
}

/// Writes images as PNG streams.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncodeOptions,
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Writes `image` to `sink`, chunk by chunk.
    pub fn encode<W: ByteSink>(&self, image: &Image, sink: &mut W) -> Result<()> {
        sink.write(SIGNATURE)?;
        let mut writer = ChunkWriter { sink };
        let metadata = image.metadata();

        if image.variant() == Variant::Premultiplied {
            writer.raw(ChunkType::CgBI, &CGBI_PAYLOAD)?;
        }
        writer.typed(image.header())?;
        for chunk in metadata.chunks_at(Placement::BeforePalette) {
            writer.raw(chunk.kind, &chunk.data)?;
        }
        if let Some(palette) = image.palette() {
            writer.typed(palette)?;
        }
        if let Some(transparency) = image.transparency() {
            writer.typed(transparency)?;
        }
        if let Some(background) = image.background() {
            writer.typed(background)?;
        }
        if let Some(physical) = &metadata.physical {
            writer.typed(physical)?;
        }
        for chunk in metadata.chunks_at(Placement::BeforeData) {
            writer.raw(chunk.kind, &chunk.data)?;
        }

        let mut context = EncodeContext::new(image, &self.options);
        let mut compressed = 0;
        while let Some(payload) = context.pull(self.options.chunk_size) {
            compressed += payload.len();
            writer.raw(ChunkType::IDAT, &payload)?;
        }
        log::debug!(
            "compressed {} pixel bytes to {compressed}",
            image.pixels().len()
        );

        for chunk in metadata.chunks_at(Placement::AfterData) {
            writer.raw(chunk.kind, &chunk.data)?;
        }
        if let Some(time) = &metadata.time {
            writer.typed(time)?;
        }
        writer.raw(ChunkType::IEND, &[])
    }

    /// Encodes `image` into a fresh buffer.
    pub fn encode_to_vec(&self, image: &Image) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.encode(image, &mut bytes)?;
        Ok(bytes)
    }
}
