use crate::{
    decoder::decode,
    encoder::Encoder,
    error::Result,
    image::Image,
    options::{DecodeOptions, EncodeOptions},
};

/// A whole PNG file decoded in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PNG {
    image: Image,
}

impl PNG {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_with(bytes, &DecodeOptions::default())
    }

    pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<Self> {
        Ok(Self {
            image: decode(bytes, options)?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(EncodeOptions::default())
    }

    pub fn encode_with(&self, options: EncodeOptions) -> Result<Vec<u8>> {
        Encoder::new(options).encode_to_vec(&self.image)
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn into_image(self) -> Image {
        self.image
    }
}

impl From<Image> for PNG {
    fn from(image: Image) -> Self {
        Self { image }
    }
}
