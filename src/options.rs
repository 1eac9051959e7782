use crate::{error::FormatError, filters::FilterSet};

/// Whether chunk CRCs are checked while decoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CrcPolicy {
    #[default]
    Strict,
    /// Mismatches are logged and the chunk is used anyway.
    Lenient,
}

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub crc: CrcPolicy,
    /// Largest pixel buffer the decoder will allocate.
    pub max_image_bytes: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            crc: CrcPolicy::Strict,
            max_image_bytes: 1 << 30,
        }
    }
}

impl DecodeOptions {
    pub fn with_crc(mut self, crc: CrcPolicy) -> Self {
        self.crc = crc;
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }
}

/// DEFLATE effort, from 0 (stored blocks only) to 9 (longest match search).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(9);

    pub fn new(level: u8) -> Result<Self, FormatError> {
        if level > Self::MAX.0 {
            return Err(FormatError::CompressionLevel(level));
        }
        Ok(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every valid level, lowest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN.0..=Self::MAX.0).map(Self)
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = FormatError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub level: CompressionLevel,
    /// Filters the encoder may choose between for each scanline.
    pub filters: FilterSet,
    /// Target payload size of each IDAT chunk.
    pub chunk_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::default(),
            filters: FilterSet::ALL,
            chunk_size: 8192,
        }
    }
}

impl EncodeOptions {
    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}
