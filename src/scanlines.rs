use crate::{
    chunks::ihdr::Header,
    interlacing::{sub_images, SubImage},
};

/// How a decoded interlace-pass pixel is written into the image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    /// Only the pixel's own position.
    #[default]
    Exact,
    /// The pixel's position and the block of not-yet-decoded pixels it stands
    /// in for, for a progressive preview. Later passes overwrite the block.
    Overdraw,
}

/// Walks the (sub-image, row) pairs of an image in stream order.
#[derive(Debug, Clone)]
pub(crate) struct ScanlineCursor {
    sub_images: Vec<SubImage>,
    index: usize,
    row: usize,
}

impl ScanlineCursor {
    pub(crate) fn new(header: &Header) -> Self {
        Self {
            sub_images: sub_images(
                header.width() as usize,
                header.height() as usize,
                header.interlace_method(),
            ),
            index: 0,
            row: 0,
        }
    }

    pub(crate) fn current(&self) -> Option<(SubImage, usize)> {
        self.sub_images.get(self.index).map(|&sub| (sub, self.row))
    }

    pub(crate) fn advance(&mut self) {
        let Some(sub) = self.sub_images.get(self.index) else {
            return;
        };
        self.row += 1;
        if self.row == sub.height {
            self.index += 1;
            self.row = 0;
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.index >= self.sub_images.len()
    }

    /// Filtered bytes, filter bytes included, still to come for the rows
    /// not yet visited.
    pub(crate) fn remaining_bytes(&self, header: &Header) -> usize {
        let Some((current, row)) = self.current() else {
            return 0;
        };
        let later: usize = self.sub_images[self.index + 1..]
            .iter()
            .map(|sub| sub.height.saturating_mul(header.scanline_size(sub.width)))
            .fold(0, usize::saturating_add);
        (current.height - row)
            .saturating_mul(header.scanline_size(current.width))
            .saturating_add(later)
    }
}

/// Expands `width` packed sub-byte samples to one byte each, most
/// significant bits first. Rows of 8 or 16 bit samples are copied.
pub(crate) fn unpack_samples(packed: &[u8], width: usize, bit_depth: u8, out: &mut Vec<u8>) {
    out.clear();
    if bit_depth >= 8 {
        out.extend_from_slice(packed);
        return;
    }
    let depth = bit_depth as usize;
    let mask = (1u8 << bit_depth) - 1;
    out.extend((0..width).map(|k| {
        let bit = k * depth;
        let shift = 8 - depth - bit % 8;
        (packed[bit / 8] >> shift) & mask
    }));
}

/// Inverse of [`unpack_samples`]; the last byte is padded with zero bits.
pub(crate) fn pack_samples(samples: &[u8], bit_depth: u8, out: &mut Vec<u8>) {
    out.clear();
    if bit_depth >= 8 {
        out.extend_from_slice(samples);
        return;
    }
    let depth = bit_depth as usize;
    let per_byte = 8 / depth;
    out.extend(samples.chunks(per_byte).map(|group| {
        group.iter().enumerate().fold(0u8, |byte, (i, &sample)| {
            byte | sample << (8 - depth * (i + 1))
        })
    }));
}

/// Writes one unpacked row of `sub` into the image's pixel buffer.
pub(crate) fn place_row(
    pixels: &mut [u8],
    header: &Header,
    sub: &SubImage,
    row: usize,
    unpacked: &[u8],
    assign: Assign,
) {
    let width = header.width() as usize;
    let height = header.height() as usize;
    let bpp = header.bytes_per_pixel();
    let (block_width, block_height) = match assign {
        Assign::Exact => (1, 1),
        Assign::Overdraw => sub.overdraw_block(),
    };
    for (k, pixel) in unpacked.chunks_exact(bpp).enumerate() {
        let (x, y) = sub.position(k, row);
        for fill_y in y..(y + block_height).min(height) {
            let start = (fill_y * width + x) * bpp;
            let end = (fill_y * width + (x + block_width).min(width)) * bpp;
            for target in pixels[start..end].chunks_exact_mut(bpp) {
                target.copy_from_slice(pixel);
            }
        }
    }
}

/// Collects the pixels of one row of `sub` from the image buffer.
pub(crate) fn gather_row(
    pixels: &[u8],
    header: &Header,
    sub: &SubImage,
    row: usize,
    out: &mut Vec<u8>,
) {
    let width = header.width() as usize;
    let bpp = header.bytes_per_pixel();
    out.clear();
    for k in 0..sub.width {
        let (x, y) = sub.position(k, row);
        let start = (y * width + x) * bpp;
        out.extend_from_slice(&pixels[start..start + bpp]);
    }
}
