use crate::{
    chunks::{ihdr::ColorType, trns::Transparency},
    error::MetadataError,
    image::{Image, Variant},
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Pixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Pixel {
    pub fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    fn grey(value: u8, alpha: u8) -> Self {
        Self::new(value, value, value, alpha)
    }

    /// Undoes CgBI storage: blue and red swapped, color multiplied by alpha.
    fn premultiplied_bgra_to_rgba(self) -> Self {
        let unpremultiply = |channel: u8| match self.alpha {
            0 => 0,
            255 => channel,
            alpha => ((channel as u32 * 255 + alpha as u32 / 2) / alpha as u32).min(255) as u8,
        };
        Self::new(
            unpremultiply(self.blue),
            unpremultiply(self.green),
            unpremultiply(self.red),
            self.alpha,
        )
    }
}

impl Image {
    /// Every pixel as 8-bit RGBA, row by row.
    ///
    /// Palette entries and tRNS transparency are applied, samples are scaled
    /// to 8 bits and premultiplied images are converted back to straight
    /// alpha.
    pub fn to_rgba8(&self) -> Result<Vec<Pixel>, MetadataError> {
        let header = self.header();
        let bit_depth = header.bit_depth();
        let bpp = header.bytes_per_pixel();
        let sample_bytes = usize::max(bit_depth as usize / 8, 1);
        let transparency = self.transparency();

        // Raw samples, widened to u16, and the same scaled to 8 bits.
        let raw = |pixel: &[u8], channel: usize| -> u16 {
            let start = channel * sample_bytes;
            match sample_bytes {
                2 => u16::from_be_bytes([pixel[start], pixel[start + 1]]),
                _ => pixel[start] as u16,
            }
        };
        let scale = |value: u16| -> u8 {
            match bit_depth {
                16 => (value >> 8) as u8,
                8 => value as u8,
                depth => (value as u32 * 255 / ((1 << depth) - 1)) as u8,
            }
        };

        let convert = |pixel: &[u8]| -> Result<Pixel, MetadataError> {
            let pixel = match header.color_type() {
                ColorType::Greyscale => {
                    let value = raw(pixel, 0);
                    let alpha = match transparency {
                        Some(Transparency::Greyscale(key)) if *key == value => 0,
                        _ => 255,
                    };
                    Pixel::grey(scale(value), alpha)
                }
                ColorType::GreyscaleWithAlpha => {
                    Pixel::grey(scale(raw(pixel, 0)), scale(raw(pixel, 1)))
                }
                ColorType::Truecolor => {
                    let (r, g, b) = (raw(pixel, 0), raw(pixel, 1), raw(pixel, 2));
                    let alpha = match transparency {
                        Some(Transparency::Truecolor(kr, kg, kb)) if (*kr, *kg, *kb) == (r, g, b) => 0,
                        _ => 255,
                    };
                    Pixel::new(scale(r), scale(g), scale(b), alpha)
                }
                ColorType::TruecolorWithAlpha => Pixel::new(
                    scale(raw(pixel, 0)),
                    scale(raw(pixel, 1)),
                    scale(raw(pixel, 2)),
                    scale(raw(pixel, 3)),
                ),
                ColorType::IndexedColor => {
                    let index = pixel[0];
                    let entry = self
                        .palette()
                        .and_then(|palette| palette.get_color(index))
                        .ok_or(MetadataError::PaletteIndex(index))?;
                    let alpha = transparency.map_or(255, |t| t.palette_alpha(index));
                    Pixel::new(entry.0, entry.1, entry.2, alpha)
                }
            };
            Ok(pixel)
        };

        let premultiplied = self.variant() == Variant::Premultiplied
            && matches!(
                header.color_type(),
                ColorType::Truecolor | ColorType::TruecolorWithAlpha
            );
        self.pixels()
            .chunks_exact(bpp)
            .map(|pixel| -> Result<Pixel, MetadataError> {
                let converted = convert(pixel)?;
                Ok(if premultiplied {
                    converted.premultiplied_bgra_to_rgba()
                } else {
                    converted
                })
            })
            .collect()
    }
}
