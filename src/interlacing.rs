use crate::{chunks::ihdr::Interlacing, utils::div_ceil};

/// One reduced image of an interlaced PNG, or the whole image when it isn't
/// interlaced.
///
/// Sample `k` of row `r` lands at `(x_offset + k * x_stride,
/// y_offset + r * y_stride)` in the full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubImage {
    /// Zero-based Adam7 pass; always 0 without interlacing.
    pub pass: usize,
    pub x_offset: usize,
    pub y_offset: usize,
    pub x_stride: usize,
    pub y_stride: usize,
    pub width: usize,
    pub height: usize,
}

impl SubImage {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            pass: 0,
            x_offset: 0,
            y_offset: 0,
            x_stride: 1,
            y_stride: 1,
            width,
            height,
        }
    }

    pub fn position(&self, k: usize, row: usize) -> (usize, usize) {
        (
            self.x_offset + k * self.x_stride,
            self.y_offset + row * self.y_stride,
        )
    }

    /// Indices into the full image, row by row, of every pixel this
    /// sub-image covers.
    pub fn pixel_indices(&self, image_width: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.height).flat_map(move |row| {
            (0..self.width).map(move |k| {
                let (x, y) = self.position(k, row);
                y * image_width + x
            })
        })
    }

    /// Width and height of the area one pixel of this pass stands in for
    /// until later passes fill it in.
    pub fn overdraw_block(&self) -> (usize, usize) {
        (
            self.x_stride >> (self.x_offset != 0) as usize,
            self.y_stride >> (self.y_offset != 0) as usize,
        )
    }
}

/// Iterates the non-empty Adam7 passes of an image.
pub struct Adam7Iter {
    current_pass: Option<usize>,
    width: usize,
    height: usize,
}

impl Adam7Iter {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            current_pass: Some(0),
            width,
            height,
        }
    }

    const STARTING_ROW: [usize; 7] = [0, 0, 4, 0, 2, 0, 1];
    const STARTING_COL: [usize; 7] = [0, 4, 0, 2, 0, 1, 0];
    const ROW_INCREMENT: [usize; 7] = [8, 8, 8, 4, 4, 2, 2];
    const COL_INCREMENT: [usize; 7] = [8, 8, 4, 4, 2, 2, 1];
}

impl Iterator for Adam7Iter {
    type Item = SubImage;
    fn next(&mut self) -> Option<Self::Item> {
        let mut pass = self.current_pass?;
        while pass < 7 {
            let pass_width = div_ceil(
                self.width.saturating_sub(Self::STARTING_COL[pass]),
                Self::COL_INCREMENT[pass],
            );
            let pass_height = div_ceil(
                self.height.saturating_sub(Self::STARTING_ROW[pass]),
                Self::ROW_INCREMENT[pass],
            );
            // Empty passes carry no scanlines at all.
            if pass_width == 0 || pass_height == 0 {
                pass += 1;
                continue;
            }
            self.current_pass = (pass < 6).then_some(pass + 1);
            return Some(SubImage {
                pass,
                x_offset: Self::STARTING_COL[pass],
                y_offset: Self::STARTING_ROW[pass],
                x_stride: Self::COL_INCREMENT[pass],
                y_stride: Self::ROW_INCREMENT[pass],
                width: pass_width,
                height: pass_height,
            });
        }
        self.current_pass = None;
        None
    }
}

pub fn adam7_passes(width: usize, height: usize) -> Adam7Iter {
    Adam7Iter::new(width, height)
}

/// The sub-images an image's scanlines are stored as, in stream order.
pub(crate) fn sub_images(width: usize, height: usize, interlacing: Interlacing) -> Vec<SubImage> {
    match interlacing {
        Interlacing::None => vec![SubImage::full(width, height)],
        Interlacing::Adam7 => adam7_passes(width, height).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{adam7_passes, sub_images, SubImage};
    use crate::chunks::ihdr::Interlacing;

    #[test]
    fn adam7iter_correctly_calculates_pass_dimensions() {
        let adam7 = adam7_passes(8, 8);
        let expected_dimensions = [(1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)];
        for (pass, expected) in adam7.zip(expected_dimensions) {
            assert_eq!((pass.width, pass.height), expected);
        }

        let adam7 = adam7_passes(9, 9);
        let expected_dimensions = [(2, 2), (1, 2), (3, 1), (2, 3), (5, 2), (4, 5), (9, 4)];
        for (pass, expected) in adam7.zip(expected_dimensions) {
            assert_eq!((pass.width, pass.height), expected);
        }

        let adam7 = adam7_passes(4, 4);
        let expected_dimensions = [(1, 1), (1, 1), (2, 1), (2, 2), (4, 2)];
        assert_eq!(adam7_passes(4, 4).count(), 5);
        for (pass, expected) in adam7.zip(expected_dimensions) {
            assert_eq!((pass.width, pass.height), expected);
        }

        let passes: Vec<_> = adam7_passes(1, 1).collect();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].pass, 0);
    }

    #[test]
    fn adam7iter_returns_iterator_over_pixel_indices() {
        let expected_indices: [&[usize]; 7] = [
            &[0],
            &[4],
            &[32, 36],
            &[2, 6, 34, 38],
            &[16, 18, 20, 22, 48, 50, 52, 54],
            &[1, 3, 5, 7, 17, 19, 21, 23, 33, 35, 37, 39, 49, 51, 53, 55],
            &[
                8, 9, 10, 11, 12, 13, 14, 15, 24, 25, 26, 27, 28, 29, 30, 31, 40, 41, 42, 43, 44,
                45, 46, 47, 56, 57, 58, 59, 60, 61, 62, 63,
            ],
        ];
        for (pass, expected) in adam7_passes(8, 8).zip(expected_indices) {
            assert_eq!(pass.pixel_indices(8).collect::<Vec<_>>(), expected);
        }

        let expected_lengths = [16, 16, 32, 64, 128, 256, 512];
        for (pass, expected) in adam7_passes(32, 32).zip(expected_lengths) {
            assert_eq!(pass.pixel_indices(32).count(), expected);
        }
    }

    #[test]
    fn passes_partition_every_image() {
        let sizes = (1..=17).flat_map(|w| (1..=17).map(move |h| (w, h)));
        for (width, height) in sizes.chain([(33, 1), (1, 40), (100, 3)]) {
            let mut seen = vec![0u8; width * height];
            for pass in adam7_passes(width, height) {
                for index in pass.pixel_indices(width) {
                    seen[index] += 1;
                }
            }
            assert!(seen.iter().all(|&count| count == 1), "{width}x{height}");
        }
    }

    #[test]
    fn pass_geometry() {
        let table = adam7_passes(9, 9)
            .map(|p| {
                format!(
                    "{}: {}x{} from ({}, {}) step ({}, {}) block {:?}",
                    p.pass + 1,
                    p.width,
                    p.height,
                    p.x_offset,
                    p.y_offset,
                    p.x_stride,
                    p.y_stride,
                    p.overdraw_block()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        insta::assert_snapshot!(table, @r###"
        1: 2x2 from (0, 0) step (8, 8) block (8, 8)
        2: 1x2 from (4, 0) step (8, 8) block (4, 8)
        3: 3x1 from (0, 4) step (4, 8) block (4, 4)
        4: 2x3 from (2, 0) step (4, 4) block (2, 4)
        5: 5x2 from (0, 2) step (2, 4) block (2, 2)
        6: 4x5 from (1, 0) step (2, 2) block (1, 2)
        7: 9x4 from (0, 1) step (1, 2) block (1, 1)
        "###);
    }

    #[test]
    fn non_interlaced_images_are_one_sub_image() {
        assert_eq!(sub_images(5, 3, Interlacing::None), vec![SubImage::full(5, 3)]);
        assert_eq!(SubImage::full(5, 3).position(4, 2), (4, 2));
        assert_eq!(sub_images(5, 3, Interlacing::Adam7).len(), 6);
    }
}
