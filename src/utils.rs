pub(crate) const fn div_ceil(lhs: usize, rhs: usize) -> usize {
    let d = lhs / rhs;
    let r = lhs % rhs;
    if r > 0 && rhs > 0 {
        d + 1
    } else {
        d
    }
}

/// Bytes needed to hold `pixels` samples of `bits_per_pixel` bits each,
/// without the leading filter byte.
pub(crate) const fn packed_row_bytes(pixels: usize, bits_per_pixel: usize) -> usize {
    div_ceil(pixels * bits_per_pixel, 8)
}
