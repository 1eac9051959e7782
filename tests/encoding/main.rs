use std::io;

use miniz_oxide::inflate::{decompress_to_vec, decompress_to_vec_zlib};
use streaming_png::{
    decode,
    zlib::{Deflator, Framing},
    ColorType, CompressionLevel, DecodeOptions, EncodeOptions, Encoder, Entry, Filter, FilterSet,
    Header, Image, Interlacing, Palette, PngError, Timestamp, Variant,
};

/// Splits an encoded file into (type, payload) pairs, skipping the signature.
fn chunks(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut rest = &bytes[8..];
    let mut chunks = Vec::new();
    while !rest.is_empty() {
        let length = u32::from_be_bytes(rest[..4].try_into().unwrap()) as usize;
        let kind = String::from_utf8(rest[4..8].to_vec()).unwrap();
        chunks.push((kind, rest[8..8 + length].to_vec()));
        rest = &rest[12 + length..];
    }
    chunks
}

fn image_data(bytes: &[u8]) -> Vec<u8> {
    chunks(bytes)
        .into_iter()
        .filter(|(kind, _)| kind == "IDAT")
        .flat_map(|(_, payload)| payload)
        .collect()
}

fn sample_image(
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: ColorType,
    interlace: Interlacing,
) -> Image {
    let header = Header::new(width, height, bit_depth, color_type, interlace).unwrap();
    let mask = match bit_depth {
        1 | 2 | 4 => (1u32 << bit_depth) - 1,
        _ => 0xff,
    };
    let pixels = (0..header.image_bytes().unwrap() as u32)
        .map(|i| ((i * 97 + i / 7) & mask) as u8)
        .collect();
    let palette = (color_type == ColorType::IndexedColor).then(|| {
        let colors = (0..1u32 << bit_depth)
            .map(|i| Entry(i as u8, (i * 3) as u8, 255 - i as u8))
            .collect();
        Palette::new(colors).unwrap()
    });
    Image::new(header, palette, pixels).unwrap()
}

fn every_format() -> impl Iterator<Item = (ColorType, u8)> {
    [
        ColorType::Greyscale,
        ColorType::Truecolor,
        ColorType::IndexedColor,
        ColorType::GreyscaleWithAlpha,
        ColorType::TruecolorWithAlpha,
    ]
    .into_iter()
    .flat_map(|color_type| {
        color_type
            .allowed_bit_depths()
            .iter()
            .map(move |&depth| (color_type, depth))
    })
}

#[test]
fn every_format_survives_a_round_trip_at_every_level() {
    for (color_type, bit_depth) in every_format() {
        for interlace in [Interlacing::None, Interlacing::Adam7] {
            let image = sample_image(7, 5, bit_depth, color_type, interlace);
            for level in CompressionLevel::all() {
                let encoder = Encoder::new(EncodeOptions::default().with_level(level));
                let bytes = encoder.encode_to_vec(&image).unwrap();
                let decoded = decode(&bytes, &DecodeOptions::default()).unwrap();
                assert_eq!(
                    decoded,
                    image,
                    "{color_type:?} at {bit_depth} bits, {interlace:?}, level {}",
                    level.get()
                );
            }
        }
    }
}

#[test]
fn every_level_produces_a_standard_zlib_stream() {
    let image = sample_image(23, 17, 8, ColorType::Truecolor, Interlacing::None);
    let mut sizes = Vec::new();
    for level in CompressionLevel::all() {
        let options = EncodeOptions::default().with_level(level).with_chunk_size(100);
        let bytes = Encoder::new(options).encode_to_vec(&image).unwrap();
        let filtered = decompress_to_vec_zlib(&image_data(&bytes)).unwrap();
        // One filter byte per row in front of the samples.
        assert_eq!(filtered.len(), 17 * (1 + 23 * 3), "level {}", level.get());
        assert_eq!(
            decode(&bytes, &DecodeOptions::default()).unwrap().pixels(),
            image.pixels()
        );
        sizes.push(bytes.len());
    }
    assert!(sizes[9] < sizes[0]);
}

#[test]
fn deflator_output_inflates_with_miniz() {
    let text: Vec<u8> = b"a streaming deflater, a streaming inflater, "
        .iter()
        .cycle()
        .take(70_000)
        .copied()
        .collect();
    for (framing, level) in [
        (Framing::Zlib, CompressionLevel::MIN),
        (Framing::Zlib, CompressionLevel::MAX),
        (Framing::Raw, CompressionLevel::default()),
    ] {
        let mut deflator = Deflator::new(level, framing);
        for piece in text.chunks(1000) {
            deflator.push(piece);
        }
        deflator.finish();
        let mut compressed = Vec::new();
        while deflator.available() > 0 {
            compressed.extend(deflator.pull(4096));
        }
        let inflated = match framing {
            Framing::Zlib => decompress_to_vec_zlib(&compressed),
            Framing::Raw => decompress_to_vec(&compressed),
        };
        assert_eq!(inflated.unwrap(), text, "{framing:?} at level {}", level.get());
    }
}

#[test]
fn restricted_filter_sets_are_honoured() {
    let image = sample_image(10, 6, 8, ColorType::Truecolor, Interlacing::None);
    let options = EncodeOptions::default().with_filters(FilterSet::only(Filter::Paeth));
    let bytes = Encoder::new(options).encode_to_vec(&image).unwrap();
    let filtered = decompress_to_vec_zlib(&image_data(&bytes)).unwrap();
    let filter_bytes: Vec<u8> = filtered.chunks(1 + 10 * 3).map(|row| row[0]).collect();
    assert_eq!(filter_bytes, [4; 6]);
}

#[test]
fn idat_chunks_respect_the_chunk_size() {
    let image = sample_image(32, 32, 8, ColorType::TruecolorWithAlpha, Interlacing::Adam7);
    let options = EncodeOptions::default()
        .with_level(CompressionLevel::MIN)
        .with_chunk_size(500);
    let bytes = Encoder::new(options).encode_to_vec(&image).unwrap();
    let sizes: Vec<usize> = chunks(&bytes)
        .into_iter()
        .filter(|(kind, _)| kind == "IDAT")
        .map(|(_, payload)| payload.len())
        .collect();
    assert!(sizes.len() > 5);
    assert!(sizes.iter().all(|&size| size <= 500));
}

#[test]
fn premultiplied_images_round_trip() {
    let image = sample_image(5, 3, 8, ColorType::TruecolorWithAlpha, Interlacing::None)
        .with_variant(Variant::Premultiplied);
    let bytes = Encoder::default().encode_to_vec(&image).unwrap();
    let all = chunks(&bytes);
    assert_eq!(all[0].0, "CgBI");
    // Raw DEFLATE, no zlib header.
    assert!(decompress_to_vec_zlib(&image_data(&bytes)).is_err());
    assert!(decompress_to_vec(&image_data(&bytes)).is_ok());
    assert_eq!(decode(&bytes, &DecodeOptions::default()).unwrap(), image);
}

#[test]
fn metadata_is_written_back() {
    let mut image = sample_image(4, 4, 4, ColorType::IndexedColor, Interlacing::None);
    image.metadata_mut().time = Some(Timestamp {
        year: 2000,
        month: 2,
        day: 29,
        hour: 12,
        minute: 0,
        second: 0,
    });
    let bytes = Encoder::default().encode_to_vec(&image).unwrap();
    let kinds: Vec<String> = chunks(&bytes).into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(kinds, ["IHDR", "PLTE", "IDAT", "tIME", "IEND"]);
    let decoded = decode(&bytes, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.metadata().time.map(|t| (t.month, t.day)), Some((2, 29)));
}

struct BrokenPipe;

impl io::Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn sink_failures_surface_as_io_errors() {
    let image = sample_image(2, 2, 8, ColorType::Greyscale, Interlacing::None);
    let error = Encoder::default()
        .encode(&image, &mut BrokenPipe)
        .unwrap_err();
    assert!(matches!(error, PngError::Io(ref inner) if inner.kind() == io::ErrorKind::BrokenPipe));
    insta::assert_snapshot!(error.to_string(), @"failed to write to sink: reader went away");
}
