use miniz_oxide::deflate::compress_to_vec_zlib;
use streaming_png::{
    chunks::SIGNATURE,
    decode, encode_chunk,
    error::{DecompressionError, FramingError, OrderingError},
    Assign, ByteSource, ChunkType, ColorType, CrcPolicy, DecodeOptions, Decoder, EncodeOptions, Encoder, Header,
    Image, Interlacing, PngError, Status, PNG,
};

fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
    let mut bytes = width.to_be_bytes().to_vec();
    bytes.extend(height.to_be_bytes());
    bytes.extend([bit_depth, color_type, 0, 0, interlace]);
    bytes
}

fn png(chunks: &[(ChunkType, &[u8])]) -> Vec<u8> {
    let mut bytes = SIGNATURE.to_vec();
    for (kind, payload) in chunks {
        bytes.extend(encode_chunk(*kind, payload));
    }
    bytes
}

/// A source that only hands out the bytes revealed so far.
struct Trickle<'a> {
    data: &'a [u8],
    visible: usize,
    position: usize,
}

impl<'a> Trickle<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            visible: 0,
            position: 0,
        }
    }

    fn reveal(&mut self, count: usize) {
        self.visible = (self.visible + count).min(self.data.len());
    }
}

impl ByteSource for Trickle<'_> {
    fn read(&mut self, count: usize) -> Option<Vec<u8>> {
        let end = self.position + count;
        if end > self.visible {
            return None;
        }
        let bytes = self.data[self.position..end].to_vec();
        self.position = end;
        Some(bytes)
    }
}

fn sample_image(width: u32, height: u32, interlace: Interlacing) -> Image {
    let header = Header::new(width, height, 8, ColorType::TruecolorWithAlpha, interlace).unwrap();
    let pixels = (0..width * height * 4)
        .map(|i| (i * 37 % 256) as u8 ^ (i / 64) as u8)
        .collect();
    Image::new(header, None, pixels).unwrap()
}

#[test]
fn decodes_a_stored_block_greyscale_pixel() {
    // Filter byte 0 and the sample 0x7f in one stored block, then adler-32.
    let idat = [
        0x78, 0x01, 0x01, 0x02, 0x00, 0xfd, 0xff, 0x00, 0x7f, 0x00, 0x81, 0x00, 0x80,
    ];
    let bytes = png(&[
        (ChunkType::IHDR, &ihdr(1, 1, 8, 0, 0)),
        (ChunkType::IDAT, &idat),
        (ChunkType::IEND, &[]),
    ]);
    let image = decode(&bytes, &DecodeOptions::default()).unwrap();
    assert_eq!(image.pixels(), [0x7f]);
    assert_eq!(image.header().color_type(), ColorType::Greyscale);
}

#[test]
fn interlaced_and_plain_encodings_decode_alike() {
    let plain = sample_image(8, 8, Interlacing::None);
    let interlaced = sample_image(8, 8, Interlacing::Adam7);
    let plain_bytes = Encoder::default().encode_to_vec(&plain).unwrap();
    let interlaced_bytes = Encoder::default().encode_to_vec(&interlaced).unwrap();
    assert_ne!(plain_bytes, interlaced_bytes);

    let options = DecodeOptions::default();
    let from_plain = decode(&plain_bytes, &options).unwrap();
    let from_interlaced = decode(&interlaced_bytes, &options).unwrap();
    assert_eq!(from_plain.pixels(), from_interlaced.pixels());
    assert_eq!(from_plain.pixels(), plain.pixels());
}

#[test]
fn resumes_after_running_dry() {
    let image = sample_image(19, 11, Interlacing::Adam7);
    let bytes = Encoder::default().encode_to_vec(&image).unwrap();
    let mut source = Trickle::new(&bytes);
    let mut decoder = Decoder::new(DecodeOptions::default());
    let mut pending = 0;
    let decoded = loop {
        source.reveal(7);
        match decoder.advance(&mut source, Assign::Exact).unwrap() {
            Status::Pending => pending += 1,
            Status::Complete(decoded) => break decoded,
        }
    };
    assert!(pending > bytes.len() / 7 / 2);
    assert_eq!(decoded, image);
}

#[test]
fn overdraw_previews_early_passes() {
    let value = |x: u32, y: u32| ((x * 73 + y * 151) ^ (x * y)) as u8;
    let header = Header::new(64, 64, 8, ColorType::Greyscale, Interlacing::Adam7).unwrap();
    let pixels = (0..64)
        .flat_map(|y| (0..64).map(move |x| value(x, y)))
        .collect();
    let image = Image::new(header, None, pixels).unwrap();
    // Small IDAT chunks so the passes arrive separately.
    let options = EncodeOptions::default().with_chunk_size(4);
    let stream = Encoder::new(options).encode_to_vec(&image).unwrap();
    // The bottom-right pixel shows (56, 56) once the first pass is in,
    // until the second pass overdraws it.
    let first_pass = value(56, 56);
    assert_ne!(first_pass, value(63, 63));

    for (assign, expect_preview) in [(Assign::Overdraw, true), (Assign::Exact, false)] {
        let mut decoder = Decoder::new(DecodeOptions::default());
        let mut source = Trickle::new(&stream);
        let mut previewed = false;
        let decoded = loop {
            source.reveal(16);
            match decoder.advance(&mut source, assign).unwrap() {
                Status::Pending => {
                    let corner = decoder.image().map(|partial| partial.pixels()[64 * 64 - 1]);
                    previewed |= corner == Some(first_pass);
                }
                Status::Complete(decoded) => break decoded,
            }
        };
        assert_eq!(previewed, expect_preview, "{assign:?}");
        assert_eq!(decoded, image);
    }
}

#[test]
fn idat_split_anywhere_decodes_the_same() {
    let rows: Vec<u8> = (0..4u8)
        .flat_map(|row| [1, row, row * 2, row * 3, 1, 1, 1])
        .collect();
    let compressed = compress_to_vec_zlib(&rows, 9);
    let header = ihdr(2, 4, 8, 2, 0);
    let expected = decode(
        &png(&[
            (ChunkType::IHDR, &header),
            (ChunkType::IDAT, &compressed),
            (ChunkType::IEND, &[]),
        ]),
        &DecodeOptions::default(),
    )
    .unwrap();
    assert_eq!(&expected.pixels()[..6], [0, 0, 0, 1, 1, 1]);

    for split in 0..=compressed.len() {
        let bytes = png(&[
            (ChunkType::IHDR, &header),
            (ChunkType::IDAT, &compressed[..split]),
            (ChunkType::IDAT, &compressed[split..]),
            (ChunkType::IEND, &[]),
        ]);
        let image = decode(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(image.pixels(), expected.pixels(), "split at {split}");
    }
}

#[test]
fn incomplete_streams_are_reported_at_iend() {
    let compressed = compress_to_vec_zlib(&[0, 1, 2, 3], 6);
    let bytes = png(&[
        (ChunkType::IHDR, &ihdr(3, 1, 8, 0, 0)),
        (ChunkType::IDAT, &compressed[..compressed.len() - 5]),
        (ChunkType::IEND, &[]),
    ]);
    let error = decode(&bytes, &DecodeOptions::default()).unwrap_err();
    assert!(matches!(
        error,
        PngError::Decompression(DecompressionError::IncompleteImageDataCompressedDatastream)
    ));
    insta::assert_snapshot!(error.to_string(), @"incomplete image data: compressed datastream did not terminate");
}

#[test]
fn ordering_violations_abort_the_decode() {
    let header = ihdr(1, 1, 8, 0, 0);
    let idat = compress_to_vec_zlib(&[0, 9], 6);
    let cases: [(&[(ChunkType, &[u8])], OrderingError); 4] = [
        (
            &[(ChunkType::IHDR, &header), (ChunkType::IHDR, &header)],
            OrderingError::DuplicateSingleton(ChunkType::IHDR),
        ),
        (
            &[(ChunkType::IDAT, &idat)],
            OrderingError::MissingRequired(ChunkType::IHDR),
        ),
        (
            &[(ChunkType::IHDR, &header), (ChunkType::PLTE, &[0, 0, 0])],
            OrderingError::ForbiddenChunk {
                chunk: ChunkType::PLTE,
                color_type: ColorType::Greyscale,
            },
        ),
        (
            &[
                (ChunkType::IHDR, &header),
                (ChunkType::IDAT, &idat),
                (ChunkType::gAMA, &[0, 0, 0xb1, 0x8f]),
            ],
            OrderingError::MisplacedChunk {
                chunk: ChunkType::gAMA,
                before: ChunkType::IDAT,
            },
        ),
    ];
    for (chunks, expected) in cases {
        match decode(&png(chunks), &DecodeOptions::default()) {
            Err(PngError::Ordering(error)) => assert_eq!(error, expected),
            other => panic!("expected {expected:?}, got {other:?}"),
        }
    }
}

#[test]
fn crc_policy_is_configurable() {
    let mut bytes = png(&[
        (ChunkType::IHDR, &ihdr(1, 1, 8, 0, 0)),
        (ChunkType::tEXt, b"Comment\0hi"),
        (ChunkType::IDAT, &compress_to_vec_zlib(&[0, 5], 6)),
        (ChunkType::IEND, &[]),
    ]);
    // Last byte of the tEXt chunk's CRC.
    let text_crc_end = SIGNATURE.len() + 25 + 12 + 10;
    bytes[text_crc_end - 1] ^= 1;

    assert!(matches!(
        decode(&bytes, &DecodeOptions::default()),
        Err(PngError::Framing(FramingError::CrcMismatch { chunk, .. })) if chunk == ChunkType::tEXt
    ));
    let lenient = DecodeOptions::default().with_crc(CrcPolicy::Lenient);
    assert_eq!(decode(&bytes, &lenient).unwrap().pixels(), [5]);
}

#[test]
fn keeps_metadata_for_reencoding() {
    let bytes = png(&[
        (ChunkType::IHDR, &ihdr(2, 1, 8, 0, 0)),
        (ChunkType::gAMA, &[0, 0, 0xb1, 0x8f]),
        (ChunkType::tRNS, &[0, 3]),
        (ChunkType::pHYs, &[0, 0, 0x0b, 0x13, 0, 0, 0x0b, 0x13, 1]),
        (ChunkType::IDAT, &compress_to_vec_zlib(&[0, 3, 4], 6)),
        (ChunkType::tIME, &[0x07, 0xe7, 12, 31, 23, 59, 60]),
        (ChunkType::iTXt, b"Title\0\0\0en\0Titel\0Hallo"),
        (ChunkType::IEND, &[]),
    ]);
    let png = PNG::decode(&bytes).unwrap();
    let image = png.image();
    let text = image.metadata().text().unwrap();
    assert_eq!(text[0].language.as_deref(), Some("en"));
    assert_eq!(text[0].text, "Hallo");
    assert_eq!(image.metadata().time.map(|t| t.second), Some(60));
    assert_eq!(
        image.metadata().physical.map(|p| p.x_axis_ppu),
        Some(2835)
    );
    let rgba = image.to_rgba8().unwrap();
    assert_eq!((rgba[0].alpha, rgba[1].alpha), (0, 255));

    let again = PNG::decode(&png.encode().unwrap()).unwrap();
    assert_eq!(again, png);
}
