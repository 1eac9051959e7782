use nom::{
    bytes::complete::{tag, take_till},
    number::complete::u8,
    sequence::{terminated, tuple},
    IResult,
};

use super::ChunkType;
use crate::{
    error::{DecompressionError, MetadataError},
    zlib,
};

/// Largest size compressed text may expand to.
pub(crate) const MAX_INFLATED_TEXT: usize = 1 << 24;

/// A decoded tEXt, zTXt or iTXt entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub keyword: String,
    /// Language tag, iTXt only.
    pub language: Option<String>,
    /// Keyword translated into `language`, iTXt only.
    pub translated_keyword: Option<String>,
    pub text: String,
    pub compressed: bool,
}

/// Checks the structure every text chunk shares without decompressing it.
pub(crate) fn validate(kind: ChunkType, chunk_data: &[u8]) -> Result<(), MetadataError> {
    let (rest, keyword) = null_terminated(chunk_data)
        .map_err(|_| MetadataError::malformed(kind, "keyword isn't null-terminated"))?;
    check_keyword(kind, keyword)?;
    match kind {
        ChunkType::zTXt => match rest.first() {
            Some(0) => Ok(()),
            _ => Err(MetadataError::malformed(kind, "unknown compression method")),
        },
        ChunkType::iTXt => match rest {
            [0 | 1, 0, ..] => Ok(()),
            _ => Err(MetadataError::malformed(kind, "bad compression fields")),
        },
        _ => Ok(()),
    }
}

pub(crate) fn parse(kind: ChunkType, chunk_data: &[u8]) -> Result<TextEntry, MetadataError> {
    validate(kind, chunk_data)?;
    let malformed = |reason| MetadataError::malformed(kind, reason);
    let (rest, keyword) = null_terminated(chunk_data).map_err(|_| malformed("missing keyword"))?;
    let keyword = latin1(keyword);
    match kind {
        ChunkType::tEXt => Ok(TextEntry {
            keyword,
            language: None,
            translated_keyword: None,
            text: latin1(rest),
            compressed: false,
        }),
        ChunkType::zTXt => {
            let text = inflate(&rest[1..]).map_err(malformed)?;
            Ok(TextEntry {
                keyword,
                language: None,
                translated_keyword: None,
                text: latin1(&text),
                compressed: true,
            })
        }
        ChunkType::iTXt => {
            let (rest, (flag, _method, language, translated)) = international_fields(rest)
                .map_err(|_| malformed("missing language or translated keyword"))?;
            let text = if flag == 1 {
                inflate(rest).map_err(malformed)?
            } else {
                rest.to_vec()
            };
            let utf8 = |bytes: &[u8]| {
                String::from_utf8(bytes.to_vec()).map_err(|_| malformed("text isn't UTF-8"))
            };
            Ok(TextEntry {
                keyword,
                language: Some(latin1(language)),
                translated_keyword: Some(utf8(translated)?),
                text: utf8(&text)?,
                compressed: flag == 1,
            })
        }
        _ => Err(malformed("not a text chunk")),
    }
}

fn check_keyword(kind: ChunkType, keyword: &[u8]) -> Result<(), MetadataError> {
    if keyword.is_empty() || keyword.len() > 79 {
        return Err(MetadataError::malformed(kind, "keyword must be 1-79 bytes"));
    }
    let printable = |b: &u8| matches!(b, 32..=126 | 161..=255);
    if !keyword.iter().all(printable) || keyword.starts_with(b" ") || keyword.ends_with(b" ") {
        return Err(MetadataError::malformed(kind, "keyword has invalid characters"));
    }
    Ok(())
}

fn inflate(compressed: &[u8]) -> Result<Vec<u8>, &'static str> {
    match zlib::inflate_limited(compressed, MAX_INFLATED_TEXT) {
        Ok(text) => Ok(text),
        Err(DecompressionError::OutputLimit(_)) => Err("compressed text expands too far"),
        Err(_) => Err("compressed text doesn't inflate"),
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn null_terminated(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_till(|b| b == 0), tag(&[0u8][..]))(input)
}

fn international_fields(input: &[u8]) -> IResult<&[u8], (u8, u8, &[u8], &[u8])> {
    tuple((u8, u8, null_terminated, null_terminated))(input)
}

#[cfg(test)]
mod tests {
    use super::{parse, validate, MAX_INFLATED_TEXT};
    use crate::{chunks::ChunkType, error::MetadataError};

    #[test]
    fn validates_keywords() {
        assert!(validate(ChunkType::tEXt, b"Title\0Hello").is_ok());
        assert!(validate(ChunkType::tEXt, b"\0Hello").is_err());
        assert!(validate(ChunkType::tEXt, b"No separator").is_err());
        assert!(validate(ChunkType::tEXt, b" Title\0x").is_err());
        let mut long = vec![b'k'; 80];
        long.push(0);
        assert!(validate(ChunkType::tEXt, &long).is_err());
    }

    #[test]
    fn decodes_plain_text_as_latin1() {
        let entry = parse(ChunkType::tEXt, b"Author\0Ren\xe9").unwrap();
        assert_eq!(entry.keyword, "Author");
        assert_eq!(entry.text, "René");
    }

    #[test]
    fn inflates_compressed_text() {
        let mut data = b"Comment\0\0".to_vec();
        data.extend(miniz_oxide::deflate::compress_to_vec_zlib(b"squeezed", 6));
        let entry = parse(ChunkType::zTXt, &data).unwrap();
        assert_eq!(entry.text, "squeezed");
        assert!(entry.compressed);
    }

    #[test]
    fn caps_how_far_text_may_expand() {
        let mut data = b"Comment\0\0".to_vec();
        let zeros = vec![0u8; MAX_INFLATED_TEXT + 1];
        data.extend(miniz_oxide::deflate::compress_to_vec_zlib(&zeros, 9));
        assert_eq!(
            parse(ChunkType::zTXt, &data),
            Err(MetadataError::malformed(
                ChunkType::zTXt,
                "compressed text expands too far"
            ))
        );
    }

    #[test]
    fn reads_international_fields() {
        let entry = parse(ChunkType::iTXt, "Title\0\0\0fr\0Titre\0Café".as_bytes()).unwrap();
        assert_eq!(entry.language.as_deref(), Some("fr"));
        assert_eq!(entry.translated_keyword.as_deref(), Some("Titre"));
        assert_eq!(entry.text, "Café");
        assert!(validate(ChunkType::iTXt, b"Title\0\x02\0\0\0").is_err());
    }
}
