//! Decoding byte sources into the UTF-8 the scanner consumes.
//!
//! YAML streams may be UTF-8, UTF-16LE/BE or UTF-32LE/BE. The encoding is
//! detected from a byte-order mark when present, and otherwise from the
//! pattern of null bytes in the first four bytes: the first character of a
//! YAML stream is ASCII, so the positions of the zero bytes identify the
//! encoding (YAML §5.2).

use std::io::Read;
use std::path::Path;

use encoding_rs::{Decoder, DecoderResult, Encoding};

use crate::error::DecodeError;

/// The encodings a YAML byte stream may use.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StreamEncoding {
    /// UTF-8, the default.
    Utf8,
    /// UTF-16, little endian.
    Utf16Le,
    /// UTF-16, big endian.
    Utf16Be,
    /// UTF-32, little endian.
    Utf32Le,
    /// UTF-32, big endian.
    Utf32Be,
}

/// Detect the stream encoding from its first bytes.
///
/// Returns the encoding and the length of the byte-order mark to skip, if
/// any. UTF-32 patterns are checked before UTF-16 ones: the UTF-32LE BOM
/// starts with the UTF-16LE BOM.
#[must_use]
pub fn detect_encoding(b: &[u8]) -> (StreamEncoding, usize) {
    match b {
        [0x00, 0x00, 0xFE, 0xFF, ..] => (StreamEncoding::Utf32Be, 4),
        [0xFF, 0xFE, 0x00, 0x00, ..] => (StreamEncoding::Utf32Le, 4),
        [0xEF, 0xBB, 0xBF, ..] => (StreamEncoding::Utf8, 3),
        [0xFE, 0xFF, ..] => (StreamEncoding::Utf16Be, 2),
        [0xFF, 0xFE, ..] => (StreamEncoding::Utf16Le, 2),
        [0x00, 0x00, 0x00, x, ..] if *x != 0 => (StreamEncoding::Utf32Be, 0),
        [x, 0x00, 0x00, 0x00, ..] if *x != 0 => (StreamEncoding::Utf32Le, 0),
        [0x00, x, ..] if *x != 0 => (StreamEncoding::Utf16Be, 0),
        [x, 0x00, ..] if *x != 0 => (StreamEncoding::Utf16Le, 0),
        _ => (StreamEncoding::Utf8, 0),
    }
}

/// Decode a whole byte buffer into UTF-8, auto-detecting the encoding.
///
/// # Errors
/// Returns [`DecodeError::Malformed`] on byte sequences invalid for the
/// detected encoding.
pub fn decode_bytes(input: &[u8]) -> Result<String, DecodeError> {
    let (encoding, bom_len) = detect_encoding(input);
    let body = &input[bom_len..];
    match encoding {
        StreamEncoding::Utf8 => decode_with(encoding_rs::UTF_8, body),
        StreamEncoding::Utf16Le => decode_with(encoding_rs::UTF_16LE, body),
        StreamEncoding::Utf16Be => decode_with(encoding_rs::UTF_16BE, body),
        StreamEncoding::Utf32Le => decode_utf32(body, u32::from_le_bytes),
        StreamEncoding::Utf32Be => decode_utf32(body, u32::from_be_bytes),
    }
}

/// Read a source to its end and decode it, auto-detecting the encoding.
///
/// # Errors
/// Returns [`DecodeError::Io`] if reading fails and [`DecodeError::Malformed`]
/// if the bytes are invalid for the detected encoding.
pub fn decode_reader(mut source: impl Read) -> Result<String, DecodeError> {
    let mut buffer = Vec::new();
    source.read_to_end(&mut buffer)?;
    decode_bytes(&buffer)
}

/// Open the file at `path`, read it and decode it.
///
/// # Errors
/// As [`decode_reader`].
pub fn read_file(path: impl AsRef<Path>) -> Result<String, DecodeError> {
    decode_reader(std::fs::File::open(path)?)
}

/// Run an `encoding_rs` decoder over the whole input, reallocating the output
/// as needed, and failing on the first malformed sequence.
fn decode_with(encoding: &'static Encoding, input: &[u8]) -> Result<String, DecodeError> {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut output = String::with_capacity(input.len() + 4);
    let mut total_read = 0;
    loop {
        match decode_step(&mut decoder, &input[total_read..], &mut output) {
            (DecoderResult::InputEmpty, _) => return Ok(output),
            (DecoderResult::OutputFull, read) => {
                total_read += read;
                // Expect some multi-byte expansion when transcoding to UTF-8.
                output.reserve(input.len() / 10 + 16);
            }
            (DecoderResult::Malformed(len, extra), read) => {
                total_read += read;
                let len = len as usize;
                let offset = total_read - (len + extra as usize);
                return Err(DecodeError::Malformed {
                    offset,
                    sequence: input[offset..offset + len].to_vec(),
                });
            }
        }
    }
}

fn decode_step(
    decoder: &mut Decoder,
    input: &[u8],
    output: &mut String,
) -> (DecoderResult, usize) {
    let (result, read) = decoder.decode_to_string_without_replacement(input, output, true);
    (result, read)
}

/// Decode UTF-32 by hand; `encoding_rs` does not cover it.
fn decode_utf32(input: &[u8], word: fn([u8; 4]) -> u32) -> Result<String, DecodeError> {
    if input.len() % 4 != 0 {
        let offset = input.len() & !3;
        return Err(DecodeError::Malformed {
            offset,
            sequence: input[offset..].to_vec(),
        });
    }
    let mut output = String::with_capacity(input.len() / 4 + 4);
    for (i, chunk) in input.chunks_exact(4).enumerate() {
        let value = word([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match char::from_u32(value) {
            Some(c) => output.push(c),
            None => {
                return Err(DecodeError::Malformed {
                    offset: i * 4,
                    sequence: chunk.to_vec(),
                })
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_from_bom() {
        assert_eq!(
            detect_encoding(b"\xef\xbb\xbfa: 1"),
            (StreamEncoding::Utf8, 3)
        );
        assert_eq!(detect_encoding(b"\xff\xfea\x00"), (StreamEncoding::Utf16Le, 2));
        assert_eq!(detect_encoding(b"\xfe\xff\x00a"), (StreamEncoding::Utf16Be, 2));
        assert_eq!(
            detect_encoding(b"\xff\xfe\x00\x00a\x00\x00\x00"),
            (StreamEncoding::Utf32Le, 4)
        );
        assert_eq!(
            detect_encoding(b"\x00\x00\xfe\xff\x00\x00\x00a"),
            (StreamEncoding::Utf32Be, 4)
        );
    }

    #[test]
    fn detects_from_null_pattern() {
        assert_eq!(detect_encoding(b"a\x00b\x00"), (StreamEncoding::Utf16Le, 0));
        assert_eq!(detect_encoding(b"\x00a\x00b"), (StreamEncoding::Utf16Be, 0));
        assert_eq!(
            detect_encoding(b"a\x00\x00\x00"),
            (StreamEncoding::Utf32Le, 0)
        );
        assert_eq!(
            detect_encoding(b"\x00\x00\x00a"),
            (StreamEncoding::Utf32Be, 0)
        );
        assert_eq!(detect_encoding(b"a: 1"), (StreamEncoding::Utf8, 0));
        assert_eq!(detect_encoding(b""), (StreamEncoding::Utf8, 0));
    }

    #[test]
    fn decodes_utf16le() {
        let s = b"\xff\xfea\x00:\x00 \x001\x00";
        assert_eq!(decode_bytes(s).unwrap(), "a: 1");
    }

    #[test]
    fn decodes_utf16be_without_bom() {
        let s = b"\x00a\x00:\x00 \x001";
        assert_eq!(decode_bytes(s).unwrap(), "a: 1");
    }

    #[test]
    fn decodes_utf32() {
        let mut bytes = Vec::new();
        for c in "k: v".chars() {
            bytes.extend_from_slice(&(c as u32).to_be_bytes());
        }
        assert_eq!(
            detect_encoding(&bytes),
            (StreamEncoding::Utf32Be, 0)
        );
        assert_eq!(decode_bytes(&bytes).unwrap(), "k: v");
    }

    #[test]
    fn rejects_malformed_utf8() {
        let err = decode_bytes(b"a\xa9b").unwrap_err();
        match err {
            DecodeError::Malformed { offset, sequence } => {
                assert_eq!(offset, 1);
                assert_eq!(sequence, vec![0xa9]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_utf32_surrogate() {
        let bytes = 0xD800u32.to_le_bytes().to_vec();
        let mut input = ('a' as u32).to_le_bytes().to_vec();
        input.extend_from_slice(&bytes);
        assert!(matches!(
            decode_bytes(&input),
            Err(DecodeError::Malformed { offset: 4, .. })
        ));
    }
}
