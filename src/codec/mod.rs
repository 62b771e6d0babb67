//! Transport codec: gzip compression plus a text-safe base64 encoding for
//! JSON transport.
//!
//! Encoding walks the input in chunks whose length is a multiple of three,
//! so each chunk encodes without padding and the concatenation is itself
//! valid base64.

use anyhow::{Context, Result};
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Chunk size for transport encoding; a multiple of 3 keeps chunk
/// boundaries padding-free.
const ENCODE_CHUNK: usize = 3 * 16 * 1024;

/// Gzip-compress document text.
pub fn compress(text: &str) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(3));
    encoder
        .write_all(text.as_bytes())
        .context("failed to compress document")?;
    encoder.finish().context("failed to finish compression")
}

/// Reverse [`compress`]. A malformed stream is a request-level error for
/// the caller to surface, never a panic.
pub fn decompress(bytes: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .context("failed to decompress document")?;
    Ok(out)
}

/// Encode compressed bytes for JSON transport.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    let capacity = base64::encoded_len(bytes.len(), true).unwrap_or(0);
    let mut out = String::with_capacity(capacity);
    for chunk in bytes.chunks(ENCODE_CHUNK) {
        base64::engine::general_purpose::STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Reverse [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .context("invalid transport encoding")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_text() {
        let text = "<html><body>hello</body></html>";
        let restored = decompress(&compress(text).unwrap()).unwrap();
        assert_eq!(restored, text);
    }

    #[test]
    fn empty_input_round_trips() {
        let restored = decompress(&compress("").unwrap()).unwrap();
        assert_eq!(restored, "");
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn chunked_encoding_matches_single_shot() {
        // Spans several chunk boundaries plus a ragged tail.
        let bytes: Vec<u8> = (0..ENCODE_CHUNK * 2 + 17).map(|i| (i % 251) as u8).collect();
        let chunked = encode(&bytes);
        let single = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert_eq!(chunked, single);
        assert_eq!(decode(&chunked).unwrap(), bytes);
    }

    #[test]
    fn garbage_input_is_an_error_not_a_panic() {
        assert!(decompress(b"not gzip at all").is_err());
        assert!(decode("!!! not base64 !!!").is_err());
    }
}
