//! Binary-to-text codec and payload checksums.

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,
    #[error("payload too short: {actual} chars, minimum {minimum}")]
    TooShort { actual: usize, minimum: usize },
    #[error("invalid base64 character {ch:?} at offset {offset}")]
    InvalidCharacter { ch: char, offset: usize },
    #[error("decoded payload too large: {actual} bytes, limit {limit}")]
    TooLarge { actual: usize, limit: usize },
    #[error("base64 decode failed: {0}")]
    Decode(String),
}

fn is_line_break(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Upper bound of the decoded size of `encoded`.
pub fn estimated_decoded_len(encoded: &str) -> usize {
    let significant = encoded.chars().filter(|c| !is_line_break(*c)).count();
    significant * 3 / 4 + 2
}

/// Cheap shape check run before anything is decoded.
pub fn check_shape(encoded: &str, min_len: usize) -> Result<(), CodecError> {
    if encoded.is_empty() {
        return Err(CodecError::Empty);
    }
    if encoded.len() < min_len {
        return Err(CodecError::TooShort {
            actual: encoded.len(),
            minimum: min_len,
        });
    }
    for (offset, ch) in encoded.char_indices() {
        if !(ch.is_ascii_alphanumeric() || matches!(ch, '+' | '/' | '=') || is_line_break(ch)) {
            return Err(CodecError::InvalidCharacter { ch, offset });
        }
    }
    Ok(())
}

/// Decode standard base64, tolerating embedded line breaks.
pub fn decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
    let compact: String = encoded.chars().filter(|c| !is_line_break(*c)).collect();
    if compact.is_empty() {
        return Err(CodecError::Empty);
    }
    let decoded = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if decoded.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(decoded)
}

/// Decode with an upper bound on the output size, checked before decoding.
pub fn decode_bounded(encoded: &str, limit: usize) -> Result<Vec<u8>, CodecError> {
    let estimate = estimated_decoded_len(encoded);
    if estimate > limit + 2 {
        return Err(CodecError::TooLarge {
            actual: estimate,
            limit,
        });
    }
    decode(encoded)
}

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encode `image` as consecutive parts of at most `part_size` decoded bytes.
pub fn encode_parts(image: &[u8], part_size: usize) -> Vec<String> {
    image.chunks(part_size.max(1)).map(encode).collect()
}

/// Hex SHA-256 of `data`.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compare a hex digest case-insensitively against `data`.
pub fn checksum_matches(expected: &str, data: &[u8]) -> Result<(), (String, String)> {
    let actual = checksum_bytes(data);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err((expected.to_string(), actual))
    }
}
