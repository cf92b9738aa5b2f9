//! Pluggable image verification.
//!
//! The session feeds every committed block through the active verifier and
//! asks for a verdict before the sink finalizes the image.

use sha2::{Digest, Sha256};

use super::header::FirmwareHeader;

pub trait ImageVerifier {
    /// A new image starts; `header` was parsed from its first bytes.
    fn begin(&mut self, _header: &FirmwareHeader) {}

    /// Bytes about to be committed, in order.
    fn update(&mut self, _data: &[u8]) {}

    /// Verdict for the complete image.
    fn finish(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// Verifier that accepts every image.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ImageVerifier for AcceptAll {}

/// Checks the whole image against an expected SHA-256 digest.
#[derive(Debug, Clone)]
pub struct Sha256Verifier {
    expected: String,
    hasher: Sha256,
}

impl Sha256Verifier {
    pub fn new(expected_hex: impl Into<String>) -> Self {
        Self {
            expected: expected_hex.into(),
            hasher: Sha256::new(),
        }
    }
}

impl ImageVerifier for Sha256Verifier {
    fn begin(&mut self, _header: &FirmwareHeader) {
        self.hasher = Sha256::new();
    }

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finish(&mut self) -> Result<(), String> {
        let actual = hex::encode(std::mem::take(&mut self.hasher).finalize());
        if actual.eq_ignore_ascii_case(&self.expected) {
            Ok(())
        } else {
            Err(format!("digest {} does not match {}", actual, self.expected))
        }
    }
}
