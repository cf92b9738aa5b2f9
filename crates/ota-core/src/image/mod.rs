//! Firmware image inspection and verification hooks.

pub mod header;
pub mod verify;

pub use header::{FirmwareHeader, HeaderError};
pub use verify::{AcceptAll, ImageVerifier, Sha256Verifier};
