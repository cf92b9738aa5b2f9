//! Error taxonomy for update transfers.
//!
//! Everything past "a session was admitted" is surfaced through the event
//! reporter using the `Display` text of [`OtaError`]. Parse-level failures
//! ([`OtaError::MalformedMessage`]) are only logged.

use std::fmt;

use thiserror::Error;

use crate::image::HeaderError;
use crate::sink::SinkError;

/// Fieldless classification of an [`OtaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedMessage,
    IncompleteData,
    ResourceExhausted,
    InvalidEncoding,
    ChecksumMismatch,
    SequenceViolation,
    ImageTooSmall,
    InvalidHeader,
    VerificationFailed,
    VersionRejected,
    SinkUnavailable,
    WriteFailure,
    FinalizeFailure,
    ActivationFailure,
    Timeout,
    AbortRequested,
    RemoteError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtaError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("incomplete update data: {0}")]
    IncompleteData(String),

    #[error("insufficient resources: {available} bytes available, {required} required")]
    ResourceExhausted { available: usize, required: usize },

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("chunk out of sequence: expected {expected}, received {received}")]
    SequenceViolation { expected: u32, received: u32 },

    #[error("firmware too small: {actual} bytes, minimum {minimum}")]
    ImageTooSmall { actual: usize, minimum: usize },

    #[error("invalid image header: {0}")]
    InvalidHeader(#[from] HeaderError),

    #[error("image verification failed: {0}")]
    VerificationFailed(String),

    #[error("version {0} rejected: already installed")]
    VersionRejected(String),

    #[error("could not begin update: {0}")]
    SinkUnavailable(SinkError),

    #[error("error writing firmware: {0}")]
    WriteFailure(SinkError),

    #[error("error finalizing firmware: {0}")]
    FinalizeFailure(SinkError),

    #[error("error setting boot image: {0}")]
    ActivationFailure(SinkError),

    #[error("update timeout after {elapsed_ms}ms (deadline {deadline_ms}ms)")]
    Timeout { elapsed_ms: u64, deadline_ms: u64 },

    #[error("update aborted")]
    AbortRequested,

    #[error("{0}")]
    RemoteError(String),
}

impl OtaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OtaError::MalformedMessage(_) => ErrorKind::MalformedMessage,
            OtaError::IncompleteData(_) => ErrorKind::IncompleteData,
            OtaError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            OtaError::InvalidEncoding(_) => ErrorKind::InvalidEncoding,
            OtaError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            OtaError::SequenceViolation { .. } => ErrorKind::SequenceViolation,
            OtaError::ImageTooSmall { .. } => ErrorKind::ImageTooSmall,
            OtaError::InvalidHeader(_) => ErrorKind::InvalidHeader,
            OtaError::VerificationFailed(_) => ErrorKind::VerificationFailed,
            OtaError::VersionRejected(_) => ErrorKind::VersionRejected,
            OtaError::SinkUnavailable(_) => ErrorKind::SinkUnavailable,
            OtaError::WriteFailure(_) => ErrorKind::WriteFailure,
            OtaError::FinalizeFailure(_) => ErrorKind::FinalizeFailure,
            OtaError::ActivationFailure(_) => ErrorKind::ActivationFailure,
            OtaError::Timeout { .. } => ErrorKind::Timeout,
            OtaError::AbortRequested => ErrorKind::AbortRequested,
            OtaError::RemoteError(_) => ErrorKind::RemoteError,
        }
    }

    /// Malformed traffic is dropped without a user-visible report.
    pub fn is_silent(&self) -> bool {
        matches!(self, OtaError::MalformedMessage(_))
    }
}
