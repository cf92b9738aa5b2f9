//! Storage sink abstraction.
//!
//! Defines the `FirmwareSink` trait for the destination of decoded image
//! bytes, allowing different implementations (file, in-memory, flash).
//!
//! A [`SinkHandle`] is a move-only token: [`FirmwareSink::finalize`] and
//! [`FirmwareSink::abort`] consume it, so a handle is released exactly once.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("no update partition available")]
    NoPartition,

    #[error("an image write is already open")]
    Busy,

    #[error("stale handle {0}")]
    StaleHandle(u32),

    #[error("partition full: {needed} bytes needed, {capacity} available")]
    PartitionFull { needed: usize, capacity: usize },

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("image validation failed: {0}")]
    ValidationFailed(String),

    #[error("activation failed: {0}")]
    ActivationFailed(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e.to_string())
    }
}

/// Exclusive ownership token for an open image write.
#[derive(Debug, PartialEq, Eq)]
pub struct SinkHandle(u32);

impl SinkHandle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// A finalized image waiting to be marked bootable.
#[derive(Debug, PartialEq, Eq)]
pub struct StagedImage {
    pub id: u32,
    pub size: usize,
}

/// Destination for decoded firmware bytes.
///
/// Calls are synchronous; the caller never interleaves two open handles.
pub trait FirmwareSink {
    /// Open a new image write.
    fn begin(&mut self) -> Result<SinkHandle, SinkError>;

    /// Append bytes to the open image.
    fn write(&mut self, handle: &SinkHandle, data: &[u8]) -> Result<(), SinkError>;

    /// Close and validate the image. On error the sink has already
    /// released everything tied to `handle`.
    fn finalize(&mut self, handle: SinkHandle) -> Result<StagedImage, SinkError>;

    /// Mark a finalized image as the next boot image.
    fn activate(&mut self, image: StagedImage) -> Result<(), SinkError>;

    /// Discard the open image.
    fn abort(&mut self, handle: SinkHandle);

    /// Free space in the update destination, if known.
    fn free_space(&self) -> Option<usize> {
        None
    }
}
