//! Protocol and policy constants.
//!
//! Defaults match the values shipped in the device-side update SDK.

// ============================================================================
// Message Schema
// ============================================================================

/// `EventType` value carried by every update message.
pub const UPDATE_EVENT_TYPE: &str = "UpdateFirmwareDevice";

/// Default inbound update topic.
pub const DEFAULT_UPDATE_TOPIC: &str = "ota";
/// Default prefix for outbound report topics.
pub const DEFAULT_REPORT_PREFIX: &str = "ota";

pub const PROGRESS_TOPIC_SUFFIX: &str = "progress";
pub const ERROR_TOPIC_SUFFIX: &str = "error";
pub const SUCCESS_TOPIC_SUFFIX: &str = "success";

// ============================================================================
// Size Constants
// ============================================================================

/// Default write block size.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// Upper bound for the configurable write block size (64 KB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;
/// Largest decoded payload accepted from a single chunk message.
pub const MAX_CHUNK_DECODED: usize = 64 * 1024;
/// Minimum decoded image size; anything smaller is implausible.
pub const MIN_IMAGE_SIZE: usize = 1000;
/// Minimum encoded length for a single-shot payload.
pub const MIN_ENCODED_LEN: usize = 100;
/// Working memory kept in reserve when admitting a transfer.
pub const MIN_FREE_RESERVE: usize = 40_000;

// ============================================================================
// Timing / Retries
// ============================================================================

/// Transfer deadline: 7 minutes.
pub const DEFAULT_TIMEOUT_MS: u64 = 420_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ============================================================================
// Progress Checkpoints
// ============================================================================

pub const PROGRESS_ACCEPTED: u8 = 10;
pub const PROGRESS_WRITE_START: u8 = 25;
pub const PROGRESS_WRITE_END: u8 = 75;
pub const PROGRESS_DONE: u8 = 100;

/// Outward progress is published only on multiples of this step (or at 100).
pub const PROGRESS_PUBLISH_STEP: u8 = 10;

/// Clamp a requested write block size into the supported range.
pub fn clamp_chunk_size(requested: usize) -> usize {
    if requested > 0 && requested <= MAX_CHUNK_SIZE {
        requested
    } else {
        DEFAULT_CHUNK_SIZE
    }
}

/// Normalize a requested retry bound (zero falls back to the default).
pub fn normalize_max_retries(requested: u32) -> u32 {
    if requested > 0 {
        requested
    } else {
        DEFAULT_MAX_RETRIES
    }
}
