//! Transfer states and the in-flight session record.

use std::fmt;

use crate::image::FirmwareHeader;
use crate::protocol::constants::PROGRESS_DONE;
use crate::sink::SinkHandle;

use super::sequence::SequenceTracker;

/// Lifecycle state of the update machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferState {
    #[default]
    Idle,
    Receiving,
    Decoding,
    Validating,
    Writing,
    Completing,
    Success,
    Error,
    Aborted,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Idle => write!(f, "IDLE"),
            TransferState::Receiving => write!(f, "RECEIVING"),
            TransferState::Decoding => write!(f, "DECODING"),
            TransferState::Validating => write!(f, "VALIDATING"),
            TransferState::Writing => write!(f, "WRITING"),
            TransferState::Completing => write!(f, "COMPLETING"),
            TransferState::Success => write!(f, "SUCCESS"),
            TransferState::Error => write!(f, "ERROR"),
            TransferState::Aborted => write!(f, "ABORTED"),
        }
    }
}

impl TransferState {
    /// Success, Error or Aborted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Success | TransferState::Error | TransferState::Aborted
        )
    }

    /// A start event is accepted only from these states.
    pub fn accepts_start(&self) -> bool {
        *self == TransferState::Idle || self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    None,
    SingleShot,
    Chunked,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::None => write!(f, "none"),
            TransferMode::SingleShot => write!(f, "single-shot"),
            TransferMode::Chunked => write!(f, "chunked"),
        }
    }
}

/// The single in-flight update.
#[derive(Debug)]
pub struct TransferSession {
    mode: TransferMode,
    version: String,
    started_at: u64,
    bytes_committed: usize,
    progress: u8,
    sequence: SequenceTracker,
    header: Option<FirmwareHeader>,
    sink: Option<SinkHandle>,
}

impl TransferSession {
    pub fn single_shot(version: impl Into<String>, now: u64) -> Self {
        Self::new(TransferMode::SingleShot, version.into(), 1, now)
    }

    pub fn chunked(version: impl Into<String>, total_parts: u32, now: u64) -> Self {
        Self::new(TransferMode::Chunked, version.into(), total_parts, now)
    }

    fn new(mode: TransferMode, version: String, parts: u32, now: u64) -> Self {
        Self {
            mode,
            version,
            started_at: now,
            bytes_committed: 0,
            progress: 0,
            sequence: SequenceTracker::new(parts),
            header: None,
            sink: None,
        }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.started_at)
    }

    pub fn bytes_committed(&self) -> usize {
        self.bytes_committed
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut SequenceTracker {
        &mut self.sequence
    }

    pub fn header(&self) -> Option<&FirmwareHeader> {
        self.header.as_ref()
    }

    pub fn set_header(&mut self, header: FirmwareHeader) {
        self.header = Some(header);
    }

    pub fn attach_sink(&mut self, handle: SinkHandle) {
        self.sink = Some(handle);
    }

    pub fn sink_handle(&self) -> Option<&SinkHandle> {
        self.sink.as_ref()
    }

    /// Hand the sink token back for finalize or abort.
    pub fn take_sink(&mut self) -> Option<SinkHandle> {
        self.sink.take()
    }

    pub fn commit_bytes(&mut self, n: usize) {
        self.bytes_committed += n;
    }

    /// Move progress forward. Returns the new value only if it advanced.
    pub fn advance_progress(&mut self, value: u8) -> Option<u8> {
        let value = value.min(PROGRESS_DONE);
        if value > self.progress {
            self.progress = value;
            Some(value)
        } else {
            None
        }
    }

    /// First report of a fresh session (progress is already zero).
    pub fn force_progress(&mut self, value: u8) -> u8 {
        self.progress = self.progress.max(value.min(PROGRESS_DONE));
        self.progress
    }
}
