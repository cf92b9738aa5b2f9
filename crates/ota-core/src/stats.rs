//! Transfer statistics.

use crate::state::TransferState;

/// Counters for the current (or most recent) transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OtaStatistics {
    pub start_ms: u64,
    pub end_ms: u64,
    /// Expected image size, when known up front.
    pub total_bytes: usize,
    pub received_bytes: usize,
    pub chunk_count: u32,
    pub error_count: u32,
    pub last_state: TransferState,
    pub last_error: Option<String>,
}

impl OtaStatistics {
    /// Reset for a new transfer. The error counter survives across transfers.
    pub fn begin(&mut self, now: u64, total_bytes: usize) {
        *self = Self {
            start_ms: now,
            total_bytes,
            error_count: self.error_count,
            last_state: TransferState::Receiving,
            ..Default::default()
        };
    }

    pub fn record_chunk(&mut self, bytes: usize) {
        self.chunk_count += 1;
        self.received_bytes += bytes;
    }

    pub fn record_bytes(&mut self, bytes: usize) {
        self.received_bytes += bytes;
    }

    pub fn record_state(&mut self, state: TransferState) {
        self.last_state = state;
    }

    pub fn record_error(&mut self, message: &str) {
        self.error_count += 1;
        self.last_error = Some(message.to_string());
    }

    pub fn finish(&mut self, now: u64) {
        self.end_ms = now;
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Bytes per second over the finished transfer, 0 if unknown.
    pub fn average_speed(&self) -> f64 {
        match self.duration_ms() {
            0 => 0.0,
            ms => self.received_bytes as f64 * 1000.0 / ms as f64,
        }
    }
}
