//! Timeout supervision, cooperative abort and terminal-state cleanup.

use tracing::{debug, info, instrument};

use super::OtaAgent;
use crate::error::OtaError;
use crate::sink::FirmwareSink;
use crate::state::TransferState;

impl<S: FirmwareSink> OtaAgent<S> {
    /// Periodic pass. Runs pending aborts and the deadline check even when
    /// no message arrived.
    #[instrument(level = "debug", skip(self))]
    pub fn tick(&mut self, now: u64) {
        self.service_abort(now);
        self.supervise(now);
    }

    /// [`tick`](Self::tick) with the agent's own clock.
    pub fn poll(&mut self) {
        let now = self.clock.now_millis();
        self.tick(now);
    }

    /// Ask for the active transfer to stop. Takes effect at the next
    /// `handle` or `tick`.
    pub fn request_abort(&mut self) {
        info!("Abort requested");
        self.abort_requested = true;
    }

    /// Return a terminal state machine to `Idle`. Returns false (and does
    /// nothing) while a transfer is active or nothing has run yet.
    pub fn cleanup(&mut self) -> bool {
        if !self.state.is_terminal() {
            return false;
        }
        self.goto_state(TransferState::Idle);
        self.progress = 0;
        true
    }

    pub(super) fn service_abort(&mut self, now: u64) {
        if !self.abort_requested {
            return;
        }
        self.abort_requested = false;
        match self.session.take() {
            Some(session) => self.terminate(Some(session), OtaError::AbortRequested, "", now),
            None => debug!("Abort requested with no active transfer"),
        }
    }

    pub(super) fn supervise(&mut self, now: u64) {
        let elapsed = match self.session.as_ref() {
            Some(session) => session.elapsed(now),
            None => return,
        };
        if elapsed <= self.config.timeout_ms {
            return;
        }
        let session = self.session.take();
        let error = OtaError::Timeout {
            elapsed_ms: elapsed,
            deadline_ms: self.config.timeout_ms,
        };
        self.terminate(session, error, "", now);
    }
}
