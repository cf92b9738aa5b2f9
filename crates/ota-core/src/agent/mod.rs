//! Update agent - the host-owned context that drives one device's updates.
//!
//! The agent is split into submodules by concern:
//! - `dispatch`: inbound message classification and routing
//! - `single`: single-shot transfers
//! - `chunked`: chunked transfers
//! - `supervisor`: timeout, abort and cleanup
//!
//! Execution is cooperative: the host calls [`OtaAgent::handle`] for every
//! inbound message and [`OtaAgent::tick`] on every scheduling pass. Neither
//! is ever re-entered.

mod chunked;
mod dispatch;
mod single;
mod supervisor;

#[cfg(test)]
mod tests;

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::{OtaConfig, SameVersionPolicy};
use crate::device::DeviceInfo;
use crate::error::OtaError;
use crate::guard::{HeadroomProbe, ResourceGuard, UnlimitedHeadroom};
use crate::image::{AcceptAll, FirmwareHeader, ImageVerifier};
use crate::protocol::constants::*;
use crate::publish::{FnPublisher, PublishError, Publisher};
use crate::report::EventReporter;
use crate::sink::{FirmwareSink, SinkError};
use crate::state::{TransferSession, TransferState};
use crate::stats::OtaStatistics;

pub struct OtaAgent<S: FirmwareSink> {
    device: DeviceInfo,
    config: OtaConfig,
    sink: S,
    reporter: EventReporter,
    clock: Box<dyn Clock>,
    headroom: Box<dyn HeadroomProbe>,
    verifier: Box<dyn ImageVerifier>,
    guard: ResourceGuard,
    state: TransferState,
    /// Present only while a transfer is between messages.
    session: Option<TransferSession>,
    /// Last reported progress; survives the session for queries.
    progress: u8,
    abort_requested: bool,
    stats: OtaStatistics,
}

impl<S: FirmwareSink> OtaAgent<S> {
    pub fn new(device: DeviceInfo, config: OtaConfig, sink: S) -> Self {
        let config = config.normalized();
        let mut reporter = EventReporter::new(device.id(), device.version());
        reporter.set_prefix(config.report_prefix.clone());
        info!(device = %device, chunked = config.chunked, "Update agent initialized");
        Self {
            guard: ResourceGuard::new(config.min_free_reserve),
            device,
            config,
            sink,
            reporter,
            clock: Box::new(SystemClock::new()),
            headroom: Box::new(UnlimitedHeadroom),
            verifier: Box::new(AcceptAll),
            state: TransferState::Idle,
            session: None,
            progress: 0,
            abort_requested: false,
            stats: OtaStatistics::default(),
        }
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub fn set_publisher(&mut self, publisher: impl Publisher + 'static) {
        self.reporter.set_publisher(Box::new(publisher));
    }

    /// Wire the messaging client: publish function, connectivity check and
    /// the topic update envelopes arrive on.
    pub fn set_transport<P, C>(&mut self, publish: P, connected: C, update_topic: impl Into<String>)
    where
        P: FnMut(&str, &str) -> Result<(), PublishError> + 'static,
        C: Fn() -> bool + 'static,
    {
        self.set_publisher(FnPublisher::new(publish, connected));
        self.set_update_topic(update_topic);
    }

    pub fn set_update_topic(&mut self, topic: impl Into<String>) {
        self.config.update_topic = topic.into();
    }

    pub fn set_report_prefix(&mut self, prefix: impl Into<String>) {
        self.config.report_prefix = prefix.into();
        self.reporter.set_prefix(self.config.report_prefix.clone());
    }

    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn set_headroom(&mut self, probe: impl HeadroomProbe + 'static) {
        self.headroom = Box::new(probe);
    }

    pub fn set_verifier(&mut self, verifier: impl ImageVerifier + 'static) {
        self.verifier = Box::new(verifier);
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn on_progress<F: FnMut(u8, &str) + 'static>(&mut self, observer: F) {
        self.reporter.observers_mut().set_progress(Box::new(observer));
    }

    pub fn on_error<F: FnMut(&str, &str) + 'static>(&mut self, observer: F) {
        self.reporter.observers_mut().set_error(Box::new(observer));
    }

    pub fn on_success<F: FnMut(&str) + 'static>(&mut self, observer: F) {
        self.reporter.observers_mut().set_success(Box::new(observer));
    }

    pub fn on_state_change<F: FnMut(TransferState) + 'static>(&mut self, observer: F) {
        self.reporter.observers_mut().set_state(Box::new(observer));
    }

    /// Called after a successful update when `auto_reset` is set.
    pub fn on_restart<F: FnMut() + 'static>(&mut self, hook: F) {
        self.reporter.observers_mut().set_restart(Box::new(hook));
    }

    // ------------------------------------------------------------------
    // Runtime configuration
    // ------------------------------------------------------------------

    pub fn enable_chunked(&mut self, enabled: bool) {
        self.config.chunked = enabled;
    }

    /// Write block size; out-of-range values fall back to the default.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.config.chunk_size = clamp_chunk_size(size);
    }

    pub fn set_timeout(&mut self, timeout_ms: u64) {
        self.config.timeout_ms = timeout_ms;
    }

    pub fn set_max_retries(&mut self, retries: u32) {
        self.config.max_retries = normalize_max_retries(retries);
    }

    pub fn set_same_version_policy(&mut self, policy: SameVersionPolicy) {
        self.config.same_version_policy = policy;
    }

    pub fn set_auto_reset(&mut self, enabled: bool) {
        self.config.auto_reset = enabled;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// True from an accepted start event until the next terminal state.
    pub fn is_update_in_progress(&self) -> bool {
        !self.state.accepts_start()
    }

    pub fn device_id(&self) -> &str {
        self.device.id()
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn current_version(&self) -> &str {
        self.device.version()
    }

    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    pub fn statistics(&self) -> &OtaStatistics {
        &self.stats
    }

    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ------------------------------------------------------------------
    // Shared transitions
    // ------------------------------------------------------------------

    fn goto_state(&mut self, to: TransferState) {
        info!(from = %self.state, to = %to, "State transition");
        self.state = to;
        self.stats.record_state(to);
        self.reporter.observers_mut().state_changed(to);
    }

    /// Register a freshly admitted session and enter `Receiving`.
    fn open_session(&mut self, session: &TransferSession, expected_bytes: usize, now: u64) {
        info!(
            version = %session.version(),
            mode = %session.mode(),
            "Transfer started"
        );
        self.progress = 0;
        self.stats.begin(now, expected_bytes);
        self.goto_state(TransferState::Receiving);
    }

    fn report_progress(&mut self, session: &mut TransferSession, value: u8, now: u64) {
        if let Some(progress) = session.advance_progress(value) {
            self.progress = progress;
            self.reporter.progress(progress, session.version(), now);
        }
    }

    /// Tear down `session` (if any), enter `Error` or `Aborted`, and report.
    ///
    /// The report carries the torn-down session's version; `version` is used
    /// only when no session was active.
    fn terminate(
        &mut self,
        session: Option<TransferSession>,
        error: OtaError,
        version: &str,
        now: u64,
    ) {
        let version = match session {
            Some(mut session) => {
                if let Some(handle) = session.take_sink() {
                    self.sink.abort(handle);
                }
                session.version().to_string()
            }
            None => version.to_string(),
        };

        let message = error.to_string();
        let to = match error {
            OtaError::AbortRequested => TransferState::Aborted,
            _ => TransferState::Error,
        };
        self.session = None;
        self.goto_state(to);
        self.stats.record_error(&message);
        self.stats.finish(now);
        error!(kind = %error.kind(), "Transfer failed");
        self.reporter.error(&message, &version, now);
    }

    fn succeed(&mut self, mut session: TransferSession, now: u64) {
        let final_step = session.advance_progress(PROGRESS_DONE);
        self.progress = session.progress();
        self.session = None;
        self.goto_state(TransferState::Success);
        self.stats.finish(now);
        info!(
            version = %session.version(),
            bytes = session.bytes_committed(),
            elapsed_ms = session.elapsed(now),
            "Firmware update complete"
        );
        if final_step.is_some() {
            self.reporter.progress(PROGRESS_DONE, session.version(), now);
        }
        self.reporter.success(session.version(), now);

        if self.config.auto_reset && !self.reporter.observers_mut().restart() {
            warn!("Restart requested but no restart hook is registered");
        }
    }

    // ------------------------------------------------------------------
    // Shared checks
    // ------------------------------------------------------------------

    fn check_version(&self, version: &str) -> Result<(), OtaError> {
        if self.config.same_version_policy == SameVersionPolicy::Reject
            && version == self.device.version()
        {
            return Err(OtaError::VersionRejected(version.to_string()));
        }
        Ok(())
    }

    fn admit(&self, required: usize) -> Result<(), OtaError> {
        self.guard
            .check(self.headroom.as_ref(), required)
            .map_err(|r| OtaError::ResourceExhausted {
                available: r.available,
                required: r.required,
            })
    }

    fn validate_size(&self, size: usize) -> Result<(), OtaError> {
        if size < self.config.min_image_size {
            return Err(OtaError::ImageTooSmall {
                actual: size,
                minimum: self.config.min_image_size,
            });
        }
        Ok(())
    }

    /// Header check on the first decoded bytes of an image.
    fn inspect_header(&mut self, session: &mut TransferSession, data: &[u8]) -> Result<(), OtaError> {
        let header = FirmwareHeader::parse(data)?;
        info!(
            project = %header.project_name,
            image_version = %header.version,
            segments = header.segment_count,
            "Image header accepted"
        );
        self.verifier.begin(&header);
        session.set_header(header);
        Ok(())
    }

    /// Hand one block to the verifier and the sink.
    fn commit(&mut self, session: &mut TransferSession, block: &[u8]) -> Result<(), OtaError> {
        let handle = session
            .sink_handle()
            .ok_or(OtaError::WriteFailure(SinkError::NoPartition))?;
        self.verifier.update(block);
        self.sink.write(handle, block).map_err(OtaError::WriteFailure)?;
        session.commit_bytes(block.len());
        Ok(())
    }

    /// Verify, finalize and activate the committed image.
    fn complete_image(&mut self, session: &mut TransferSession) -> Result<(), OtaError> {
        self.goto_state(TransferState::Completing);
        self.verifier.finish().map_err(OtaError::VerificationFailed)?;

        let handle = session
            .take_sink()
            .ok_or(OtaError::FinalizeFailure(SinkError::NoPartition))?;
        let staged = self.sink.finalize(handle).map_err(OtaError::FinalizeFailure)?;
        debug!(size = staged.size, "Image finalized");
        self.sink.activate(staged).map_err(OtaError::ActivationFailure)?;
        Ok(())
    }
}

fn verify_checksum(expected: Option<&str>, data: &[u8]) -> Result<(), OtaError> {
    match expected {
        Some(expected) => codec::checksum_matches(expected, data)
            .map_err(|(expected, actual)| OtaError::ChecksumMismatch { expected, actual }),
        None => Ok(()),
    }
}

fn invalid_encoding(e: codec::CodecError) -> OtaError {
    OtaError::InvalidEncoding(e.to_string())
}
