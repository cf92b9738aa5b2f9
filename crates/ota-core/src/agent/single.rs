//! Single-shot transfers: the whole image arrives in one message and is
//! written out in `chunk_size` blocks.

use tracing::debug;

use super::{OtaAgent, invalid_encoding, verify_checksum};
use crate::codec;
use crate::error::OtaError;
use crate::protocol::SingleShotUpdate;
use crate::protocol::constants::*;
use crate::sink::{FirmwareSink, SinkError};
use crate::state::{TransferSession, TransferState};

impl<S: FirmwareSink> OtaAgent<S> {
    pub(super) fn handle_single_shot(&mut self, update: SingleShotUpdate, now: u64) {
        if self.is_update_in_progress() {
            debug!(version = %update.version, "Transfer in progress, start event dropped");
            return;
        }

        if let Err(e) = self.admit_single_shot(&update) {
            self.terminate(None, e, &update.version, now);
            return;
        }

        let mut session = TransferSession::single_shot(update.version.as_str(), now);
        self.open_session(&session, codec::estimated_decoded_len(&update.encoded), now);
        self.report_progress(&mut session, PROGRESS_ACCEPTED, now);

        match self.run_single_shot(&mut session, &update, now) {
            Ok(()) => self.succeed(session, now),
            Err(e) => self.terminate(Some(session), e, &update.version, now),
        }
    }

    fn admit_single_shot(&self, update: &SingleShotUpdate) -> Result<(), OtaError> {
        codec::check_shape(&update.encoded, self.config.min_encoded_len)
            .map_err(invalid_encoding)?;
        self.check_version(&update.version)?;
        self.admit(codec::estimated_decoded_len(&update.encoded))
    }

    fn run_single_shot(
        &mut self,
        session: &mut TransferSession,
        update: &SingleShotUpdate,
        now: u64,
    ) -> Result<(), OtaError> {
        self.goto_state(TransferState::Decoding);
        let image = codec::decode(&update.encoded).map_err(invalid_encoding)?;
        verify_checksum(update.checksum.as_deref(), &image)?;
        debug!(bytes = image.len(), "Payload decoded");

        self.goto_state(TransferState::Validating);
        self.validate_size(image.len())?;
        self.inspect_header(session, &image)?;

        self.goto_state(TransferState::Writing);
        if let Some(free) = self.sink.free_space().filter(|&free| free < image.len()) {
            return Err(OtaError::SinkUnavailable(SinkError::PartitionFull {
                needed: image.len(),
                capacity: free,
            }));
        }
        let handle = self.sink.begin().map_err(OtaError::SinkUnavailable)?;
        session.attach_sink(handle);
        self.report_progress(session, PROGRESS_WRITE_START, now);

        let total = image.len();
        let span = usize::from(PROGRESS_WRITE_END - PROGRESS_WRITE_START);
        for block in image.chunks(self.config.chunk_size) {
            self.commit(session, block)?;
            self.stats.record_bytes(block.len());
            let scaled = usize::from(PROGRESS_WRITE_START) + session.bytes_committed() * span / total;
            self.report_progress(session, scaled.min(usize::from(PROGRESS_WRITE_END)) as u8, now);
        }
        self.report_progress(session, PROGRESS_WRITE_END, now);

        self.complete_image(session)
    }
}
