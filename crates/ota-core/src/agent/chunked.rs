//! Chunked transfers: the image arrives as parts `1..=total`, each decoded
//! and committed as it is accepted.

use tracing::{debug, warn};

use super::{OtaAgent, invalid_encoding, verify_checksum};
use crate::codec;
use crate::error::OtaError;
use crate::protocol::ChunkPart;
use crate::sink::FirmwareSink;
use crate::state::{SequenceCheck, TransferSession, TransferState};

impl<S: FirmwareSink> OtaAgent<S> {
    pub(super) fn handle_chunk(&mut self, part: ChunkPart, now: u64) {
        let session = match self.session.take() {
            Some(session) if part.is_first() && session.version() != part.version => {
                debug!(
                    version = %part.version,
                    active = %session.version(),
                    "Transfer in progress, start event dropped"
                );
                self.session = Some(session);
                return;
            }
            Some(session) => session,
            None if part.is_first() => {
                match self.start_chunked(&part, now) {
                    Ok(session) => session,
                    Err(e) => return self.terminate(None, e, &part.version, now),
                }
            }
            None => {
                let e = OtaError::SequenceViolation {
                    expected: 1,
                    received: part.part_index,
                };
                return self.terminate(None, e, &part.version, now);
            }
        };
        self.continue_chunked(session, part, now);
    }

    fn start_chunked(&mut self, part: &ChunkPart, now: u64) -> Result<TransferSession, OtaError> {
        self.check_version(&part.version)?;
        let estimate = codec::estimated_decoded_len(&part.encoded).max(self.config.chunk_size);
        self.admit(estimate)?;
        let handle = self.sink.begin().map_err(OtaError::SinkUnavailable)?;

        let mut session = TransferSession::chunked(part.version.as_str(), part.total_parts, now);
        session.attach_sink(handle);
        self.open_session(&session, 0, now);
        let progress = session.force_progress(0);
        self.progress = progress;
        self.reporter.progress(progress, session.version(), now);
        Ok(session)
    }

    fn continue_chunked(&mut self, mut session: TransferSession, part: ChunkPart, now: u64) {
        match self.accept_chunk(&mut session, &part, now) {
            Ok(true) => self.succeed(session, now),
            Ok(false) => self.session = Some(session),
            Err(e) => self.terminate(Some(session), e, &part.version, now),
        }
    }

    /// Returns true once the last part has been committed and activated.
    fn accept_chunk(
        &mut self,
        session: &mut TransferSession,
        part: &ChunkPart,
        now: u64,
    ) -> Result<bool, OtaError> {
        let digest = codec::checksum_bytes(part.encoded.as_bytes());
        let verdict = session.sequence_mut().check(
            part.part_index,
            part.total_parts,
            &digest,
            self.config.max_retries,
        );
        match verdict {
            SequenceCheck::Next => {}
            SequenceCheck::Duplicate => {
                warn!(
                    part = part.part_index,
                    retries = session.sequence().retries(),
                    "Re-delivered chunk ignored"
                );
                return Ok(false);
            }
            SequenceCheck::Violation { expected, received } => {
                return Err(OtaError::SequenceViolation { expected, received });
            }
        }

        let data = codec::decode_bounded(&part.encoded, self.config.max_chunk_decoded)
            .map_err(invalid_encoding)?;
        verify_checksum(part.checksum.as_deref(), &data)?;
        if part.is_first() {
            self.inspect_header(session, &data)?;
        }
        self.commit(session, &data)?;
        self.stats.record_chunk(data.len());
        session.sequence_mut().accept(part.part_index, digest);
        debug!(
            part = part.part_index,
            total = part.total_parts,
            bytes = data.len(),
            "Chunk accepted"
        );

        let progress = u64::from(part.part_index) * 100 / u64::from(part.total_parts);
        self.report_progress(session, progress as u8, now);

        if !session.sequence().is_complete() {
            return Ok(false);
        }

        self.goto_state(TransferState::Validating);
        self.validate_size(session.bytes_committed())?;
        self.complete_image(session)?;
        Ok(true)
    }
}
