//! Inbound message entry point.

use tracing::{debug, instrument};

use super::OtaAgent;
use crate::error::OtaError;
use crate::protocol::{InboundUpdate, UpdateEnvelope};
use crate::sink::FirmwareSink;

impl<S: FirmwareSink> OtaAgent<S> {
    /// Process one inbound message. Never fails: every problem ends up in
    /// the log or in an error report.
    #[instrument(skip(self, payload))]
    pub fn handle(&mut self, topic: &str, payload: &str) {
        let now = self.clock.now_millis();
        self.service_abort(now);
        self.supervise(now);

        if topic != self.config.update_topic {
            debug!("Not the update topic, ignored");
            return;
        }

        let details = match UpdateEnvelope::parse(payload) {
            Ok(details) => details,
            Err(e) => {
                debug!(error = %e, "Message dropped");
                return;
            }
        };
        let version = details.version_or_empty().to_string();
        let inbound = if self.config.chunked {
            details.into_chunk()
        } else {
            details.into_single_shot()
        };

        match inbound {
            Ok(InboundUpdate::SingleShot(update)) => self.handle_single_shot(update, now),
            Ok(InboundUpdate::Chunk(part)) => self.handle_chunk(part, now),
            Ok(InboundUpdate::ErrorSignal { version, message }) => {
                let session = self.session.take();
                self.terminate(session, OtaError::RemoteError(message), &version, now);
            }
            Err(e) if e.is_silent() => debug!(error = %e, "Message dropped"),
            Err(e) => {
                let session = self.session.take();
                self.terminate(session, e, &version, now);
            }
        }
    }
}
