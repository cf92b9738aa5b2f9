//! Event reporter: turns transfer milestones into observer calls and
//! outbound messages on `<prefix>/progress|error|success`.
//!
//! Observer invocation and publishing are independent. Neither can fail the
//! caller; problems are logged and dropped.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::events::Observers;
use crate::protocol::constants::*;
use crate::protocol::report::{ErrorReport, ProgressReport, SuccessReport};
use crate::publish::{Disconnected, Publisher};

/// Whether a progress value is published outward.
pub fn is_publishable_progress(progress: u8) -> bool {
    progress % PROGRESS_PUBLISH_STEP == 0 || progress == PROGRESS_DONE
}

pub struct EventReporter {
    device_id: String,
    current_version: String,
    prefix: String,
    publisher: Box<dyn Publisher>,
    observers: Observers,
}

impl EventReporter {
    pub fn new(device_id: impl Into<String>, current_version: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            current_version: current_version.into(),
            prefix: DEFAULT_REPORT_PREFIX.to_string(),
            publisher: Box::new(Disconnected),
            observers: Observers::default(),
        }
    }

    pub fn set_publisher(&mut self, publisher: Box<dyn Publisher>) {
        self.publisher = publisher;
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn observers_mut(&mut self) -> &mut Observers {
        &mut self.observers
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.prefix, suffix)
    }

    fn version_or_current<'a>(&'a self, version: &'a str) -> &'a str {
        if version.is_empty() {
            &self.current_version
        } else {
            version
        }
    }

    fn publish<T: Serialize>(&mut self, suffix: &str, report: &T) {
        if !self.publisher.is_connected() {
            debug!(suffix, "Transport offline, report not published");
            return;
        }
        let payload = match serde_json::to_string(report) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Could not serialize report");
                return;
            }
        };
        let topic = self.topic(suffix);
        if let Err(e) = self.publisher.publish(&topic, &payload) {
            warn!(topic = %topic, error = %e, "Publish failed");
        }
    }

    /// Report progress. Observers see every value; the transport only sees
    /// multiples of ten and 100.
    pub fn progress(&mut self, progress: u8, version: &str, timestamp: u64) {
        let version = self.version_or_current(version).to_string();
        self.observers.progress(progress, &version);

        if is_publishable_progress(progress) {
            let report = ProgressReport {
                device: self.device_id.clone(),
                version: version.clone(),
                progress,
                timestamp,
            };
            self.publish(PROGRESS_TOPIC_SUFFIX, &report);
        }
        info!(version = %version, progress, "Update progress");
    }

    pub fn error(&mut self, message: &str, version: &str, timestamp: u64) {
        let version = self.version_or_current(version).to_string();
        self.observers.error(message, &version);

        let report = ErrorReport {
            device: self.device_id.clone(),
            version: version.clone(),
            error: message.to_string(),
            timestamp,
        };
        self.publish(ERROR_TOPIC_SUFFIX, &report);
        error!(version = %version, "Update error: {}", message);
    }

    pub fn success(&mut self, version: &str, timestamp: u64) {
        let version = self.version_or_current(version).to_string();
        self.observers.success(&version);

        let report = SuccessReport {
            device: self.device_id.clone(),
            version: version.clone(),
            success: true,
            timestamp,
        };
        self.publish(SUCCESS_TOPIC_SUFFIX, &report);
        info!(version = %version, "Update successful");
    }
}
