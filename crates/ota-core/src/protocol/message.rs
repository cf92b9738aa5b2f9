//! Inbound update envelope.
//!
//! ```text
//! { "EventType": "UpdateFirmwareDevice",
//!   "Details": { "FirmwareVersion": "...", "Base64": "..." } }
//! ```
//!
//! Decoding is strict: a required field that is absent yields
//! [`OtaError::IncompleteData`] instead of an empty default.

use serde::{Deserialize, Serialize};

use super::constants::UPDATE_EVENT_TYPE;
use crate::error::OtaError;

/// Top-level message as received on the update topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    #[serde(rename = "EventType", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(rename = "Details", default, skip_serializing_if = "Option::is_none")]
    pub details: Option<UpdateDetails>,
}

/// `Details` object. Every field is optional on the wire; which ones are
/// required depends on the active path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_part: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_parts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Hex SHA-256 of the decoded payload carried by this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A complete image delivered in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleShotUpdate {
    pub version: String,
    pub encoded: String,
    pub checksum: Option<String>,
}

/// One fragment of a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPart {
    pub version: String,
    pub encoded: String,
    pub part_index: u32,
    pub total_parts: u32,
    pub checksum: Option<String>,
}

impl ChunkPart {
    pub fn is_first(&self) -> bool {
        self.part_index == 1
    }

    pub fn is_last(&self) -> bool {
        self.part_index == self.total_parts
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    SingleShot(SingleShotUpdate),
    Chunk(ChunkPart),
    /// Sender-side failure; aborts whatever is in flight.
    ErrorSignal { version: String, message: String },
}

impl UpdateEnvelope {
    /// Parse raw payload text and return its `Details`.
    ///
    /// Unparsable JSON, a foreign `EventType` or missing `Details` are
    /// all [`OtaError::MalformedMessage`].
    pub fn parse(raw: &str) -> Result<UpdateDetails, OtaError> {
        let envelope: UpdateEnvelope = serde_json::from_str(raw)
            .map_err(|e| OtaError::MalformedMessage(format!("invalid JSON: {}", e)))?;

        match envelope.event_type.as_deref() {
            Some(UPDATE_EVENT_TYPE) => {}
            Some(other) => {
                return Err(OtaError::MalformedMessage(format!(
                    "unexpected EventType {:?}",
                    other
                )));
            }
            None => return Err(OtaError::MalformedMessage("missing EventType".into())),
        }

        envelope
            .details
            .ok_or_else(|| OtaError::MalformedMessage("missing Details".into()))
    }

    fn wrap(details: UpdateDetails) -> Self {
        Self {
            event_type: Some(UPDATE_EVENT_TYPE.to_string()),
            details: Some(details),
        }
    }

    /// Build a single-shot envelope.
    pub fn single_shot(version: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self::wrap(UpdateDetails {
            firmware_version: Some(version.into()),
            base64: Some(encoded.into()),
            ..Default::default()
        })
    }

    /// Build a chunk envelope.
    pub fn chunk(
        version: impl Into<String>,
        encoded: impl Into<String>,
        part_index: u32,
        total_parts: u32,
    ) -> Self {
        Self::wrap(UpdateDetails {
            firmware_version: Some(version.into()),
            base64_part: Some(encoded.into()),
            part_index: Some(part_index),
            total_parts: Some(total_parts),
            ..Default::default()
        })
    }

    /// Build a sender-side error signal.
    pub fn error_signal(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self::wrap(UpdateDetails {
            firmware_version: Some(version.into()),
            is_error: Some(true),
            error_message: Some(message.into()),
            ..Default::default()
        })
    }

    /// Attach a checksum to the details.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        if let Some(details) = self.details.as_mut() {
            details.checksum = Some(checksum.into());
        }
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl UpdateDetails {
    /// Version string as sent, empty if absent.
    pub fn version_or_empty(&self) -> &str {
        self.firmware_version.as_deref().unwrap_or("")
    }

    fn error_signal(&self) -> Option<InboundUpdate> {
        if self.is_error.unwrap_or(false) {
            Some(InboundUpdate::ErrorSignal {
                version: self.version_or_empty().to_string(),
                message: self
                    .error_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "update failed on sender".to_string()),
            })
        } else {
            None
        }
    }

    fn required_version(&self) -> Result<String, OtaError> {
        match self.firmware_version.as_deref() {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(OtaError::IncompleteData("missing FirmwareVersion".into())),
        }
    }

    /// Interpret as a single-shot update.
    pub fn into_single_shot(self) -> Result<InboundUpdate, OtaError> {
        if let Some(signal) = self.error_signal() {
            return Ok(signal);
        }
        let version = self.required_version()?;
        let encoded = match self.base64 {
            Some(b) if !b.is_empty() => b,
            _ => return Err(OtaError::IncompleteData("missing Base64".into())),
        };
        Ok(InboundUpdate::SingleShot(SingleShotUpdate {
            version,
            encoded,
            checksum: self.checksum,
        }))
    }

    /// Interpret as one fragment of a chunked update.
    pub fn into_chunk(self) -> Result<InboundUpdate, OtaError> {
        if let Some(signal) = self.error_signal() {
            return Ok(signal);
        }
        let version = self.required_version()?;
        let encoded = match self.base64_part {
            Some(b) if !b.is_empty() => b,
            _ => return Err(OtaError::IncompleteData("missing Base64Part".into())),
        };
        let part_index = match self.part_index {
            Some(i) if i > 0 => i,
            _ => return Err(OtaError::IncompleteData("missing PartIndex".into())),
        };
        let total_parts = match self.total_parts {
            Some(t) if t > 0 => t,
            _ => return Err(OtaError::IncompleteData("missing TotalParts".into())),
        };
        Ok(InboundUpdate::Chunk(ChunkPart {
            version,
            encoded,
            part_index,
            total_parts,
            checksum: self.checksum,
        }))
    }
}
