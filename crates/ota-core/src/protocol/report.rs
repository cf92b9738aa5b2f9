//! Outbound report payloads, one JSON object per publish.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub device: String,
    pub version: String,
    pub progress: u8,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub device: String,
    pub version: String,
    pub error: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessReport {
    pub device: String,
    pub version: String,
    pub success: bool,
    pub timestamp: u64,
}
