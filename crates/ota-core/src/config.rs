//! Agent configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::constants::*;

/// What to do when an update carries the version already installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameVersionPolicy {
    /// Re-flash anyway (recovery installs).
    #[default]
    Allow,
    /// Refuse with `VersionRejected`.
    Reject,
}

/// Configuration for an update agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    /// Inbound topic carrying update envelopes.
    pub update_topic: String,
    /// Prefix for `<prefix>/progress|error|success`.
    pub report_prefix: String,
    /// Chunked path active instead of single-shot.
    pub chunked: bool,
    /// Write block size in bytes.
    pub chunk_size: usize,
    /// Transfer deadline in milliseconds.
    pub timeout_ms: u64,
    /// Identical re-deliveries absorbed per chunk index.
    pub max_retries: u32,
    /// Headroom kept in reserve when admitting a transfer.
    pub min_free_reserve: usize,
    /// Decoded size floor.
    pub min_image_size: usize,
    /// Encoded size floor for single-shot payloads.
    pub min_encoded_len: usize,
    /// Decoded size cap for a single chunk.
    pub max_chunk_decoded: usize,
    pub same_version_policy: SameVersionPolicy,
    /// Invoke the restart hook after a successful update.
    pub auto_reset: bool,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            update_topic: DEFAULT_UPDATE_TOPIC.to_string(),
            report_prefix: DEFAULT_REPORT_PREFIX.to_string(),
            chunked: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            min_free_reserve: MIN_FREE_RESERVE,
            min_image_size: MIN_IMAGE_SIZE,
            min_encoded_len: MIN_ENCODED_LEN,
            max_chunk_decoded: MAX_CHUNK_DECODED,
            same_version_policy: SameVersionPolicy::Allow,
            auto_reset: true,
        }
    }
}

impl OtaConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OtaConfig = toml::from_str(&content)?;
        Ok(config.normalized())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply the same clamping as the runtime setters.
    pub fn normalized(mut self) -> Self {
        self.chunk_size = clamp_chunk_size(self.chunk_size);
        self.max_retries = normalize_max_retries(self.max_retries);
        self
    }
}
