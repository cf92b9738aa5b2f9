//! Device identity.

use std::fmt;

/// Name, installed version and reporting identifier of this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    name: String,
    version: String,
    id: String,
}

/// Format a 64-bit hardware id as 4 + 8 upper-case hex digits.
///
/// Bits 32..48 and the low 32 bits are kept; the top 16 bits are dropped.
pub fn format_hardware_id(hw_id: u64) -> String {
    format!("{:04X}{:08X}", (hw_id >> 32) as u16, hw_id as u32)
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, hw_id: u64) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            id: format_hardware_id(hw_id),
        }
    }

    /// Use an explicit identifier instead of a derived one.
    pub fn with_id(name: impl Into<String>, version: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            id: id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] v{}", self.name, self.id, self.version)
    }
}
