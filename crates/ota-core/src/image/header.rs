//! Application image header inspection.
//!
//! The first bytes of an image are laid out as:
//!
//! ```text
//! | image header (24) | first segment header (8) | app descriptor (256) |
//! ```
//!
//! Only structure is checked here; integrity of the remaining bytes is the
//! sink's and the verifier's business.

use std::fmt;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

/// Image header magic byte.
pub const IMAGE_MAGIC: u8 = 0xE9;
/// Application descriptor magic word.
pub const APP_DESC_MAGIC: u32 = 0xABCD_5432;

pub const IMAGE_HEADER_LEN: usize = 24;
pub const SEGMENT_HEADER_LEN: usize = 8;
pub const APP_DESC_LEN: usize = 256;
pub const MIN_HEADER_LEN: usize = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN + APP_DESC_LEN;

pub const MAX_SEGMENTS: u8 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("buffer too small: expected {expected}, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("invalid image magic: expected 0x{expected:02X}, got 0x{actual:02X}")]
    InvalidImageMagic { expected: u8, actual: u8 },
    #[error("invalid segment count {0}")]
    InvalidSegmentCount(u8),
    #[error("invalid app descriptor magic: expected 0x{expected:08X}, got 0x{actual:08X}")]
    InvalidDescriptorMagic { expected: u32, actual: u32 },
    #[error("truncated header field")]
    Truncated,
}

impl From<std::io::Error> for HeaderError {
    fn from(_: std::io::Error) -> Self {
        HeaderError::Truncated
    }
}

/// Parsed view of the first [`MIN_HEADER_LEN`] bytes of an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub segment_count: u8,
    pub spi_mode: u8,
    pub entry_addr: u32,
    pub chip_id: u16,
    pub hash_appended: bool,
    pub load_addr: u32,
    pub segment_len: u32,
    pub secure_version: u32,
    pub version: String,
    pub project_name: String,
    pub build_date: String,
    pub sdk_version: String,
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl FirmwareHeader {
    /// Inspect the leading bytes of an image.
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < MIN_HEADER_LEN {
            return Err(HeaderError::BufferTooSmall {
                expected: MIN_HEADER_LEN,
                actual: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let magic = cursor.read_u8()?;
        if magic != IMAGE_MAGIC {
            return Err(HeaderError::InvalidImageMagic {
                expected: IMAGE_MAGIC,
                actual: magic,
            });
        }
        let segment_count = cursor.read_u8()?;
        if segment_count == 0 || segment_count > MAX_SEGMENTS {
            return Err(HeaderError::InvalidSegmentCount(segment_count));
        }
        let spi_mode = cursor.read_u8()?;
        let _spi_speed_size = cursor.read_u8()?;
        let entry_addr = cursor.read_u32::<LittleEndian>()?;

        cursor.set_position(12);
        let chip_id = cursor.read_u16::<LittleEndian>()?;

        cursor.set_position(23);
        let hash_appended = cursor.read_u8()? == 1;

        let load_addr = cursor.read_u32::<LittleEndian>()?;
        let segment_len = cursor.read_u32::<LittleEndian>()?;

        let desc = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN;
        let desc_magic = cursor.read_u32::<LittleEndian>()?;
        if desc_magic != APP_DESC_MAGIC {
            return Err(HeaderError::InvalidDescriptorMagic {
                expected: APP_DESC_MAGIC,
                actual: desc_magic,
            });
        }
        let secure_version = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            segment_count,
            spi_mode,
            entry_addr,
            chip_id,
            hash_appended,
            load_addr,
            segment_len,
            secure_version,
            version: c_string(&data[desc + 16..desc + 48]),
            project_name: c_string(&data[desc + 48..desc + 80]),
            build_date: c_string(&data[desc + 96..desc + 112]),
            sdk_version: c_string(&data[desc + 112..desc + 144]),
        })
    }
}

impl fmt::Display for FirmwareHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image header:")?;
        writeln!(f, "  project:   {}", self.project_name)?;
        writeln!(f, "  version:   {}", self.version)?;
        writeln!(f, "  built:     {}", self.build_date)?;
        writeln!(f, "  sdk:       {}", self.sdk_version)?;
        writeln!(f, "  chip id:   0x{:04X}", self.chip_id)?;
        writeln!(f, "  entry:     0x{:08X}", self.entry_addr)?;
        writeln!(f, "  segments:  {}", self.segment_count)?;
        write!(f, "  secure v.: {}", self.secure_version)
    }
}
