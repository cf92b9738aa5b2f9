//! Directory-backed sink.
//!
//! Layout inside the target directory:
//!
//! - `update.staging`: image being written
//! - `staged.bin`: finalized image waiting for activation
//! - `firmware.bin` + `boot`: active image and its boot marker

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::traits::{FirmwareSink, SinkError, SinkHandle, StagedImage};
use crate::image::header::MIN_HEADER_LEN;

const STAGING_FILE: &str = "update.staging";
const STAGED_FILE: &str = "staged.bin";
const ACTIVE_FILE: &str = "firmware.bin";
const BOOT_MARKER: &str = "boot";

struct OpenImage {
    id: u32,
    writer: BufWriter<File>,
    written: usize,
}

pub struct FileSink {
    dir: PathBuf,
    capacity: Option<usize>,
    next_id: u32,
    open: Option<OpenImage>,
    staged: Option<u32>,
}

impl FileSink {
    /// Create a sink rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            capacity: None,
            next_id: 0,
            open: None,
            staged: None,
        })
    }

    /// Limit the image size, like a fixed-size update partition.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILE)
    }

    fn take_open(&mut self, handle: &SinkHandle) -> Result<OpenImage, SinkError> {
        match self.open.take() {
            Some(open) if open.id == handle.id() => Ok(open),
            other => {
                self.open = other;
                Err(SinkError::StaleHandle(handle.id()))
            }
        }
    }

    fn discard_staging(&self) {
        let path = self.dir.join(STAGING_FILE);
        if let Err(e) = fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "Could not remove staging file");
        }
    }
}

impl FirmwareSink for FileSink {
    fn begin(&mut self) -> Result<SinkHandle, SinkError> {
        if self.open.is_some() {
            return Err(SinkError::Busy);
        }
        let file = File::create(self.dir.join(STAGING_FILE))?;
        self.next_id += 1;
        self.open = Some(OpenImage {
            id: self.next_id,
            writer: BufWriter::new(file),
            written: 0,
        });
        debug!(dir = %self.dir.display(), id = self.next_id, "Staging file opened");
        Ok(SinkHandle::new(self.next_id))
    }

    fn write(&mut self, handle: &SinkHandle, data: &[u8]) -> Result<(), SinkError> {
        let capacity = self.capacity;
        let open = match self.open.as_mut() {
            Some(open) if open.id == handle.id() => open,
            _ => return Err(SinkError::StaleHandle(handle.id())),
        };
        let needed = open.written + data.len();
        if let Some(capacity) = capacity
            && needed > capacity
        {
            return Err(SinkError::PartitionFull { needed, capacity });
        }
        open.writer
            .write_all(data)
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;
        open.written = needed;
        Ok(())
    }

    fn finalize(&mut self, handle: SinkHandle) -> Result<StagedImage, SinkError> {
        let open = self.take_open(&handle)?;
        let size = open.written;
        let result = open
            .writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.error().to_string()))
            .and_then(|file| file.sync_all().map_err(SinkError::from));
        if let Err(e) = result {
            self.discard_staging();
            return Err(e);
        }
        if size < MIN_HEADER_LEN {
            self.discard_staging();
            return Err(SinkError::ValidationFailed(format!(
                "image of {} bytes is shorter than its header",
                size
            )));
        }
        fs::rename(self.dir.join(STAGING_FILE), self.dir.join(STAGED_FILE))?;
        self.staged = Some(handle.id());
        info!(size, "Image staged");
        Ok(StagedImage {
            id: handle.id(),
            size,
        })
    }

    fn activate(&mut self, image: StagedImage) -> Result<(), SinkError> {
        if self.staged != Some(image.id) {
            return Err(SinkError::StaleHandle(image.id));
        }
        fs::rename(self.dir.join(STAGED_FILE), self.dir.join(ACTIVE_FILE))
            .map_err(|e| SinkError::ActivationFailed(e.to_string()))?;
        fs::write(self.dir.join(BOOT_MARKER), format!("{}\n", ACTIVE_FILE))
            .map_err(|e| SinkError::ActivationFailed(e.to_string()))?;
        self.staged = None;
        info!(size = image.size, path = %self.active_path().display(), "Image activated");
        Ok(())
    }

    fn abort(&mut self, handle: SinkHandle) {
        if self.take_open(&handle).is_ok() {
            self.discard_staging();
            debug!(id = handle.id(), "Staging file discarded");
        }
    }

    fn free_space(&self) -> Option<usize> {
        let written = self.open.as_ref().map(|o| o.written).unwrap_or(0);
        self.capacity.map(|c| c.saturating_sub(written))
    }
}
