//! In-memory sink for testing session logic.

use super::traits::{FirmwareSink, SinkError, SinkHandle, StagedImage};

/// Records every call and can be told to fail at a chosen step.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_id: u32,
    open: Option<u32>,
    buffer: Vec<u8>,
    staged: Option<(u32, Vec<u8>)>,
    active: Option<Vec<u8>>,
    /// Sizes of every accepted write.
    writes: Vec<usize>,
    begins: u32,
    aborts: u32,
    finalizes: u32,
    capacity: Option<usize>,
    fail_begin: bool,
    fail_write_at: Option<usize>,
    fail_finalize: bool,
    fail_activate: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the image size the sink accepts.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn fail_on_begin(&mut self) {
        self.fail_begin = true;
    }

    /// Fail the `n`-th write (0-based) of the next image.
    pub fn fail_write_at(&mut self, n: usize) {
        self.fail_write_at = Some(n);
    }

    pub fn fail_on_finalize(&mut self) {
        self.fail_finalize = true;
    }

    pub fn fail_on_activate(&mut self) {
        self.fail_activate = true;
    }

    /// Bytes written to the open image so far.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Image marked bootable, if any.
    pub fn active_image(&self) -> Option<&[u8]> {
        self.active.as_deref()
    }

    pub fn writes(&self) -> &[usize] {
        &self.writes
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn begin_count(&self) -> u32 {
        self.begins
    }

    pub fn abort_count(&self) -> u32 {
        self.aborts
    }

    pub fn finalize_count(&self) -> u32 {
        self.finalizes
    }

    fn check_handle(&self, handle: &SinkHandle) -> Result<(), SinkError> {
        match self.open {
            Some(id) if id == handle.id() => Ok(()),
            _ => Err(SinkError::StaleHandle(handle.id())),
        }
    }

    fn release(&mut self) {
        self.open = None;
        self.buffer.clear();
        self.writes.clear();
    }
}

impl FirmwareSink for MemorySink {
    fn begin(&mut self) -> Result<SinkHandle, SinkError> {
        if self.fail_begin {
            return Err(SinkError::NoPartition);
        }
        if self.open.is_some() {
            return Err(SinkError::Busy);
        }
        self.next_id += 1;
        self.begins += 1;
        self.open = Some(self.next_id);
        self.buffer.clear();
        self.writes.clear();
        Ok(SinkHandle::new(self.next_id))
    }

    fn write(&mut self, handle: &SinkHandle, data: &[u8]) -> Result<(), SinkError> {
        self.check_handle(handle)?;
        if self.fail_write_at == Some(self.writes.len()) {
            return Err(SinkError::WriteFailed("injected failure".into()));
        }
        if let Some(capacity) = self.capacity {
            let needed = self.buffer.len() + data.len();
            if needed > capacity {
                return Err(SinkError::PartitionFull { needed, capacity });
            }
        }
        self.buffer.extend_from_slice(data);
        self.writes.push(data.len());
        Ok(())
    }

    fn finalize(&mut self, handle: SinkHandle) -> Result<StagedImage, SinkError> {
        self.check_handle(&handle)?;
        self.finalizes += 1;
        if self.fail_finalize {
            self.release();
            return Err(SinkError::ValidationFailed("injected failure".into()));
        }
        let image = std::mem::take(&mut self.buffer);
        let size = image.len();
        self.release();
        self.staged = Some((handle.id(), image));
        Ok(StagedImage {
            id: handle.id(),
            size,
        })
    }

    fn activate(&mut self, image: StagedImage) -> Result<(), SinkError> {
        if self.fail_activate {
            return Err(SinkError::ActivationFailed("injected failure".into()));
        }
        match self.staged.take() {
            Some((id, data)) if id == image.id => {
                self.active = Some(data);
                Ok(())
            }
            other => {
                self.staged = other;
                Err(SinkError::StaleHandle(image.id))
            }
        }
    }

    fn abort(&mut self, handle: SinkHandle) {
        if self.open == Some(handle.id()) {
            self.aborts += 1;
            self.release();
        }
    }

    fn free_space(&self) -> Option<usize> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.buffer.len()))
    }
}
