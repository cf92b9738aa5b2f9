//! Storage sink layer module.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileSink;
pub use memory::MemorySink;
pub use traits::{FirmwareSink, SinkError, SinkHandle, StagedImage};
