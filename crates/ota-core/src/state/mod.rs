//! State machine module.

pub mod machine;
pub mod sequence;

pub use machine::{TransferMode, TransferSession, TransferState};
pub use sequence::{SequenceCheck, SequenceTracker};
