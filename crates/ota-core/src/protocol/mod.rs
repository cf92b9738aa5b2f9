//! Protocol module - wire formats exchanged over the messaging channel.

pub mod constants;
pub mod message;
pub mod report;

pub use constants::*;
pub use message::{ChunkPart, InboundUpdate, SingleShotUpdate, UpdateDetails, UpdateEnvelope};
pub use report::{ErrorReport, ProgressReport, SuccessReport};
