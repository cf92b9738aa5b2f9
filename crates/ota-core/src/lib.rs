//! OTA-Core: firmware update agent for devices fed over publish/subscribe.
//!
//! An update arrives either as one encoded payload or as an ordered series
//! of chunks. The agent admits at most one transfer at a time, checks the
//! image before anything is committed, writes it through a storage sink and
//! reports progress, errors and success back over the same channel.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Message schema, report payloads, constants
//! - **Codec**: base64 and payload checksums
//! - **Image**: Header inspection and verification hooks
//! - **Sink**: Storage abstraction (file, in-memory)
//! - **State**: Transfer states, session record, chunk sequencing
//! - **Events / Report / Publish**: Observers and outbound reports
//! - **Agent**: Dispatcher, transfer paths and timeout supervision
//!
//! # Example
//!
//! ```no_run
//! use ota_core::{DeviceInfo, MemorySink, OtaAgent, OtaConfig};
//!
//! let device = DeviceInfo::new("sensor", "1.0.0", 0x0000_1234_DEAD_BEEF);
//! let mut agent = OtaAgent::new(device, OtaConfig::default(), MemorySink::new());
//! agent.on_progress(|progress, version| println!("{} {}%", version, progress));
//!
//! // From the messaging client's callback:
//! agent.handle("ota", r#"{"EventType":"UpdateFirmwareDevice","Details":{}}"#);
//! // From the main loop:
//! agent.poll();
//! ```

pub mod agent;
pub mod clock;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod guard;
pub mod image;
pub mod protocol;
pub mod publish;
pub mod report;
pub mod sink;
pub mod state;
pub mod stats;

// Re-exports for convenience
pub use agent::OtaAgent;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{OtaConfig, SameVersionPolicy};
pub use device::DeviceInfo;
pub use error::{ErrorKind, OtaError};
pub use guard::{HeadroomProbe, ResourceGuard, UnlimitedHeadroom};
pub use image::{AcceptAll, FirmwareHeader, HeaderError, ImageVerifier, Sha256Verifier};
pub use protocol::{InboundUpdate, UpdateEnvelope};
pub use publish::{FnPublisher, PublishError, Publisher, RecordingPublisher};
pub use report::EventReporter;
pub use sink::{FileSink, FirmwareSink, MemorySink, SinkError, SinkHandle, StagedImage};
pub use state::{TransferMode, TransferSession, TransferState};
pub use stats::OtaStatistics;
