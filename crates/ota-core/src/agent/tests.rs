use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::OtaAgent;
use crate::clock::ManualClock;
use crate::codec;
use crate::config::{OtaConfig, SameVersionPolicy};
use crate::device::DeviceInfo;
use crate::image::Sha256Verifier;
use crate::image::testutil::sample_image;
use crate::protocol::UpdateEnvelope;
use crate::publish::RecordingPublisher;
use crate::sink::MemorySink;
use crate::state::TransferState;

const TOPIC: &str = "ota";
const IMAGE_LEN: usize = 4000;

struct Harness {
    agent: OtaAgent<MemorySink>,
    publisher: RecordingPublisher,
    clock: ManualClock,
    progress: Rc<RefCell<Vec<u8>>>,
    errors: Rc<RefCell<Vec<String>>>,
    successes: Rc<RefCell<Vec<String>>>,
    states: Rc<RefCell<Vec<TransferState>>>,
    restarts: Rc<Cell<u32>>,
}

fn harness(chunked: bool) -> Harness {
    harness_with_sink(chunked, MemorySink::new())
}

fn harness_with_sink(chunked: bool, sink: MemorySink) -> Harness {
    let config = OtaConfig {
        chunked,
        ..Default::default()
    };
    let device = DeviceInfo::new("test-device", "1.0.0", 0x0000_0001_DEAD_BEEF);
    let mut agent = OtaAgent::new(device, config, sink);

    let publisher = RecordingPublisher::new();
    let clock = ManualClock::new(1_000);
    agent.set_publisher(publisher.clone());
    agent.set_clock(clock.clone());

    let progress = Rc::new(RefCell::new(Vec::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let successes = Rc::new(RefCell::new(Vec::new()));
    let states = Rc::new(RefCell::new(Vec::new()));
    let restarts = Rc::new(Cell::new(0));

    let log = progress.clone();
    agent.on_progress(move |p, _| log.borrow_mut().push(p));
    let log = errors.clone();
    agent.on_error(move |message, _| log.borrow_mut().push(message.to_string()));
    let log = successes.clone();
    agent.on_success(move |version| log.borrow_mut().push(version.to_string()));
    let log = states.clone();
    agent.on_state_change(move |state| log.borrow_mut().push(state));
    let count = restarts.clone();
    agent.on_restart(move || count.set(count.get() + 1));

    Harness {
        agent,
        publisher,
        clock,
        progress,
        errors,
        successes,
        states,
        restarts,
    }
}

/// Encoded parts of `image`, `count` of them.
fn parts(image: &[u8], count: usize) -> Vec<String> {
    codec::encode_parts(image, image.len().div_ceil(count))
}

impl Harness {
    fn send(&mut self, envelope: UpdateEnvelope) {
        let payload = envelope.to_json().unwrap();
        self.agent.handle(TOPIC, &payload);
    }

    fn send_single(&mut self, version: &str, image: &[u8]) {
        self.send(UpdateEnvelope::single_shot(version, codec::encode(image)));
    }

    fn send_part(&mut self, version: &str, parts: &[String], index: u32) {
        let encoded = parts[index as usize - 1].clone();
        self.send(UpdateEnvelope::chunk(version, encoded, index, parts.len() as u32));
    }

    fn send_all(&mut self, version: &str, parts: &[String]) {
        for index in 1..=parts.len() as u32 {
            self.send_part(version, parts, index);
        }
    }

    fn progress(&self) -> Vec<u8> {
        self.progress.borrow().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    fn published_progress(&self) -> Vec<u64> {
        self.publisher
            .on_suffix("progress")
            .iter()
            .map(|v| v["progress"].as_u64().unwrap())
            .collect()
    }
}

fn is_monotonic(values: &[u8]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

// ============================================================================
// Single-shot
// ============================================================================

#[test]
fn test_single_shot_success() {
    let mut h = harness(false);
    let image = sample_image("1.1.0", IMAGE_LEN);
    h.send_single("1.1.0", &image);

    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.progress(), vec![10, 25, 37, 50, 63, 75, 100]);
    assert_eq!(h.published_progress(), vec![10, 50, 100]);
    assert_eq!(h.agent.sink().active_image(), Some(&image[..]));

    let success = h.publisher.on_suffix("success");
    assert_eq!(success.len(), 1);
    assert_eq!(success[0]["version"], "1.1.0");
    assert_eq!(success[0]["success"], true);
    assert_eq!(success[0]["device"], "0001DEADBEEF");
    assert_eq!(success[0]["timestamp"], 1_000);
    assert_eq!(*h.successes.borrow(), vec!["1.1.0".to_string()]);
    assert_eq!(h.restarts.get(), 1);
    assert!(!h.agent.is_update_in_progress());
}

#[test]
fn test_single_shot_state_walk() {
    let mut h = harness(false);
    h.send_single("1.1.0", &sample_image("1.1.0", IMAGE_LEN));
    assert_eq!(
        *h.states.borrow(),
        vec![
            TransferState::Receiving,
            TransferState::Decoding,
            TransferState::Validating,
            TransferState::Writing,
            TransferState::Completing,
            TransferState::Success,
        ]
    );
}

#[test]
fn test_single_shot_rejects_bad_encoding_without_session() {
    let mut h = harness(false);
    h.send(UpdateEnvelope::single_shot("1.1.0", "!".repeat(200)));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("invalid encoding"));
    assert!(h.progress().is_empty());
    assert_eq!(h.agent.sink().begin_count(), 0);
}

#[test]
fn test_single_shot_image_too_small() {
    let mut h = harness(false);
    h.send_single("1.1.0", &sample_image("1.1.0", 500));

    assert_eq!(
        h.errors(),
        vec!["firmware too small: 500 bytes, minimum 1000".to_string()]
    );
    assert_eq!(h.agent.sink().begin_count(), 0);
}

#[test]
fn test_single_shot_invalid_header() {
    let mut h = harness(false);
    h.send_single("1.1.0", &[0x42u8; 2000]);

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("invalid image header"));
    assert!(h.agent.sink().active_image().is_none());
}

#[test]
fn test_single_shot_checksum() {
    let mut h = harness(false);
    let image = sample_image("1.1.0", IMAGE_LEN);

    let wrong = UpdateEnvelope::single_shot("1.1.0", codec::encode(&image)).with_checksum("00".repeat(32));
    h.send(wrong);
    assert!(h.errors()[0].starts_with("checksum mismatch"));

    let right = UpdateEnvelope::single_shot("1.1.0", codec::encode(&image))
        .with_checksum(codec::checksum_bytes(&image));
    h.send(right);
    assert_eq!(h.agent.state(), TransferState::Success);
}

#[test]
fn test_single_shot_write_failure_releases_sink() {
    let mut h = harness(false);
    h.agent.sink_mut().fail_write_at(1);
    h.send_single("1.1.0", &sample_image("1.1.0", IMAGE_LEN));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("error writing firmware"));
    assert_eq!(h.agent.sink().abort_count(), 1);
    assert!(!h.agent.sink().is_open());
    assert!(is_monotonic(&h.progress()));
}

#[test]
fn test_single_shot_checks_sink_space_before_writing() {
    let mut h = harness_with_sink(false, MemorySink::new().with_capacity(1_000));
    h.send_single("1.1.0", &sample_image("1.1.0", IMAGE_LEN));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(
        h.errors(),
        vec!["could not begin update: partition full: 4000 bytes needed, 1000 available".to_string()]
    );
    assert_eq!(h.agent.sink().begin_count(), 0);
    assert_eq!(h.published_progress(), vec![10]);
}

#[test]
fn test_same_version_policy() {
    let mut h = harness(false);
    let image = sample_image("1.0.0", IMAGE_LEN);

    h.send_single("1.0.0", &image);
    assert_eq!(h.agent.state(), TransferState::Success);

    h.agent.set_same_version_policy(SameVersionPolicy::Reject);
    h.send_single("1.0.0", &image);
    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(h.errors(), vec!["version 1.0.0 rejected: already installed".to_string()]);
    assert_eq!(h.agent.sink().begin_count(), 1);
}

// ============================================================================
// Chunked
// ============================================================================

#[test]
fn test_chunked_three_parts() {
    let mut h = harness(true);
    let image = sample_image("2.0.0", IMAGE_LEN);
    let parts = parts(&image, 3);
    assert_eq!(parts.len(), 3);

    h.send_part("2.0.0", &parts, 1);
    assert!(h.agent.is_update_in_progress());
    assert_eq!(h.agent.session().unwrap().sequence().last_accepted(), 1);
    h.send_part("2.0.0", &parts, 2);
    assert_eq!(h.agent.session().unwrap().sequence().last_accepted(), 2);
    h.send_part("2.0.0", &parts, 3);

    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.progress(), vec![0, 33, 66, 100]);
    assert_eq!(h.published_progress(), vec![0, 100]);
    assert_eq!(h.agent.sink().active_image(), Some(&image[..]));
    assert_eq!(h.publisher.on_suffix("success")[0]["version"], "2.0.0");
    assert_eq!(
        *h.states.borrow(),
        vec![
            TransferState::Receiving,
            TransferState::Validating,
            TransferState::Completing,
            TransferState::Success,
        ]
    );

    let stats = h.agent.statistics();
    assert_eq!(stats.chunk_count, 3);
    assert_eq!(stats.received_bytes, IMAGE_LEN);
    assert_eq!(stats.last_state, TransferState::Success);
}

#[test]
fn test_chunked_duplicate_index_is_sequence_violation() {
    let mut h = harness(true);
    let image = sample_image("2.0.0", IMAGE_LEN);
    let parts = parts(&image, 3);

    h.send_part("2.0.0", &parts, 1);
    // Second part's payload, labelled as part 1.
    h.send(UpdateEnvelope::chunk("2.0.0", parts[1].clone(), 1, 3));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(
        h.errors(),
        vec!["chunk out of sequence: expected 2, received 1".to_string()]
    );
    assert!(h.publisher.on_suffix("error")[0]["error"]
        .as_str()
        .unwrap()
        .contains("chunk out of sequence"));
    assert_eq!(h.agent.sink().abort_count(), 1);
    assert!(!h.agent.sink().is_open());

    // A fresh transfer starts from here.
    h.send_all("2.0.0", &parts);
    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.agent.sink().begin_count(), 2);
}

#[test]
fn test_identical_redelivery_is_absorbed() {
    let mut h = harness(true);
    let image = sample_image("2.0.0", IMAGE_LEN);
    let parts = parts(&image, 3);

    h.send_part("2.0.0", &parts, 1);
    h.send_part("2.0.0", &parts, 1);
    assert_eq!(h.agent.state(), TransferState::Receiving);
    assert!(h.errors().is_empty());

    h.send_part("2.0.0", &parts, 2);
    h.send_part("2.0.0", &parts, 3);
    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.agent.sink().active_image(), Some(&image[..]));
}

#[test]
fn test_redelivery_budget() {
    let mut h = harness(true);
    h.agent.set_max_retries(1);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);

    h.send_part("2.0.0", &parts, 1);
    h.send_part("2.0.0", &parts, 1);
    assert_eq!(h.agent.state(), TransferState::Receiving);
    h.send_part("2.0.0", &parts, 1);
    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].contains("chunk out of sequence"));
}

#[test]
fn test_gap_forces_error() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);

    h.send_part("2.0.0", &parts, 1);
    h.send_part("2.0.0", &parts, 3);

    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(
        h.errors(),
        vec!["chunk out of sequence: expected 2, received 3".to_string()]
    );
    assert!(h.agent.session().is_none());
    assert!(!h.agent.sink().is_open());
}

#[test]
fn test_chunk_without_session() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);

    h.send_part("2.0.0", &parts, 2);
    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(
        h.errors(),
        vec!["chunk out of sequence: expected 1, received 2".to_string()]
    );

    h.send(UpdateEnvelope::chunk("2.0.0", parts[0].clone(), 4, 3));
    assert_eq!(h.errors()[1], "chunk out of sequence: expected 1, received 4");
    assert_eq!(h.agent.sink().begin_count(), 0);
}

#[test]
fn test_second_start_is_dropped() {
    let mut h = harness(true);
    let first = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    let other = parts(&sample_image("3.0.0", IMAGE_LEN), 2);

    h.send_part("2.0.0", &first, 1);
    let committed = h.agent.session().unwrap().bytes_committed();

    h.send_part("3.0.0", &other, 1);
    h.agent.enable_chunked(false);
    h.send_single("3.0.0", &sample_image("3.0.0", IMAGE_LEN));
    h.agent.enable_chunked(true);

    assert_eq!(h.agent.state(), TransferState::Receiving);
    let session = h.agent.session().unwrap();
    assert_eq!(session.version(), "2.0.0");
    assert_eq!(session.bytes_committed(), committed);
    assert_eq!(session.sequence().last_accepted(), 1);
    assert!(h.errors().is_empty());
    assert_eq!(h.agent.sink().begin_count(), 1);

    h.send_part("2.0.0", &first, 2);
    h.send_part("2.0.0", &first, 3);
    assert_eq!(h.agent.state(), TransferState::Success);
}

#[test]
fn test_foreign_version_chunk_is_sequence_checked() {
    let mut h = harness(true);
    let first = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    let other = parts(&sample_image("3.0.0", IMAGE_LEN), 3);

    h.send_part("2.0.0", &first, 1);
    h.send_part("3.0.0", &other, 3);

    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(
        h.errors(),
        vec!["chunk out of sequence: expected 2, received 3".to_string()]
    );
    assert!(h.agent.session().is_none());
    assert_eq!(h.agent.sink().abort_count(), 1);
    assert_eq!(h.publisher.on_suffix("error")[0]["version"], "2.0.0");
}

#[test]
fn test_restart_after_terminal_states() {
    let mut h = harness(true);
    let image = sample_image("2.0.0", IMAGE_LEN);
    let parts = parts(&image, 3);

    h.send_all("2.0.0", &parts);
    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.agent.progress(), 100);

    h.send_part("2.0.0", &parts, 1);
    assert_eq!(h.agent.state(), TransferState::Receiving);
    assert_eq!(h.agent.progress(), 33);
    let session = h.agent.session().unwrap();
    assert_eq!(session.bytes_committed(), image.len().div_ceil(3));
    assert_eq!(session.sequence().last_accepted(), 1);

    h.agent.request_abort();
    h.agent.poll();
    assert_eq!(h.agent.state(), TransferState::Aborted);

    h.send_all("2.0.0", &parts);
    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.agent.sink().begin_count(), 3);
}

#[test]
fn test_chunked_finalize_failure() {
    let mut h = harness(true);
    h.agent.sink_mut().fail_on_finalize();
    h.send_all("2.0.0", &parts(&sample_image("2.0.0", IMAGE_LEN), 3));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("error finalizing firmware"));
    assert_eq!(h.agent.sink().abort_count(), 0);
    assert!(!h.agent.sink().is_open());
    assert!(h.successes.borrow().is_empty());
}

#[test]
fn test_chunked_activation_failure() {
    let mut h = harness(true);
    h.agent.sink_mut().fail_on_activate();
    h.send_all("2.0.0", &parts(&sample_image("2.0.0", IMAGE_LEN), 3));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("error setting boot image"));
    assert_eq!(h.restarts.get(), 0);
}

#[test]
fn test_chunked_checksum_per_part() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send(UpdateEnvelope::chunk("2.0.0", parts[0].clone(), 1, 3).with_checksum("ab".repeat(32)));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("checksum mismatch"));
    assert_eq!(h.agent.sink().abort_count(), 1);
}

#[test]
fn test_image_verifier() {
    let image = sample_image("2.0.0", IMAGE_LEN);

    let mut h = harness(true);
    h.agent.set_verifier(Sha256Verifier::new(codec::checksum_bytes(&image)));
    h.send_all("2.0.0", &parts(&image, 3));
    assert_eq!(h.agent.state(), TransferState::Success);

    let mut h = harness(true);
    h.agent.set_verifier(Sha256Verifier::new("00".repeat(32)));
    h.send_all("2.0.0", &parts(&image, 3));
    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("image verification failed"));
}

// ============================================================================
// Dispatcher
// ============================================================================

#[test]
fn test_foreign_traffic_is_silent() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 1);
    let valid = UpdateEnvelope::chunk("2.0.0", parts[0].clone(), 1, 1)
        .to_json()
        .unwrap();

    h.agent.handle("other/topic", &valid);
    h.agent.handle(TOPIC, "not json");
    h.agent.handle(TOPIC, r#"{"EventType":"Reboot","Details":{}}"#);
    h.agent.handle(TOPIC, r#"{"EventType":"UpdateFirmwareDevice"}"#);

    assert_eq!(h.agent.state(), TransferState::Idle);
    assert!(h.errors().is_empty());
    assert!(h.publisher.published().is_empty());
}

#[test]
fn test_incomplete_chunk_is_reported() {
    let mut h = harness(true);
    h.send(UpdateEnvelope::single_shot("2.0.0", "QUJD"));

    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(
        h.errors(),
        vec!["incomplete update data: missing Base64Part".to_string()]
    );
}

#[test]
fn test_teardown_reports_session_version() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_part("2.0.0", &parts, 1);

    h.send(UpdateEnvelope::single_shot("3.0.0", "QUJD"));
    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(h.agent.sink().abort_count(), 1);
    assert_eq!(h.publisher.on_suffix("error")[0]["version"], "2.0.0");

    // With nothing in flight the message's own version is reported.
    h.send(UpdateEnvelope::single_shot("3.0.0", "QUJD"));
    assert_eq!(h.publisher.on_suffix("error")[1]["version"], "3.0.0");
}

#[test]
fn test_error_signal_tears_down() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_part("2.0.0", &parts, 1);

    h.send(UpdateEnvelope::error_signal("2.0.0", "sender lost the image"));
    assert_eq!(h.agent.state(), TransferState::Error);
    assert_eq!(h.errors(), vec!["sender lost the image".to_string()]);
    assert_eq!(h.agent.sink().abort_count(), 1);
    assert_eq!(h.publisher.on_suffix("error")[0]["error"], "sender lost the image");
}

#[test]
fn test_resource_guard_rejection() {
    let mut h = harness(true);
    h.agent.set_headroom(|| 10_000usize);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_part("2.0.0", &parts, 1);

    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].starts_with("insufficient resources"));
    assert!(h.agent.session().is_none());
    assert_eq!(h.agent.sink().begin_count(), 0);
}

// ============================================================================
// Supervisor
// ============================================================================

#[test]
fn test_timeout_on_tick() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_part("2.0.0", &parts, 1);

    h.agent.tick(1_000 + 420_000);
    assert_eq!(h.agent.state(), TransferState::Receiving);

    h.agent.tick(1_000 + 420_001);
    assert_eq!(h.agent.state(), TransferState::Error);
    assert!(h.errors()[0].contains("timeout"));
    assert_eq!(h.agent.sink().abort_count(), 1);
    let reported = h.publisher.on_suffix("error");
    assert_eq!(reported[0]["version"], "2.0.0");
}

#[test]
fn test_timeout_checked_before_message() {
    let mut h = harness(true);
    h.agent.set_timeout(5_000);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_part("2.0.0", &parts, 1);

    h.clock.advance(5_001);
    h.send_part("2.0.0", &parts, 2);

    assert!(h.errors()[0].contains("timeout"));
    assert_eq!(h.agent.state(), TransferState::Error);
}

#[test]
fn test_abort_and_cleanup() {
    let mut h = harness(true);
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_part("2.0.0", &parts, 1);

    h.agent.request_abort();
    assert_eq!(h.agent.state(), TransferState::Receiving);
    assert!(!h.agent.cleanup());

    h.agent.tick(2_000);
    assert_eq!(h.agent.state(), TransferState::Aborted);
    assert_eq!(h.errors(), vec!["update aborted".to_string()]);
    assert_eq!(h.agent.sink().abort_count(), 1);

    assert!(h.agent.cleanup());
    assert_eq!(h.agent.state(), TransferState::Idle);
    assert_eq!(h.agent.progress(), 0);
}

#[test]
fn test_abort_without_session_is_noop() {
    let mut h = harness(true);
    h.agent.request_abort();
    h.agent.tick(2_000);

    assert_eq!(h.agent.state(), TransferState::Idle);
    assert!(h.errors().is_empty());
    assert!(!h.agent.cleanup());

    // The flag does not linger into the next transfer.
    let parts = parts(&sample_image("2.0.0", IMAGE_LEN), 3);
    h.send_all("2.0.0", &parts);
    assert_eq!(h.agent.state(), TransferState::Success);
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn test_panicking_observer_does_not_stop_update() {
    let mut h = harness(false);
    h.agent.on_progress(|_, _| panic!("listener bug"));
    h.send_single("1.1.0", &sample_image("1.1.0", IMAGE_LEN));

    assert_eq!(h.agent.state(), TransferState::Success);
    assert_eq!(h.published_progress(), vec![10, 50, 100]);
}

#[test]
fn test_offline_transport() {
    let mut h = harness(false);
    h.publisher.set_connected(false);
    h.agent.set_auto_reset(false);
    h.send_single("1.1.0", &sample_image("1.1.0", IMAGE_LEN));

    assert_eq!(h.agent.state(), TransferState::Success);
    assert!(h.publisher.published().is_empty());
    assert_eq!(h.successes.borrow().len(), 1);
    assert_eq!(h.restarts.get(), 0);
}

#[test]
fn test_runtime_setters_clamp() {
    let mut h = harness(true);
    h.agent.set_chunk_size(0);
    assert_eq!(h.agent.config().chunk_size, 1024);
    h.agent.set_chunk_size(100_000);
    assert_eq!(h.agent.config().chunk_size, 1024);
    h.agent.set_chunk_size(512);
    assert_eq!(h.agent.config().chunk_size, 512);
    h.agent.set_max_retries(0);
    assert_eq!(h.agent.config().max_retries, 3);

    assert_eq!(h.agent.device_id(), "0001DEADBEEF");
    assert_eq!(h.agent.current_version(), "1.0.0");
}

#[test]
fn test_transport_closures_and_topic() {
    let mut h = harness(false);
    let sent = Rc::new(RefCell::new(Vec::new()));
    let log = sent.clone();
    h.agent.set_transport(
        move |topic, payload| {
            log.borrow_mut().push((topic.to_string(), payload.to_string()));
            Ok(())
        },
        || true,
        "devices/7/ota",
    );
    h.agent.set_report_prefix("devices/7/ota");

    let payload = UpdateEnvelope::single_shot("1.1.0", codec::encode(&sample_image("1.1.0", IMAGE_LEN)))
        .to_json()
        .unwrap();
    h.agent.handle(TOPIC, &payload);
    assert_eq!(h.agent.state(), TransferState::Idle);

    h.agent.handle("devices/7/ota", &payload);
    assert_eq!(h.agent.state(), TransferState::Success);
    let sent = sent.borrow();
    assert_eq!(sent.last().unwrap().0, "devices/7/ota/success");
    assert!(sent.iter().any(|(topic, _)| topic == "devices/7/ota/progress"));
}
