//! Outbound transport abstraction.
//!
//! The messaging client itself lives outside this crate; the agent only
//! needs to publish text on a topic and to ask whether it is connected.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("not connected")]
    NotConnected,
    #[error("publish to {topic} failed: {message}")]
    Failed { topic: String, message: String },
}

pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError>;

    fn is_connected(&self) -> bool;
}

/// Publisher that is never connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl Publisher for Disconnected {
    fn publish(&mut self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
        Err(PublishError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// Adapter over a publish function and a connectivity check.
pub struct FnPublisher<P, C>
where
    P: FnMut(&str, &str) -> Result<(), PublishError>,
    C: Fn() -> bool,
{
    publish: P,
    connected: C,
}

impl<P, C> FnPublisher<P, C>
where
    P: FnMut(&str, &str) -> Result<(), PublishError>,
    C: Fn() -> bool,
{
    pub fn new(publish: P, connected: C) -> Self {
        Self { publish, connected }
    }
}

impl<P, C> Publisher for FnPublisher<P, C>
where
    P: FnMut(&str, &str) -> Result<(), PublishError>,
    C: Fn() -> bool,
{
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        (self.publish)(topic, payload)
    }

    fn is_connected(&self) -> bool {
        (self.connected)()
    }
}

/// A captured publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    log: Vec<Published>,
    offline: bool,
    failing: bool,
}

/// Publisher that records everything. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    state: Rc<RefCell<RecorderState>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().offline = !connected;
    }

    /// Make every publish fail while staying "connected".
    pub fn set_failing(&self, failing: bool) {
        self.state.borrow_mut().failing = failing;
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.borrow().log.clone()
    }

    /// Payloads published on topics ending with `/<suffix>`.
    pub fn on_suffix(&self, suffix: &str) -> Vec<serde_json::Value> {
        let tail = format!("/{}", suffix);
        self.state
            .borrow()
            .log
            .iter()
            .filter(|p| p.topic.ends_with(&tail))
            .map(Published::json)
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let mut state = self.state.borrow_mut();
        if state.failing {
            return Err(PublishError::Failed {
                topic: topic.to_string(),
                message: "injected failure".into(),
            });
        }
        state.log.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.state.borrow().offline
    }
}
