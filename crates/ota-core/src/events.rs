//! Observer registrations for UI decoupling.
//!
//! Hosts register at most one listener per report kind. A listener that
//! panics is contained here: the failure is logged and the report still
//! goes out on the transport.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

use crate::state::TransferState;

pub type ProgressObserver = Box<dyn FnMut(u8, &str)>;
pub type ErrorObserver = Box<dyn FnMut(&str, &str)>;
pub type SuccessObserver = Box<dyn FnMut(&str)>;
pub type StateObserver = Box<dyn FnMut(TransferState)>;
pub type RestartHook = Box<dyn FnMut()>;

/// Registered listeners, one slot per kind.
#[derive(Default)]
pub struct Observers {
    progress: Option<ProgressObserver>,
    error: Option<ErrorObserver>,
    success: Option<SuccessObserver>,
    state: Option<StateObserver>,
    restart: Option<RestartHook>,
}

/// Run a listener, containing any panic. Returns false if it panicked.
fn guarded(kind: &'static str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            warn!(observer = kind, "Observer panicked; continuing");
            false
        }
    }
}

impl Observers {
    pub fn set_progress(&mut self, observer: ProgressObserver) {
        self.progress = Some(observer);
    }

    pub fn set_error(&mut self, observer: ErrorObserver) {
        self.error = Some(observer);
    }

    pub fn set_success(&mut self, observer: SuccessObserver) {
        self.success = Some(observer);
    }

    pub fn set_state(&mut self, observer: StateObserver) {
        self.state = Some(observer);
    }

    pub fn set_restart(&mut self, hook: RestartHook) {
        self.restart = Some(hook);
    }

    pub fn progress(&mut self, progress: u8, version: &str) -> bool {
        match self.progress.as_mut() {
            Some(cb) => guarded("progress", || cb(progress, version)),
            None => true,
        }
    }

    pub fn error(&mut self, message: &str, version: &str) -> bool {
        match self.error.as_mut() {
            Some(cb) => guarded("error", || cb(message, version)),
            None => true,
        }
    }

    pub fn success(&mut self, version: &str) -> bool {
        match self.success.as_mut() {
            Some(cb) => guarded("success", || cb(version)),
            None => true,
        }
    }

    pub fn state_changed(&mut self, state: TransferState) -> bool {
        match self.state.as_mut() {
            Some(cb) => guarded("state", || cb(state)),
            None => true,
        }
    }

    /// Invoke the restart hook. Returns false if none is registered.
    pub fn restart(&mut self) -> bool {
        match self.restart.as_mut() {
            Some(hook) => guarded("restart", || hook()),
            None => false,
        }
    }
}
