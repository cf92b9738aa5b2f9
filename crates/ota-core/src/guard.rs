//! Resource guard: admission control before a transfer starts.

use tracing::{debug, warn};

/// Source of the current working-memory headroom, in bytes.
pub trait HeadroomProbe {
    fn available(&self) -> usize;
}

impl<F: Fn() -> usize> HeadroomProbe for F {
    fn available(&self) -> usize {
        self()
    }
}

/// Probe for hosts without a meaningful memory limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlimitedHeadroom;

impl HeadroomProbe for UnlimitedHeadroom {
    fn available(&self) -> usize {
        usize::MAX
    }
}

/// Outcome of a rejected admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub available: usize,
    pub required: usize,
}

/// Stateless policy: admit when `available >= required + reserve`.
#[derive(Debug, Clone, Copy)]
pub struct ResourceGuard {
    reserve: usize,
}

impl ResourceGuard {
    pub fn new(reserve: usize) -> Self {
        Self { reserve }
    }

    pub fn reserve(&self) -> usize {
        self.reserve
    }

    pub fn check(&self, probe: &dyn HeadroomProbe, required: usize) -> Result<(), Rejection> {
        let available = probe.available();
        let needed = required.saturating_add(self.reserve);
        if available < needed {
            warn!(available, required, reserve = self.reserve, "Admission rejected");
            return Err(Rejection {
                available,
                required: needed,
            });
        }
        debug!(available, required, "Admission granted");
        Ok(())
    }

    pub fn admit(&self, probe: &dyn HeadroomProbe, required: usize) -> bool {
        self.check(probe, required).is_ok()
    }
}
