//! Haptic actuator abstraction
//!
//! A pulse is a fire-and-forget side effect: no parameters, no result, and
//! implementations must return without blocking the update task.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something that can tap the wearer's wrist.
pub trait HapticActuator: Send + Sync {
    fn pulse(&self);
}

/// Actuator for headless runs: logs each pulse and optionally rings the
/// terminal bell.
#[derive(Debug, Default)]
pub struct LogHaptic {
    bell: bool,
    pulses: AtomicU64,
}

impl LogHaptic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }

    /// Number of pulses fired so far.
    pub fn count(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl HapticActuator for LogHaptic {
    fn pulse(&self) {
        let n = self.pulses.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("[Haptic] pulse #{}", n);
        if self.bell {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
    }
}
