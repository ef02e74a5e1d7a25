use serde::{Deserialize, Serialize};

use crate::breathing::BreathingPhase;

/// Read-only view of the monitor state, published on every change.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Latest heart rate in BPM, 0 while not monitoring.
    pub current_heart_rate: f64,
    pub is_authorized: bool,
    pub is_monitoring: bool,
    pub breathing_state: BreathingPhase,
    pub is_breathing_exercise_active: bool,
}

impl MonitorSnapshot {
    /// Phase label to show, only while an exercise is running.
    pub fn breathing_message(&self) -> Option<&'static str> {
        if self.is_breathing_exercise_active {
            self.breathing_state.display_message()
        } else {
            None
        }
    }
}
