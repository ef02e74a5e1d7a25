//! The breathing phases of a box-breathing cycle.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One step of the breathing cycle, or `Idle` when no exercise is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreathingPhase {
    #[default]
    Idle,
    BreatheIn,
    HoldIn,
    BreatheOut,
    HoldOut,
}

impl BreathingPhase {
    /// The four active phases in cycle order.
    pub const CYCLE: [BreathingPhase; 4] = [
        BreathingPhase::BreatheIn,
        BreathingPhase::HoldIn,
        BreathingPhase::BreatheOut,
        BreathingPhase::HoldOut,
    ];

    /// Label shown to the wearer, `None` while idle.
    pub fn display_message(self) -> Option<&'static str> {
        match self {
            BreathingPhase::Idle => None,
            BreathingPhase::HoldIn | BreathingPhase::HoldOut => Some("Hold"),
            BreathingPhase::BreatheIn => Some("Breathe In"),
            BreathingPhase::BreatheOut => Some("Release"),
        }
    }

    /// Advertised haptic cue rate in pulses per second.
    pub fn pulse_rate(self) -> u32 {
        match self {
            BreathingPhase::Idle => 0,
            BreathingPhase::HoldIn | BreathingPhase::HoldOut => 4,
            BreathingPhase::BreatheIn | BreathingPhase::BreatheOut => 2,
        }
    }

    /// Spacing between cues at the advertised pulse rate.
    pub fn cue_interval(self) -> Option<Duration> {
        match self.pulse_rate() {
            0 => None,
            rate => Some(Duration::from_secs(1) / rate),
        }
    }

    /// The phase that follows this one. `Idle` leads into `BreatheIn`.
    pub fn next(self) -> BreathingPhase {
        match self {
            BreathingPhase::Idle => BreathingPhase::BreatheIn,
            BreathingPhase::BreatheIn => BreathingPhase::HoldIn,
            BreathingPhase::HoldIn => BreathingPhase::BreatheOut,
            BreathingPhase::BreatheOut => BreathingPhase::HoldOut,
            BreathingPhase::HoldOut => BreathingPhase::BreatheIn,
        }
    }

    pub fn is_idle(self) -> bool {
        self == BreathingPhase::Idle
    }
}

impl fmt::Display for BreathingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreathingPhase::Idle => "idle",
            BreathingPhase::BreatheIn => "breathe-in",
            BreathingPhase::HoldIn => "hold-in",
            BreathingPhase::BreatheOut => "breathe-out",
            BreathingPhase::HoldOut => "hold-out",
        };
        f.write_str(name)
    }
}
