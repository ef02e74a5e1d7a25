//! Box-breathing exercise
//!
//! - **Phase**: one step of the four-part cycle
//!   (`BreatheIn → HoldIn → BreatheOut → HoldOut`), four seconds each.
//! - **Driver**: decides when a session starts and ends from heart-rate
//!   readings, advances phases on its own timer, and gates haptic cues
//!   behind a cooldown.

pub mod driver;
pub mod phase;

pub use driver::{
    BreathingDriver, DriverTick, Observation, PhaseChange, SessionTransition, HAPTIC_COOLDOWN,
    HIGH_HEART_RATE_BPM, PHASE_INTERVAL,
};
pub use phase::BreathingPhase;
