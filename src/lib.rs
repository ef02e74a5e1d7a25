// tachr - Heart-rate monitor with guided box breathing

pub mod breathing;
pub mod config;
pub mod face;
pub mod haptic;
pub mod monitor;
pub mod sensor;
pub mod types;

pub use breathing::{BreathingPhase, HAPTIC_COOLDOWN, HIGH_HEART_RATE_BPM, PHASE_INTERVAL};
pub use config::{HapticCue, MonitorConfig};
pub use haptic::{HapticActuator, LogHaptic};
pub use monitor::{HeartRateMonitor, MonitorError, MonitorHandle, MonitorSnapshot};
pub use sensor::{Authorization, HeartRateSource, SensorError};
pub use types::{HeartRateReading, SampleUnit, SensorSample};
