//! Data types shared between the sensor side and the monitor.

pub mod heartrate;

pub use heartrate::{HeartRateReading, SampleUnit, SensorSample};
