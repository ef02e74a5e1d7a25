//! types/heartrate.rs
//!
//! Defines the raw `SensorSample` delivered by a heart-rate sensor and the
//! `HeartRateReading` the monitor consumes once it has been normalized to
//! beats per minute.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit attached to a sensor quantity.
///
/// Serialized as the unit string the sensor reports (`"count/min"`,
/// `"count/s"`). Anything else is kept verbatim and treated as a foreign
/// quantity type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SampleUnit {
    #[default]
    BeatsPerMinute,
    BeatsPerSecond,
    Other(String),
}

impl From<String> for SampleUnit {
    fn from(unit: String) -> Self {
        match unit.as_str() {
            "count/min" | "bpm" => SampleUnit::BeatsPerMinute,
            "count/s" | "Hz" | "hz" => SampleUnit::BeatsPerSecond,
            _ => SampleUnit::Other(unit),
        }
    }
}

impl From<SampleUnit> for String {
    fn from(unit: SampleUnit) -> Self {
        match unit {
            SampleUnit::BeatsPerMinute => "count/min".to_string(),
            SampleUnit::BeatsPerSecond => "count/s".to_string(),
            SampleUnit::Other(other) => other,
        }
    }
}

impl fmt::Display for SampleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleUnit::BeatsPerMinute => f.write_str("count/min"),
            SampleUnit::BeatsPerSecond => f.write_str("count/s"),
            SampleUnit::Other(other) => f.write_str(other),
        }
    }
}

/// One quantity sample as handed over by the sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    #[serde(alias = "bpm")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: SampleUnit,
}

impl SensorSample {
    pub fn new(quantity: f64, unit: SampleUnit) -> Self {
        Self { quantity, unit }
    }

    /// Shorthand for a sample already expressed in beats per minute.
    pub fn bpm(quantity: f64) -> Self {
        Self::new(quantity, SampleUnit::BeatsPerMinute)
    }

    /// Convert the quantity to beats per minute.
    ///
    /// Returns `None` for a foreign unit or a quantity that cannot be a heart
    /// rate (negative, NaN or infinite).
    pub fn to_bpm(&self) -> Option<f64> {
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return None;
        }
        match self.unit {
            SampleUnit::BeatsPerMinute => Some(self.quantity),
            SampleUnit::BeatsPerSecond => Some(self.quantity * 60.0),
            SampleUnit::Other(_) => None,
        }
    }
}

/// Heart rate normalized to beats per minute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartRateReading {
    pub bpm: f64,
    pub timestamp: DateTime<Utc>,
}

impl HeartRateReading {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            timestamp: Utc::now(),
        }
    }

    /// Build a reading from a raw sample, dropping anything malformed.
    pub fn from_sample(sample: &SensorSample) -> Option<Self> {
        sample.to_bpm().map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        assert_eq!(SensorSample::bpm(72.0).to_bpm(), Some(72.0));
        assert_eq!(
            SensorSample::new(1.5, SampleUnit::BeatsPerSecond).to_bpm(),
            Some(90.0)
        );
        assert_eq!(
            SensorSample::new(5.0, SampleUnit::Other("mmHg".into())).to_bpm(),
            None
        );
    }

    #[test]
    fn test_malformed_quantities_are_rejected() {
        assert!(SensorSample::bpm(-1.0).to_bpm().is_none());
        assert!(SensorSample::bpm(f64::NAN).to_bpm().is_none());
        assert!(SensorSample::bpm(f64::INFINITY).to_bpm().is_none());
        assert_eq!(SensorSample::bpm(0.0).to_bpm(), Some(0.0));
    }

    #[test]
    fn test_sample_json_shape() {
        let sample: SensorSample =
            serde_json::from_str(r#"{"quantity": 104.0, "unit": "count/min"}"#).unwrap();
        assert_eq!(sample, SensorSample::bpm(104.0));

        // Unit defaults to beats per minute
        let sample: SensorSample = serde_json::from_str(r#"{"quantity": 88.0}"#).unwrap();
        assert_eq!(sample.unit, SampleUnit::BeatsPerMinute);

        let json = serde_json::to_string(&SensorSample::new(2.0, SampleUnit::BeatsPerSecond)).unwrap();
        assert!(json.contains("\"count/s\""));
    }

    #[test]
    fn test_foreign_unit_round_trips_verbatim() {
        let unit = SampleUnit::from("degC".to_string());
        assert_eq!(unit, SampleUnit::Other("degC".into()));
        assert_eq!(String::from(unit), "degC");
    }
}
