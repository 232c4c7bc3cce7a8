//! Raw Sensor Readings

use crate::FeatureError;
use serde::{Deserialize, Serialize};

/// Base column names, in the positional order the device sends them
pub const BASE_COLUMNS: [&str; 4] = ["ir", "red", "heart_rate", "gsr"];

/// One sample of the four sensor channels the model consumes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Infrared optical channel
    pub ir: f64,
    /// Red optical channel
    pub red: f64,
    /// Heart rate (bpm)
    pub heart_rate: f64,
    /// Galvanic skin response
    pub gsr: f64,
}

impl RawReading {
    pub fn new(ir: f64, red: f64, heart_rate: f64, gsr: f64) -> Self {
        Self {
            ir,
            red,
            heart_rate,
            gsr,
        }
    }

    /// Build a reading from positional values `[ir, red, heart_rate, gsr]`.
    ///
    /// Values beyond the fourth are ignored here; callers that need an exact
    /// count validate it before reaching this point.
    pub fn from_values(values: &[f64]) -> Result<Self, FeatureError> {
        match values {
            [ir, red, heart_rate, gsr, ..] => Ok(Self::new(*ir, *red, *heart_rate, *gsr)),
            _ => Err(FeatureError::MissingBaseValues {
                expected: BASE_COLUMNS.len(),
                actual: values.len(),
            }),
        }
    }

    /// Values in `BASE_COLUMNS` order
    pub fn values(&self) -> [f64; 4] {
        [self.ir, self.red, self.heart_rate, self.gsr]
    }
}

/// Extra channels reported by the device; persisted but never classified
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedFields {
    pub spo2: Option<f64>,
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
    /// Skin temperature
    pub temp: Option<f64>,
}
