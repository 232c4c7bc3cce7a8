//! Sensor Payload Validator

use crate::error::ValidationError;
use feature_engine::{RawReading, BASE_COLUMNS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Number of positional values a reading must carry
    pub expected_values: usize,
    /// Prefix of the positional query parameters (`s1`..`s4`)
    pub query_prefix: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            expected_values: BASE_COLUMNS.len(),
            query_prefix: "s".to_string(),
        }
    }
}

/// Validator for incoming sensor payloads
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate already-numeric positional values
    pub fn validate_values(&self, values: &[f64]) -> Result<RawReading, ValidationError> {
        self.check_count(values.len())?;
        for (idx, value) in values.iter().enumerate() {
            Self::check_finite(&format!("sensor_values[{idx}]"), *value)?;
        }
        RawReading::from_values(values).map_err(|e| ValidationError::InvalidFormat(e.to_string()))
    }

    /// Validate the elements of a JSON `sensor_values` array
    pub fn parse_json_values(&self, values: &[Value]) -> Result<RawReading, ValidationError> {
        self.check_count(values.len())?;

        let numbers = values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                value.as_f64().ok_or_else(|| ValidationError::NotNumeric {
                    field: format!("sensor_values[{idx}]"),
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        self.validate_values(&numbers)
    }

    /// Validate positional query parameters `s1`..`sN` (base-1 indexed)
    pub fn parse_query(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<RawReading, ValidationError> {
        let positional = params
            .keys()
            .filter(|key| self.positional_index(key).is_some())
            .count();
        self.check_count(positional)?;

        let mut values = Vec::with_capacity(self.config.expected_values);
        for position in 1..=self.config.expected_values {
            let key = format!("{}{}", self.config.query_prefix, position);
            let raw = params
                .get(&key)
                .ok_or_else(|| ValidationError::MissingField(key.clone()))?;
            let value = raw.trim().parse::<f64>().map_err(|_| ValidationError::NotNumeric {
                field: key.clone(),
                value: raw.clone(),
            })?;
            Self::check_finite(&key, value)?;
            values.push(value);
        }

        debug!("Parsed {} positional query values", values.len());
        RawReading::from_values(&values).map_err(|e| ValidationError::InvalidFormat(e.to_string()))
    }

    /// Require an optional field to be present and finite
    pub fn require_field(&self, field: &str, value: Option<f64>) -> Result<f64, ValidationError> {
        let value = value.ok_or_else(|| ValidationError::MissingField(field.to_string()))?;
        Self::check_finite(field, value)?;
        Ok(value)
    }

    fn positional_index(&self, key: &str) -> Option<usize> {
        key.strip_prefix(self.config.query_prefix.as_str())
            .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|rest| rest.parse::<usize>().ok())
            .filter(|idx| *idx >= 1)
    }

    fn check_count(&self, actual: usize) -> Result<(), ValidationError> {
        if actual != self.config.expected_values {
            return Err(ValidationError::WrongCount {
                expected: self.config.expected_values,
                actual,
            });
        }
        Ok(())
    }

    fn check_finite(field: &str, value: f64) -> Result<(), ValidationError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFinite {
                field: field.to_string(),
            })
        }
    }
}
