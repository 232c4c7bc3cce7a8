//! Feature Vector Assembly

use crate::reading::{RawReading, BASE_COLUMNS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Value substituted for a red channel reading of exactly zero
pub const RED_ZERO_REPLACEMENT: f64 = 0.001;

/// Column names produced by [`engineer`], in output order
pub const ENGINEERED_COLUMNS: [&str; 14] = [
    "ir",
    "red",
    "heart_rate",
    "gsr",
    "ir_to_red_ratio",
    "ir_log",
    "red_log",
    "heart_rate_log",
    "gsr_log",
    "ir_heart_rate",
    "red_heart_rate",
    "gsr_heart_rate",
    "heart_rate_squared",
    "gsr_squared",
];

/// Ordered, named feature vector for one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build a vector from parallel name and value lists.
    ///
    /// Panics if the lists differ in length.
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        assert_eq!(names.len(), values.len(), "feature names and values must align");
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    /// Align this vector to the column list a model was fitted on.
    ///
    /// The result has exactly `feature_names.len()` entries in that order.
    /// Columns the model expects but this vector lacks are zero; columns this
    /// vector has but the model does not know are dropped.
    pub fn reconcile(&self, feature_names: &[String]) -> FeatureVector {
        let mut filled = 0usize;
        let values: Vec<f64> = feature_names
            .iter()
            .map(|name| match self.get(name) {
                Some(value) => value,
                None => {
                    filled += 1;
                    0.0
                }
            })
            .collect();

        if filled > 0 || self.len() != feature_names.len() {
            debug!(
                "Reconciled feature vector: {} computed, {} expected, {} zero-filled",
                self.len(),
                feature_names.len(),
                filled
            );
        }

        FeatureVector {
            names: feature_names.to_vec(),
            values,
        }
    }
}

/// Engineer features for a single reading.
///
/// The log transform takes its column minimum over the rows passed in, so for
/// a single reading the minimum is the value itself and any non-positive value
/// maps to `ln_1p(1)`. Serving parity depends on this; do not clamp.
pub fn engineer(reading: &RawReading) -> FeatureVector {
    engineer_batch(std::slice::from_ref(reading))
        .pop()
        .unwrap_or_else(|| FeatureVector::new(Vec::new(), Vec::new()))
}

/// Engineer features for a batch of readings, sharing column minimums
pub fn engineer_batch(readings: &[RawReading]) -> Vec<FeatureVector> {
    let mut mins = [f64::INFINITY; 4];
    for reading in readings {
        for (min, value) in mins.iter_mut().zip(reading.values()) {
            *min = min.min(value);
        }
    }

    readings.iter().map(|r| engineer_row(r, &mins)).collect()
}

fn engineer_row(reading: &RawReading, mins: &[f64; 4]) -> FeatureVector {
    let base = reading.values();
    let mut values = Vec::with_capacity(ENGINEERED_COLUMNS.len());

    values.extend_from_slice(&base);

    let red = if reading.red == 0.0 {
        RED_ZERO_REPLACEMENT
    } else {
        reading.red
    };
    values.push(reading.ir / red);

    for (value, min) in base.iter().zip(mins) {
        values.push(log_feature(*value, *min));
    }

    values.push(reading.ir * reading.heart_rate);
    values.push(reading.red * reading.heart_rate);
    values.push(reading.gsr * reading.heart_rate);

    values.push(reading.heart_rate * reading.heart_rate);
    values.push(reading.gsr * reading.gsr);

    debug_assert_eq!(values.len(), ENGINEERED_COLUMNS.len());
    debug_assert_eq!(&ENGINEERED_COLUMNS[..BASE_COLUMNS.len()], &BASE_COLUMNS[..]);

    FeatureVector {
        names: ENGINEERED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        values,
    }
}

fn log_feature(value: f64, column_min: f64) -> f64 {
    if column_min <= 0.0 {
        (value - column_min + 1.0).ln_1p()
    } else {
        value.ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> RawReading {
        RawReading::new(2230.0, 1312.0, 88.0, 1453.0)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_engineered_columns_and_values() {
        let features = engineer(&sample());

        assert_eq!(features.len(), ENGINEERED_COLUMNS.len());
        assert_eq!(features.names()[0], "ir");
        assert_eq!(features.get("ir_to_red_ratio"), Some(2230.0 / 1312.0));
        assert_eq!(features.get("ir_log"), Some(2230.0f64.ln_1p()));
        assert_eq!(features.get("gsr_heart_rate"), Some(1453.0 * 88.0));
        assert_eq!(features.get("heart_rate_squared"), Some(88.0 * 88.0));
        assert_eq!(features.get("gsr_squared"), Some(1453.0 * 1453.0));
    }

    #[test]
    fn test_zero_red_is_replaced() {
        let features = engineer(&RawReading::new(5.0, 0.0, 70.0, 1.0));
        assert_eq!(features.get("ir_to_red_ratio"), Some(5.0 / RED_ZERO_REPLACEMENT));
    }

    #[test]
    fn test_single_row_log_quirk() {
        // Non-positive values shift by their own minimum, collapsing to ln(2)
        let features = engineer(&RawReading::new(-40.0, 0.0, 70.0, 2.0));
        assert_eq!(features.get("ir_log"), Some(1.0f64.ln_1p()));
        assert_eq!(features.get("red_log"), Some(1.0f64.ln_1p()));
        assert_eq!(features.get("heart_rate_log"), Some(70.0f64.ln_1p()));
    }

    #[test]
    fn test_batch_uses_column_minimum() {
        let batch = engineer_batch(&[
            RawReading::new(-2.0, 1.0, 60.0, 1.0),
            RawReading::new(3.0, 1.0, 60.0, 1.0),
        ]);
        assert_eq!(batch[1].get("ir_log"), Some((3.0f64 + 2.0 + 1.0).ln_1p()));
        assert_eq!(engineer_batch(&[sample()])[0], engineer(&sample()));
    }

    #[test]
    fn test_reconcile_fills_and_drops() {
        let features = engineer(&sample());
        let expected = names(&["gsr", "unknown_feature", "ir"]);

        let aligned = features.reconcile(&expected);
        assert_eq!(aligned.names(), expected.as_slice());
        assert_eq!(aligned.values(), &[1453.0, 0.0, 2230.0]);
    }

    proptest! {
        #[test]
        fn prop_engineer_is_deterministic(
            ir in -1e5f64..1e5, red in -1e5f64..1e5, hr in 0f64..250.0, gsr in -1e4f64..1e4
        ) {
            let reading = RawReading::new(ir, red, hr, gsr);
            let a = engineer(&reading);
            let b = engineer(&reading);
            prop_assert_eq!(a.names(), b.names());
            let bits_a: Vec<u64> = a.values().iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u64> = b.values().iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(bits_a, bits_b);
        }

        #[test]
        fn prop_reconcile_matches_name_list(
            picks in proptest::collection::vec(0usize..20, 0..30),
            ir in 1f64..1e4, hr in 40f64..200.0
        ) {
            let features = engineer(&RawReading::new(ir, 500.0, hr, 300.0));
            let wanted: Vec<String> = picks
                .iter()
                .map(|i| {
                    ENGINEERED_COLUMNS
                        .get(*i)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("extra_{i}"))
                })
                .collect();

            let aligned = features.reconcile(&wanted);
            prop_assert_eq!(aligned.len(), wanted.len());
            prop_assert_eq!(aligned.names(), wanted.as_slice());
        }
    }
}
