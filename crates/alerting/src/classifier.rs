//! Stress Level Classification

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Discrete stress level; ordered `None < Moderate < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum StressLevel {
    None = 0,
    Moderate = 1,
    High = 2,
}

impl StressLevel {
    /// Wire value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StressLevel::None => "none",
            StressLevel::Moderate => "moderate",
            StressLevel::High => "high",
        }
    }
}

impl TryFrom<u8> for StressLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StressLevel::None),
            1 => Ok(StressLevel::Moderate),
            2 => Ok(StressLevel::High),
            other => Err(format!("invalid stress level {other}")),
        }
    }
}

impl Serialize for StressLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Invalid threshold configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("Thresholds must be finite (moderate={moderate}, high={high})")]
    NotFinite { moderate: f64, high: f64 },
    #[error("Moderate threshold {moderate} exceeds high threshold {high}")]
    Inverted { moderate: f64, high: f64 },
}

/// Score cut points, inclusive lower bounds of each level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressThresholds {
    pub high: f64,
    pub moderate: f64,
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            high: 17.0,
            moderate: 10.0,
        }
    }
}

impl StressThresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if !self.high.is_finite() || !self.moderate.is_finite() {
            return Err(ThresholdError::NotFinite {
                moderate: self.moderate,
                high: self.high,
            });
        }
        if self.moderate > self.high {
            return Err(ThresholdError::Inverted {
                moderate: self.moderate,
                high: self.high,
            });
        }
        Ok(())
    }
}

/// Piecewise-constant score to level mapping
#[derive(Debug, Clone, Copy)]
pub struct StressClassifier {
    thresholds: StressThresholds,
}

impl StressClassifier {
    pub fn new(thresholds: StressThresholds) -> Result<Self, ThresholdError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> StressThresholds {
        self.thresholds
    }

    pub fn classify(&self, score: f64) -> StressLevel {
        if score >= self.thresholds.high {
            StressLevel::High
        } else if score >= self.thresholds.moderate {
            StressLevel::Moderate
        } else {
            StressLevel::None
        }
    }
}

impl Default for StressClassifier {
    fn default() -> Self {
        Self {
            thresholds: StressThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries_are_inclusive() {
        let classifier = StressClassifier::default();
        assert_eq!(classifier.classify(9.999), StressLevel::None);
        assert_eq!(classifier.classify(10.0), StressLevel::Moderate);
        assert_eq!(classifier.classify(16.99), StressLevel::Moderate);
        assert_eq!(classifier.classify(17.0), StressLevel::High);
        assert_eq!(classifier.classify(250.0), StressLevel::High);
    }

    #[test]
    fn test_configured_thresholds() {
        let classifier = StressClassifier::new(StressThresholds {
            high: 20.0,
            moderate: 12.0,
        })
        .unwrap();
        assert_eq!(classifier.classify(17.0), StressLevel::Moderate);
        assert_eq!(classifier.classify(11.0), StressLevel::None);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(matches!(
            StressClassifier::new(StressThresholds { high: 5.0, moderate: 10.0 }),
            Err(ThresholdError::Inverted { .. })
        ));
        assert!(matches!(
            StressClassifier::new(StressThresholds { high: f64::NAN, moderate: 10.0 }),
            Err(ThresholdError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_level_wire_format() {
        assert_eq!(serde_json::to_string(&StressLevel::High).unwrap(), "2");
        let level: StressLevel = serde_json::from_str("1").unwrap();
        assert_eq!(level, StressLevel::Moderate);
        assert!(serde_json::from_str::<StressLevel>("3").is_err());
    }

    proptest! {
        #[test]
        fn prop_classify_is_monotonic(a in -100f64..100.0, b in -100f64..100.0) {
            let classifier = StressClassifier::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classifier.classify(lo) <= classifier.classify(hi));
        }
    }
}
