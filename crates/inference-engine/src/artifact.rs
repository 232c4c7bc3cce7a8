//! Trained Artifact Loading

use crate::model::{LinearModel, OnnxModel, Regressor};
use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Locations of the three files produced by training
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    /// `.onnx` graph or `.json` linear coefficients
    pub model_path: PathBuf,
    /// JSON scaler parameters
    pub scaler_path: PathBuf,
    /// JSON array of feature names, in fitted order
    pub features_path: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts/stress_model.onnx"),
            scaler_path: PathBuf::from("artifacts/stress_scaler.json"),
            features_path: PathBuf::from("artifacts/stress_features.json"),
        }
    }
}

/// Fitted per-column affine scaler: `(x - center) / scale`
///
/// Covers both standard (mean/std) and robust (median/IQR) scalers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    #[serde(alias = "mean")]
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    pub fn new(center: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { center, scale }
    }

    /// Scaler that leaves `n` columns unchanged
    pub fn identity(n: usize) -> Self {
        Self::new(vec![0.0; n], vec![1.0; n])
    }

    pub fn len(&self) -> usize {
        self.center.len()
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }

    /// Apply the fitted transform to one row
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if values.len() != self.center.len() {
            return Err(InferenceError::InputSchema(format!(
                "scaler fitted on {} columns, got {}",
                self.center.len(),
                values.len()
            )));
        }

        Ok(values
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(x, (center, scale))| {
                // Constant columns were fitted with zero scale; treat as unit
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - center) / scale
            })
            .collect())
    }
}

/// Immutable bundle of model, scaler and feature schema
pub struct TrainedArtifact {
    model: Box<dyn Regressor>,
    scaler: Scaler,
    feature_names: Vec<String>,
}

impl std::fmt::Debug for TrainedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedArtifact")
            .field("model", &self.model.kind())
            .field("features", &self.feature_names.len())
            .finish()
    }
}

impl TrainedArtifact {
    /// Assemble an artifact, checking that its three parts agree
    pub fn new(
        model: Box<dyn Regressor>,
        scaler: Scaler,
        feature_names: Vec<String>,
    ) -> Result<Self, InferenceError> {
        if feature_names.is_empty() {
            return Err(InferenceError::unavailable("features", "feature name list is empty"));
        }

        let unique: HashSet<&String> = feature_names.iter().collect();
        if unique.len() != feature_names.len() {
            return Err(InferenceError::unavailable("features", "duplicate feature names"));
        }

        if scaler.center.len() != feature_names.len() || scaler.scale.len() != feature_names.len() {
            return Err(InferenceError::unavailable(
                "scaler",
                format!(
                    "scaler has {}/{} parameters for {} features",
                    scaler.center.len(),
                    scaler.scale.len(),
                    feature_names.len()
                ),
            ));
        }

        if let Some(n) = model.n_features() {
            if n != feature_names.len() {
                return Err(InferenceError::unavailable(
                    "model",
                    format!("model fitted on {} inputs, {} feature names", n, feature_names.len()),
                ));
            }
        }

        Ok(Self {
            model,
            scaler,
            feature_names,
        })
    }

    /// Load all three files; any failure is fatal for the caller
    pub fn load(paths: &ArtifactPaths) -> Result<Self, InferenceError> {
        let feature_names: Vec<String> = read_json(&paths.features_path)?;
        let scaler: Scaler = read_json(&paths.scaler_path)?;
        let model = load_model(&paths.model_path, feature_names.len())?;

        let artifact = Self::new(model, scaler, feature_names)?;
        info!(
            "Loaded trained artifact: {} model, {} features",
            artifact.model.kind(),
            artifact.feature_names.len()
        );
        Ok(artifact)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InferenceError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::unavailable(&display, e))?;
    serde_json::from_str(&raw).map_err(|e| InferenceError::unavailable(&display, e))
}

fn load_model(path: &Path, n_features: usize) -> Result<Box<dyn Regressor>, InferenceError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("onnx") => Ok(Box::new(OnnxModel::load(path, n_features)?)),
        Some("json") => Ok(Box::new(LinearModel::load(path)?)),
        other => Err(InferenceError::unavailable(
            path.display().to_string(),
            format!("unsupported model format {:?}", other.unwrap_or("")),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_artifacts(dir: &Path, names: &str, scaler: &str, model: &str) -> ArtifactPaths {
        let paths = ArtifactPaths {
            model_path: dir.join("model.json"),
            scaler_path: dir.join("scaler.json"),
            features_path: dir.join("features.json"),
        };
        fs::write(&paths.features_path, names).unwrap();
        fs::write(&paths.scaler_path, scaler).unwrap();
        fs::write(&paths.model_path, model).unwrap();
        paths
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = Scaler::new(vec![1.0, 10.0, 5.0], vec![2.0, 5.0, 0.0]);
        let scaled = scaler.transform(&[3.0, 0.0, 7.0]).unwrap();
        assert_eq!(scaled, vec![1.0, -2.0, 2.0]);
        assert!(scaler.transform(&[1.0]).is_err());
    }

    #[test]
    fn test_scaler_accepts_mean_alias() {
        let scaler: Scaler = serde_json::from_str(r#"{"mean": [1.0], "scale": [2.0]}"#).unwrap();
        assert_eq!(scaler, Scaler::new(vec![1.0], vec![2.0]));
    }

    #[test]
    fn test_load_linear_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(
            dir.path(),
            r#"["ir", "gsr"]"#,
            r#"{"center": [0.0, 0.0], "scale": [1.0, 1.0]}"#,
            r#"{"coefficients": [0.5, 0.25], "intercept": 1.0}"#,
        );

        let artifact = TrainedArtifact::load(&paths).unwrap();
        assert_eq!(artifact.feature_names(), &["ir".to_string(), "gsr".to_string()]);
        assert_eq!(artifact.model().kind(), "linear");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_artifacts(
            dir.path(),
            r#"["ir"]"#,
            r#"{"center": [0.0], "scale": [1.0]}"#,
            r#"{"coefficients": [1.0]}"#,
        );
        paths.scaler_path = dir.path().join("missing.json");

        let err = TrainedArtifact::load(&paths).unwrap_err();
        assert!(matches!(err, InferenceError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_inconsistent_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(
            dir.path(),
            r#"["ir", "gsr"]"#,
            r#"{"center": [0.0], "scale": [1.0]}"#,
            r#"{"coefficients": [0.5, 0.25]}"#,
        );
        assert!(matches!(
            TrainedArtifact::load(&paths),
            Err(InferenceError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_unsupported_model_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths =
            write_artifacts(dir.path(), r#"["ir"]"#, r#"{"center": [0.0], "scale": [1.0]}"#, "{}");
        paths.model_path = dir.path().join("model.joblib");
        fs::write(&paths.model_path, b"\x80\x04").unwrap();

        assert!(matches!(
            TrainedArtifact::load(&paths),
            Err(InferenceError::ModelUnavailable { .. })
        ));
    }
}
