//! Model Backends

use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::pb;
use tract_onnx::prelude::*;

/// A fitted regressor producing one score per scaled feature row
pub trait Regressor: Send + Sync {
    /// Score one row of scaled features
    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError>;

    /// Number of inputs the model was fitted on, when the format records it
    fn n_features(&self) -> Option<usize> {
        None
    }

    /// Short backend name for logs
    fn kind(&self) -> &'static str;
}

/// Linear regressor exported as JSON coefficients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// Load from a JSON file `{"coefficients": [...], "intercept": f}`
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let display = path.display().to_string();
        let raw =
            std::fs::read_to_string(path).map_err(|e| InferenceError::unavailable(&display, e))?;
        let model: LinearModel =
            serde_json::from_str(&raw).map_err(|e| InferenceError::unavailable(&display, e))?;
        info!("Loaded linear model with {} coefficients", model.coefficients.len());
        Ok(model)
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError> {
        if features.len() != self.coefficients.len() {
            return Err(InferenceError::InputSchema(format!(
                "linear model expects {} features, got {}",
                self.coefficients.len(),
                features.len()
            )));
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.intercept)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

/// ONNX regressor evaluated with tract
pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    n_features: usize,
}

impl OnnxModel {
    /// Load and optimize an ONNX graph taking a `[1, n_features]` f32 input
    pub fn load(path: &Path, n_features: usize) -> Result<Self, InferenceError> {
        let source = path.display().to_string();
        let proto = tract_onnx::onnx()
            .proto_model_for_path(path)
            .map_err(|e| InferenceError::unavailable(&source, e))?;
        let model = Self::from_proto(&proto, n_features, &source)?;

        info!("Loaded ONNX model from {} ({} inputs)", source, n_features);
        Ok(model)
    }

    /// Optimize a decoded ONNX graph; `source` names it in errors
    pub fn from_proto(
        proto: &pb::ModelProto,
        n_features: usize,
        source: &str,
    ) -> Result<Self, InferenceError> {
        let plan = tract_onnx::onnx()
            .model_for_proto_model(proto)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, n_features]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::unavailable(source, e))?;

        Ok(Self { plan, n_features })
    }
}

impl Regressor for OnnxModel {
    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError> {
        if features.len() != self.n_features {
            return Err(InferenceError::InputSchema(format!(
                "ONNX model expects {} features, got {}",
                self.n_features,
                features.len()
            )));
        }

        let row: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.n_features), row)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let output = outputs.first().ok_or_else(|| {
            InferenceError::InferenceFailed("model produced no outputs".to_string())
        })?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let score = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| InferenceError::InferenceFailed("empty model output".to_string()))?;

        debug!("ONNX score: {}", score);
        Ok(f64::from(score))
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}
