//! ONNX classifier backend

use crate::error::{BundleError, PredictError};
use crate::models::classifier::{Classifier, RawLabel};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Bundle entry for a classifier exported to ONNX.
///
/// The export must produce a `[1, n_classes]` float probability tensor
/// (skl2onnx with `zipmap` disabled), in the order of `classes`.
#[derive(Debug, Deserialize)]
pub struct OnnxSpec {
    pub(crate) classes: Vec<RawLabel>,
    pub n_features: usize,
    /// Model file, relative to the bundle file
    pub path: PathBuf,
    #[serde(default)]
    pub input_name: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
    /// Intra-op threads for ONNX Runtime
    #[serde(default = "default_onnx_threads")]
    pub threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// ONNX Runtime session wrapped as a [`Classifier`]
pub struct OnnxClassifier {
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    classes: Vec<String>,
    n_features: usize,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    pub fn load(spec: OnnxSpec, classes: Vec<String>, base_dir: &Path) -> Result<Self, BundleError> {
        let path = base_dir.join(&spec.path);
        let model_err = |e: &dyn fmt::Display| {
            BundleError::Model(format!("failed to load ONNX model {}: {}", path.display(), e))
        };

        info!(path = %path.display(), threads = spec.threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| model_err(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_err(&e))?
            .with_intra_threads(spec.threads)
            .map_err(|e| model_err(&e))?
            .commit_from_file(&path)
            .map_err(|e| model_err(&e))?;

        let input_name = match spec.input_name {
            Some(name) => name,
            None => session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "float_input".to_string()),
        };

        let output_name = match spec.output_name {
            Some(name) => name,
            None => session
                .outputs
                .iter()
                .find(|o| o.name.contains("prob"))
                .or_else(|| session.outputs.last())
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "probabilities".to_string()),
        };

        info!(
            input = %input_name,
            output = %output_name,
            classes = classes.len(),
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            classes,
            n_features: spec.n_features,
            input_name,
            output_name,
        })
    }
}

impl fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("classes", &self.classes)
            .field("n_features", &self.n_features)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, PredictError> {
        if row.len() != self.n_features {
            return Err(PredictError::ShapeMismatch(format!(
                "row has {} features, model expects {}",
                row.len(),
                self.n_features
            )));
        }

        let backend = |e: &dyn fmt::Display| PredictError::Backend(e.to_string());

        // Input tensor shape [1, num_features]
        let shape = vec![1_i64, row.len() as i64];
        let data: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        let input_tensor = Tensor::from_array((shape, data)).map_err(|e| backend(&e))?;

        // A panic inside a previous run must not disable the model
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| backend(&e))?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            PredictError::Backend(format!("model has no output '{}'", self.output_name))
        })?;
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| backend(&e))?;
        let proba = class_probabilities(shape, data, self.classes.len())?;

        debug!(output = %self.output_name, "Extracted probabilities from tensor");
        Ok(proba)
    }
}

/// Read the first row of a `[1, n_classes]` probability tensor.
fn class_probabilities(shape: &[i64], data: &[f32], n_classes: usize) -> Result<Vec<f64>, PredictError> {
    let width = shape.last().copied().unwrap_or(0);
    if width != n_classes as i64 || data.len() < n_classes {
        return Err(PredictError::ShapeMismatch(format!(
            "probability output has shape {:?}, expected [1, {}]",
            shape, n_classes
        )));
    }
    Ok(data[..n_classes].iter().map(|&p| f64::from(p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec: OnnxSpec = serde_json::from_str(
            r#"{"classes": ["a", "b"], "n_features": 11, "path": "career_fit_model.onnx"}"#,
        )
        .unwrap();
        assert_eq!(spec.threads, 1);
        assert!(spec.input_name.is_none());
        assert_eq!(spec.path, PathBuf::from("career_fit_model.onnx"));
    }

    #[test]
    fn test_missing_model_file() {
        let spec: OnnxSpec = serde_json::from_str(
            r#"{"classes": ["a", "b"], "n_features": 2, "path": "does_not_exist.onnx"}"#,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxClassifier::load(spec, vec!["a".into(), "b".into()], dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::Model(_)));
    }

    #[test]
    fn test_class_probabilities_from_output() {
        let proba = class_probabilities(&[1, 3], &[0.25, 0.5, 0.25], 3).unwrap();
        assert_eq!(proba, vec![0.25, 0.5, 0.25]);

        // Label output or wrong class count
        let err = class_probabilities(&[1], &[2.0], 3).unwrap_err();
        assert!(matches!(err, PredictError::ShapeMismatch(_)));
        let err = class_probabilities(&[1, 2], &[0.4, 0.6], 3).unwrap_err();
        assert!(matches!(err, PredictError::ShapeMismatch(_)));
    }
}
