//! Error types for bundle loading, feature encoding and inference

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating or reading the model bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// None of the candidate artifact paths exist.
    #[error("model bundle not found; place the model bundle at one of: {}", display_paths(.candidates))]
    Missing { candidates: Vec<PathBuf> },

    /// An artifact exists but cannot be used.
    #[error("invalid model bundle {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    /// The bundle declares a feature layout the encoder cannot serve.
    #[error("invalid feature schema: {0}")]
    Schema(String),

    /// The classifier definition is inconsistent.
    #[error("invalid model definition: {0}")]
    Model(String),
}

/// Errors raised while turning a person's input into an encoded row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// Required feature columns are absent after encoding.
    #[error("missing feature columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// A grade has no entry in the grade-to-points table.
    #[error("grade '{grade}' for '{column}' has no points mapping")]
    UnmappedGrade { column: String, grade: String },

    /// A form value is outside its allowed range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised by a single inference call.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Encoded row does not match what the model expects.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The model backend failed.
    #[error("inference backend error: {0}")]
    Backend(String),
}

impl PredictError {
    /// Short machine-readable kind, used in error replies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::Encode(EncodeError::SchemaMismatch { .. }) => "schema_mismatch",
            PredictError::Encode(EncodeError::UnmappedGrade { .. }) => "unmapped_grade",
            PredictError::Encode(EncodeError::InvalidInput(_)) => "invalid_input",
            PredictError::ShapeMismatch(_) => "shape_mismatch",
            PredictError::Backend(_) => "backend",
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_candidates() {
        let err = BundleError::Missing {
            candidates: vec![
                PathBuf::from("career_fit_model.json"),
                PathBuf::from("artifacts/career_fit_model.json"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("career_fit_model.json, artifacts/career_fit_model.json"));

        let err = BundleError::Missing {
            candidates: vec![PathBuf::from("models/other.json")],
        };
        assert_eq!(
            err.to_string(),
            "model bundle not found; place the model bundle at one of: models/other.json"
        );
    }

    #[test]
    fn test_error_kinds() {
        let err = PredictError::from(EncodeError::SchemaMismatch {
            missing: vec!["GPA".to_string()],
        });
        assert_eq!(err.kind(), "schema_mismatch");
        assert_eq!(err.to_string(), "missing feature columns: GPA");
        assert_eq!(PredictError::Backend("boom".into()).kind(), "backend");
    }
}
