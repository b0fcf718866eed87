//! Career prediction over a loaded bundle

use crate::error::{EncodeError, PredictError};
use crate::feature_encoder::EncodedRow;
use crate::models::aggregator::{argmax, normalize};
use crate::models::bundle::Bundle;
use crate::types::person::PersonInput;
use crate::types::prediction::PredictionResult;
use std::sync::Arc;
use tracing::debug;

/// Encodes submissions and queries the bundled classifier.
///
/// Holds the bundle read-only; a failed request leaves it untouched for
/// the next one.
#[derive(Clone)]
pub struct Predictor {
    bundle: Arc<Bundle>,
}

impl Predictor {
    pub fn new(bundle: Arc<Bundle>) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// Encode a submission into the bundle's feature layout
    pub fn encode(&self, person: &PersonInput) -> Result<EncodedRow, EncodeError> {
        self.bundle.encoder().encode(person)
    }

    /// Encode then predict
    pub fn predict(&self, person: &PersonInput) -> Result<PredictionResult, PredictError> {
        let row = self.encode(person)?;
        self.predict_row(row)
    }

    /// Predict for an already encoded row.
    ///
    /// The row's columns must be exactly the bundle's feature columns, in
    /// order. The label is the most probable class.
    pub fn predict_row(&self, row: EncodedRow) -> Result<PredictionResult, PredictError> {
        let expected = self.bundle.feature_cols();
        if row.columns() != expected.as_slice() {
            return Err(PredictError::ShapeMismatch(format!(
                "row columns [{}] do not match feature_cols [{}]",
                row.columns().join(", "),
                expected.join(", ")
            )));
        }

        let classifier = self.bundle.classifier();
        let classes = classifier.classes();
        let raw = classifier.predict_proba(row.values())?;

        if raw.len() != classes.len() {
            return Err(PredictError::ShapeMismatch(format!(
                "model returned {} probabilities for {} classes",
                raw.len(),
                classes.len()
            )));
        }
        let proba = normalize(&raw)
            .ok_or_else(|| PredictError::Backend(format!("model returned invalid probabilities {:?}", raw)))?;
        let best = argmax(&proba)
            .ok_or_else(|| PredictError::Backend("empty probability vector".to_string()))?;
        let label = classes[best].clone();

        debug!(
            model = classifier.name(),
            label = %label,
            probability = proba[best],
            "Prediction complete"
        );

        let pairs = classes.iter().cloned().zip(proba).collect();
        Ok(PredictionResult::new(label, pairs, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bundle::tests::bundle_json;
    use crate::types::person::Gender;
    use std::path::Path;

    fn predictor(leading: &[&str]) -> Predictor {
        let json = bundle_json(leading, None);
        Predictor::new(Arc::new(Bundle::from_json_str(&json, Path::new(".")).unwrap()))
    }

    #[test]
    fn test_predict_form_defaults() {
        let predictor = predictor(&["เพศ", "ชั้นปี", "GPA"]);
        let result = predictor.predict(&PersonInput::default()).unwrap();

        assert_eq!(result.label, "Software Developer");
        assert_eq!(result.probabilities.len(), 3);
        assert_eq!(result.probabilities[0].label, "Software Developer");

        let sum: f64 = result.probabilities.iter().map(|p| p.probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);

        let expected = (2.0 / 3.0 + 0.75) / 2.0;
        let developer = result.probability_of("Software Developer").unwrap();
        assert!((developer - expected).abs() < 1e-9);

        assert_eq!(result.encoded_row.columns(), predictor.bundle().feature_cols().as_slice());
        assert_eq!(result.encoded_row.get("GPA"), Some(3.20));
    }

    #[test]
    fn test_one_hot_bundle() {
        let predictor = predictor(&["ชั้นปี", "GPA", "เพศ_หญิง", "เพศ_ชาย"]);
        let result = predictor.predict(&PersonInput::default()).unwrap();
        assert_eq!(result.encoded_row.get("เพศ_หญิง"), Some(1.0));
        assert_eq!(result.encoded_row.get("เพศ_ชาย"), Some(0.0));
    }

    #[test]
    fn test_low_gpa_shifts_prediction() {
        let predictor = predictor(&["เพศ", "ชั้นปี", "GPA"]);
        let person = PersonInput::default()
            .with_grade("ระบบสารสนเทศเบื้องต้น", "C")
            .with_grade("การเขียนโปรแกรมคอมพิวเตอร์เบื้องต้น", "C");
        let person = PersonInput {
            gender: Gender::Male,
            gpa: 2.5,
            ..person
        };

        let result = predictor.predict(&person).unwrap();
        assert_eq!(result.label, "Marketing Officer");
    }

    #[test]
    fn test_reordered_row_rejected() {
        let predictor = predictor(&["เพศ", "ชั้นปี", "GPA"]);
        let row = predictor.encode(&PersonInput::default()).unwrap();

        let mut columns = row.columns().to_vec();
        let mut values = row.values().to_vec();
        columns.swap(0, 1);
        values.swap(0, 1);

        let err = predictor.predict_row(EncodedRow::new(columns, values)).unwrap_err();
        assert!(matches!(err, PredictError::ShapeMismatch(_)));

        // The shared bundle is still usable afterwards
        assert!(predictor.predict(&PersonInput::default()).is_ok());
    }

    #[test]
    fn test_encode_failure_surfaces() {
        let predictor = predictor(&["GPA"]);
        let mut person = PersonInput::default();
        person.grades.clear();

        let err = predictor.predict(&person).unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn test_prediction_is_repeatable() {
        let predictor = predictor(&["เพศ", "ชั้นปี", "GPA"]);
        let a = predictor.predict(&PersonInput::default()).unwrap();
        let b = predictor.predict(&PersonInput::default()).unwrap();

        assert_eq!(a.label, b.label);
        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.encoded_row, b.encoded_row);
        assert_ne!(a.prediction_id, b.prediction_id);
    }

    #[test]
    fn test_shipped_bundle() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts/career_fit_model.json");
        let bundle = crate::models::BundleLoader::new([&path]).load().unwrap();
        assert_eq!(bundle.feature_count(), 11);
        assert_eq!(bundle.schema().gender_scheme(), crate::schema::GenderScheme::Binary);

        let result = Predictor::new(bundle).predict(&PersonInput::default()).unwrap();
        assert_eq!(result.probabilities.len(), 5);
        let sum: f64 = result.probabilities.iter().map(|p| p.probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(result.label, result.probabilities[0].label);
    }
}
