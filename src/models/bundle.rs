//! Model bundle: classifier plus the feature contract it was trained with

use crate::error::BundleError;
use crate::feature_encoder::{FeatureEncoder, GradePoints};
use crate::models::classifier::{Classifier, ModelSpec};
use crate::schema::FeatureSchema;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk layout of a bundle file
#[derive(Debug, Deserialize)]
struct BundleFile {
    model: ModelSpec,
    feature_cols: Vec<String>,
    #[serde(default)]
    grade_to_points: Option<BTreeMap<String, f64>>,
}

/// A loaded, validated model bundle. Immutable once built.
#[derive(Debug)]
pub struct Bundle {
    classifier: Box<dyn Classifier>,
    encoder: FeatureEncoder,
    source: Option<PathBuf>,
}

impl Bundle {
    /// Assemble a bundle, checking the classifier against the feature columns.
    pub fn new(
        classifier: Box<dyn Classifier>,
        feature_cols: &[String],
        grade_points: GradePoints,
    ) -> Result<Self, BundleError> {
        let schema = FeatureSchema::resolve(feature_cols)?;

        if classifier.n_features() != schema.len() {
            return Err(BundleError::Schema(format!(
                "model expects {} features but feature_cols lists {}",
                classifier.n_features(),
                schema.len()
            )));
        }
        if classifier.classes().is_empty() {
            return Err(BundleError::Model("model declares no classes".to_string()));
        }

        Ok(Self {
            classifier,
            encoder: FeatureEncoder::new(schema, grade_points),
            source: None,
        })
    }

    /// Parse a bundle from JSON. Referenced files resolve against `base_dir`.
    pub fn from_json_str(json: &str, base_dir: &Path) -> Result<Self, BundleError> {
        let file: BundleFile = serde_json::from_str(json)
            .map_err(|e| BundleError::Model(format!("malformed bundle: {}", e)))?;

        let grade_points = match file.grade_to_points {
            Some(table) => GradePoints::new(table)?,
            None => GradePoints::default(),
        };
        let classifier = file.model.build(base_dir)?;

        Self::new(classifier, &file.feature_cols, grade_points)
    }

    /// Read and parse a bundle file.
    ///
    /// Every failure is reported as [`BundleError::Invalid`] naming the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let invalid = |reason: String| BundleError::Invalid {
            path: path.to_path_buf(),
            reason,
        };

        let json = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut bundle = Self::from_json_str(&json, base_dir).map_err(|e| invalid(e.to_string()))?;
        bundle.source = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            model = bundle.classifier.name(),
            features = bundle.feature_count(),
            classes = bundle.classes().len(),
            gender_scheme = %bundle.schema().gender_scheme(),
            "Model bundle loaded"
        );

        Ok(bundle)
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.encoder.schema()
    }

    pub fn grade_points(&self) -> &GradePoints {
        self.encoder.grade_points()
    }

    /// Feature columns in model order
    pub fn feature_cols(&self) -> Vec<String> {
        self.schema().feature_cols()
    }

    pub fn feature_count(&self) -> usize {
        self.schema().len()
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    /// File the bundle was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::GenderScheme;
    use crate::types::person::DEFAULT_SUBJECT_GRADES;

    /// Bundle JSON with the given leading columns followed by the eight
    /// default subjects. The forest has one stump on GPA and one on the
    /// first subject column.
    pub(crate) fn bundle_json(leading: &[&str], grade_table: Option<&str>) -> String {
        let mut cols: Vec<String> = leading.iter().map(|s| format!("\"{}\"", s)).collect();
        cols.extend(DEFAULT_SUBJECT_GRADES.iter().map(|(s, _)| format!("\"{}\"", s)));
        let n_features = cols.len();
        let gpa_index = leading.iter().position(|c| *c == "GPA").unwrap_or(0);
        let subject_index = leading.len();

        let grades = grade_table
            .map(|t| format!(r#", "grade_to_points": {}"#, t))
            .unwrap_or_default();

        format!(
            r#"{{
                "feature_cols": [{cols}],
                "model": {{
                    "kind": "random_forest",
                    "classes": ["Data Analyst", "Marketing Officer", "Software Developer"],
                    "n_features": {n_features},
                    "trees": [
                        {{"children_left": [1, -1, -1], "children_right": [2, -1, -1],
                          "feature": [{gpa_index}, -2, -2], "threshold": [3.0, -2.0, -2.0],
                          "value": [[3.0, 3.0, 3.0], [1.0, 2.0, 0.0], [1.0, 0.0, 2.0]]}},
                        {{"children_left": [1, -1, -1], "children_right": [2, -1, -1],
                          "feature": [{subject_index}, -2, -2], "threshold": [3.25, -2.0, -2.0],
                          "value": [[3.0, 3.0, 3.0], [2.0, 2.0, 0.0], [0.0, 1.0, 3.0]]}}
                    ]
                }}{grades}
            }}"#,
            cols = cols.join(", "),
        )
    }

    #[test]
    fn test_parse_binary_bundle() {
        let json = bundle_json(&["เพศ", "ชั้นปี", "GPA"], None);
        let bundle = Bundle::from_json_str(&json, Path::new(".")).unwrap();

        assert_eq!(bundle.feature_count(), 11);
        assert_eq!(bundle.schema().gender_scheme(), GenderScheme::Binary);
        assert_eq!(bundle.classes().len(), 3);
        assert_eq!(bundle.grade_points().points("D+"), Some(1.5));
        assert_eq!(bundle.classifier().name(), "random_forest");
        assert!(bundle.source().is_none());
    }

    #[test]
    fn test_custom_grade_table() {
        let json = bundle_json(&["GPA"], Some(r#"{"A": 10.0, "B": 5.0}"#));
        let bundle = Bundle::from_json_str(&json, Path::new(".")).unwrap();
        assert_eq!(bundle.grade_points().points("A"), Some(10.0));
        assert_eq!(bundle.grade_points().points("B+"), None);
    }

    #[test]
    fn test_feature_count_must_match_model() {
        let json = bundle_json(&["เพศ", "ชั้นปี", "GPA"], None).replace("\"n_features\": 11", "\"n_features\": 12");
        let err = Bundle::from_json_str(&json, Path::new(".")).unwrap_err();
        assert!(matches!(err, BundleError::Schema(_)));
    }

    #[test]
    fn test_required_fields() {
        let no_model = r#"{"feature_cols": ["GPA"]}"#;
        assert!(Bundle::from_json_str(no_model, Path::new(".")).is_err());

        let no_cols = r#"{"model": {"kind": "logistic_regression", "classes": ["a", "b"],
                          "coef": [[1.0]], "intercept": [0.0]}}"#;
        assert!(Bundle::from_json_str(no_cols, Path::new(".")).is_err());
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("career_fit_model.json");
        std::fs::write(&path, "not json").unwrap();

        match Bundle::from_file(&path).unwrap_err() {
            BundleError::Invalid { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_from_file_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("career_fit_model.json");
        std::fs::write(&path, bundle_json(&["เพศ_หญิง", "เพศ_ชาย", "ชั้นปี", "GPA"], None)).unwrap();

        let bundle = Bundle::from_file(&path).unwrap();
        assert_eq!(bundle.source(), Some(path.as_path()));
        assert_eq!(bundle.schema().gender_scheme(), GenderScheme::OneHot);
    }
}
