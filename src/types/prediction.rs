//! Prediction result data structures

use crate::feature_encoder::EncodedRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probability assigned to one career class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Outcome of one encode-then-predict cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Unique prediction identifier
    pub prediction_id: String,

    /// Recommended career
    pub label: String,

    /// Every known class, most likely first
    pub probabilities: Vec<ClassProbability>,

    /// Feature row the model was queried with
    pub encoded_row: EncodedRow,

    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    /// Build a result, ranking `(class, probability)` pairs descending.
    ///
    /// The sort is stable so equal probabilities keep the model's class order.
    pub fn new(label: String, class_probabilities: Vec<(String, f64)>, encoded_row: EncodedRow) -> Self {
        let mut probabilities: Vec<ClassProbability> = class_probabilities
            .into_iter()
            .map(|(label, probability)| ClassProbability { label, probability })
            .collect();
        probabilities.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            label,
            probabilities,
            encoded_row,
            timestamp: Utc::now(),
        }
    }

    /// Probability of a given class, if known
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }

    /// Highest class probability
    pub fn confidence(&self) -> f64 {
        self.probabilities.first().map(|p| p.probability).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> EncodedRow {
        EncodedRow::new(vec!["GPA".to_string()], vec![3.2])
    }

    #[test]
    fn test_ranked_descending() {
        let result = PredictionResult::new(
            "Developer".to_string(),
            vec![
                ("Analyst".to_string(), 0.2),
                ("Developer".to_string(), 0.5),
                ("Marketer".to_string(), 0.3),
            ],
            row(),
        );

        let labels: Vec<&str> = result.probabilities.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Developer", "Marketer", "Analyst"]);
        assert_eq!(result.confidence(), 0.5);
        assert_eq!(result.probability_of("Analyst"), Some(0.2));
        assert_eq!(result.probability_of("Nurse"), None);
    }

    #[test]
    fn test_ties_keep_class_order() {
        let result = PredictionResult::new(
            "a".to_string(),
            vec![("a".to_string(), 0.5), ("b".to_string(), 0.5)],
            row(),
        );
        assert_eq!(result.probabilities[0].label, "a");
        assert_eq!(result.probabilities[1].label, "b");
    }

    #[test]
    fn test_result_serialization() {
        let result = PredictionResult::new(
            "Developer".to_string(),
            vec![("Developer".to_string(), 1.0)],
            row(),
        );

        let json = serde_json::to_string(&result).unwrap();
        let deserialized: PredictionResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result.prediction_id, deserialized.prediction_id);
        assert_eq!(result.label, deserialized.label);
        assert_eq!(result.encoded_row, deserialized.encoded_row);
    }
}
