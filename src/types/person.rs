//! Form input for a single prediction request

use crate::error::EncodeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Letter grades offered by the form, best to worst.
pub const GRADE_OPTIONS: [&str; 8] = ["A", "B+", "B", "C+", "C", "D+", "D", "F"];

/// Subjects collected by the form, with the grade preselected for each.
pub const DEFAULT_SUBJECT_GRADES: [(&str, &str); 8] = [
    ("ระบบสารสนเทศเบื้องต้น", "B+"),
    ("โครงสร้างระบบคอมพิวเตอร์", "B"),
    ("การเขียนโปรแกรมคอมพิวเตอร์เบื้องต้น", "A"),
    ("หลักการตลาด", "B"),
    ("โลจิสติกส์และการผลิต", "B"),
    ("โปรแกรมประยุกต์เพื่อทางธุรกิจ", "B+"),
    ("เทคโนโลยีอินเทอร์เน็ต", "B+"),
    ("ระบบการสื่อสารและเครือข่าย 1", "B"),
];

/// Student gender as offered by the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "ชาย", alias = "male")]
    Male,
    #[serde(rename = "หญิง", alias = "female")]
    Female,
}

impl Gender {
    /// Form label
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "ชาย",
            Gender::Female => "หญิง",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ชาย" | "male" | "m" => Ok(Gender::Male),
            "หญิง" | "female" | "f" => Ok(Gender::Female),
            other => Err(EncodeError::InvalidInput(format!(
                "unknown gender '{}', expected ชาย/male or หญิง/female",
                other
            ))),
        }
    }
}

/// Raw values submitted for one student.
///
/// Serializes as a flat object keyed by the same names the model columns use,
/// e.g. `{"เพศ": "หญิง", "ชั้นปี": 4, "GPA": 3.2, "หลักการตลาด": "B", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonInput {
    /// Always required, even for bundles whose model ignores gender, so
    /// one submission stays valid against any bundle.
    #[serde(rename = "เพศ", alias = "gender")]
    pub gender: Gender,

    /// Study year (1-4)
    #[serde(rename = "ชั้นปี", alias = "year")]
    pub year: u8,

    /// Cumulative GPA (0.00-4.00)
    #[serde(rename = "GPA", alias = "gpa")]
    pub gpa: f64,

    /// Subject name to letter grade
    #[serde(flatten)]
    pub grades: BTreeMap<String, String>,
}

impl PersonInput {
    /// Create an input with no subject grades yet
    pub fn new(gender: Gender, year: u8, gpa: f64) -> Self {
        Self {
            gender,
            year,
            gpa,
            grades: BTreeMap::new(),
        }
    }

    /// Set the grade for one subject
    pub fn with_grade(mut self, subject: impl Into<String>, grade: impl Into<String>) -> Self {
        self.grades.insert(subject.into(), grade.into());
        self
    }

    /// Check the ranges the form enforces.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if !(1..=4).contains(&self.year) {
            return Err(EncodeError::InvalidInput(format!(
                "year must be between 1 and 4, got {}",
                self.year
            )));
        }
        if !self.gpa.is_finite() || !(0.0..=4.0).contains(&self.gpa) {
            return Err(EncodeError::InvalidInput(format!(
                "GPA must be between 0.00 and 4.00, got {}",
                self.gpa
            )));
        }
        Ok(())
    }
}

impl Default for PersonInput {
    /// The values the form is prefilled with.
    fn default() -> Self {
        DEFAULT_SUBJECT_GRADES
            .iter()
            .fold(Self::new(Gender::Female, 4, 3.20), |input, (subject, grade)| {
                input.with_grade(*subject, *grade)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_form() {
        let input = PersonInput::default();
        assert_eq!(input.gender, Gender::Female);
        assert_eq!(input.year, 4);
        assert_eq!(input.gpa, 3.20);
        assert_eq!(input.grades.len(), 8);
        assert_eq!(
            input.grades.get("การเขียนโปรแกรมคอมพิวเตอร์เบื้องต้น").map(String::as_str),
            Some("A")
        );
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_flat_json_shape() {
        let json = r#"{"เพศ": "ชาย", "ชั้นปี": 2, "GPA": 2.75, "หลักการตลาด": "C+"}"#;
        let input: PersonInput = serde_json::from_str(json).unwrap();

        assert_eq!(input.gender, Gender::Male);
        assert_eq!(input.year, 2);
        assert_eq!(input.gpa, 2.75);
        assert_eq!(input.grades.get("หลักการตลาด").map(String::as_str), Some("C+"));
        assert_eq!(input.grades.len(), 1);
    }

    #[test]
    fn test_english_aliases() {
        let json = r#"{"gender": "female", "year": 3, "gpa": 3.5}"#;
        let input: PersonInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.gender, Gender::Female);
        assert_eq!(input.year, 3);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(PersonInput::new(Gender::Male, 0, 3.0).validate().is_err());
        assert!(PersonInput::new(Gender::Male, 5, 3.0).validate().is_err());
        assert!(PersonInput::new(Gender::Male, 1, 4.01).validate().is_err());
        assert!(PersonInput::new(Gender::Male, 1, f64::NAN).validate().is_err());
        assert!(PersonInput::new(Gender::Male, 1, 0.0).validate().is_ok());
    }

    #[test]
    fn test_gender_from_str() {
        assert_eq!("หญิง".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_gender_is_required() {
        let json = r#"{"ชั้นปี": 2, "GPA": 2.75, "หลักการตลาด": "C+"}"#;
        let err = serde_json::from_str::<PersonInput>(json).unwrap_err();
        assert!(err.to_string().contains("เพศ"));
    }
}
