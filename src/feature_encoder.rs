//! Feature encoding for career model inference.
//!
//! Turns a submitted [`PersonInput`] into the numeric row the bundled model
//! was trained on. Column membership and order come from the bundle's
//! [`FeatureSchema`]; nothing is padded, defaulted or reordered silently.

use crate::error::{BundleError, EncodeError};
use crate::schema::{ColumnKind, FeatureSchema};
use crate::types::person::{Gender, PersonInput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Letter grade to grade points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradePoints(BTreeMap<String, f64>);

impl GradePoints {
    /// Build a table, rejecting non-finite scores.
    pub fn new(table: BTreeMap<String, f64>) -> Result<Self, BundleError> {
        if table.is_empty() {
            return Err(BundleError::Schema("grade_to_points is empty".to_string()));
        }
        if let Some((grade, points)) = table.iter().find(|(_, p)| !p.is_finite()) {
            return Err(BundleError::Schema(format!(
                "grade '{}' maps to non-finite points {}",
                grade, points
            )));
        }
        Ok(Self(table))
    }

    /// Points for a letter grade
    pub fn points(&self, grade: &str) -> Option<f64> {
        self.0.get(grade).copied()
    }

    /// Entries ordered from the highest score down
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = self.0.iter().map(|(g, p)| (g.as_str(), *p)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries
    }
}

impl Default for GradePoints {
    fn default() -> Self {
        let table = [
            ("A", 4.0),
            ("B+", 3.5),
            ("B", 3.0),
            ("C+", 2.5),
            ("C", 2.0),
            ("D+", 1.5),
            ("D", 1.0),
            ("F", 0.0),
        ]
        .into_iter()
        .map(|(grade, points)| (grade.to_string(), points))
        .collect();
        Self(table)
    }
}

/// A single numeric row, columns in model order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRow {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl EncodedRow {
    pub fn new(columns: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i).copied())
    }

    /// `(column, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encoder that maps form input into the bundle's feature layout.
///
/// Built once per bundle; `encode` is pure and can be called concurrently.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
    grade_points: GradePoints,
}

impl FeatureEncoder {
    pub fn new(schema: FeatureSchema, grade_points: GradePoints) -> Self {
        Self {
            schema,
            grade_points,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn grade_points(&self) -> &GradePoints {
        &self.grade_points
    }

    /// Encode one submission.
    ///
    /// Every subject column of the schema needs a grade in `person.grades`;
    /// all missing ones are reported together. Grades for subjects the model
    /// does not know are ignored.
    pub fn encode(&self, person: &PersonInput) -> Result<EncodedRow, EncodeError> {
        person.validate()?;

        let mut values = Vec::with_capacity(self.schema.len());
        let mut missing = Vec::new();

        for (column, kind) in self.schema.columns() {
            let value = match kind {
                ColumnKind::Gender => binary_gender(person.gender),
                ColumnKind::GenderIs(gender) => indicator(person.gender == gender),
                ColumnKind::Year => f64::from(person.year),
                ColumnKind::Gpa => person.gpa,
                ColumnKind::Subject => {
                    let Some(grade) = person.grades.get(column) else {
                        missing.push(column.to_string());
                        continue;
                    };
                    self.grade_points
                        .points(grade)
                        .ok_or_else(|| EncodeError::UnmappedGrade {
                            column: column.to_string(),
                            grade: grade.clone(),
                        })?
                }
            };
            values.push(value);
        }

        if !missing.is_empty() {
            return Err(EncodeError::SchemaMismatch { missing });
        }

        let row = EncodedRow::new(self.schema.feature_cols(), values);
        debug!(
            gender_scheme = %self.schema.gender_scheme(),
            features = row.len(),
            "Encoded person input"
        );
        Ok(row)
    }
}

fn binary_gender(gender: Gender) -> f64 {
    match gender {
        Gender::Male => 0.0,
        Gender::Female => 1.0,
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
