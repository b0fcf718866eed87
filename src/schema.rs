//! Feature schema declared by a model bundle.
//!
//! The bundle only records an ordered list of column names. At load time each
//! name is classified into a [`ColumnKind`] so that encoding walks a typed
//! schema instead of matching strings per request, and the gender encoding
//! the model was trained with is resolved once into a [`GenderScheme`].

use crate::error::BundleError;
use crate::types::person::Gender;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Binary gender column (ชาย = 0, หญิง = 1)
pub const GENDER_COLUMN: &str = "เพศ";
/// One-hot column set to 1 for female students
pub const GENDER_FEMALE_COLUMN: &str = "เพศ_หญิง";
/// One-hot column set to 1 for male students
pub const GENDER_MALE_COLUMN: &str = "เพศ_ชาย";
pub const YEAR_COLUMN: &str = "ชั้นปี";
pub const GPA_COLUMN: &str = "GPA";

/// How gender is presented to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderScheme {
    /// A single 0/1 column
    Binary,
    /// One indicator column per category (one may be dropped)
    OneHot,
    /// The model does not use gender
    Unused,
}

impl fmt::Display for GenderScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenderScheme::Binary => "binary",
            GenderScheme::OneHot => "one-hot",
            GenderScheme::Unused => "unused",
        };
        f.write_str(name)
    }
}

/// Role of one feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Binary gender value
    Gender,
    /// One-hot indicator for the given gender
    GenderIs(Gender),
    Year,
    Gpa,
    /// Letter grade mapped through the grade-to-points table
    Subject,
}

impl ColumnKind {
    fn classify(name: &str) -> Self {
        match name {
            GENDER_COLUMN | "gender" => ColumnKind::Gender,
            GENDER_FEMALE_COLUMN | "gender_female" => ColumnKind::GenderIs(Gender::Female),
            GENDER_MALE_COLUMN | "gender_male" => ColumnKind::GenderIs(Gender::Male),
            YEAR_COLUMN | "year" => ColumnKind::Year,
            GPA_COLUMN | "gpa" => ColumnKind::Gpa,
            _ => ColumnKind::Subject,
        }
    }
}

/// Ordered, classified feature columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    columns: Vec<(String, ColumnKind)>,
    gender_scheme: GenderScheme,
}

impl FeatureSchema {
    /// Classify `feature_cols` and resolve the gender scheme.
    pub fn resolve(feature_cols: &[String]) -> Result<Self, BundleError> {
        if feature_cols.is_empty() {
            return Err(BundleError::Schema("feature_cols is empty".to_string()));
        }

        let mut seen = HashSet::new();
        let mut roles = HashSet::new();
        let mut columns = Vec::with_capacity(feature_cols.len());

        for name in feature_cols {
            if name.trim().is_empty() {
                return Err(BundleError::Schema("blank column name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(BundleError::Schema(format!("column '{}' declared twice", name)));
            }

            let kind = ColumnKind::classify(name);
            if kind != ColumnKind::Subject && !roles.insert(kind) {
                return Err(BundleError::Schema(format!(
                    "column '{}' duplicates the role of another column",
                    name
                )));
            }
            columns.push((name.clone(), kind));
        }

        let binary = roles.contains(&ColumnKind::Gender);
        let one_hot = roles.contains(&ColumnKind::GenderIs(Gender::Female))
            || roles.contains(&ColumnKind::GenderIs(Gender::Male));

        let gender_scheme = match (binary, one_hot) {
            (true, true) => {
                return Err(BundleError::Schema(
                    "both binary and one-hot gender columns are declared".to_string(),
                ))
            }
            (true, false) => GenderScheme::Binary,
            (false, true) => GenderScheme::OneHot,
            (false, false) => GenderScheme::Unused,
        };

        Ok(Self {
            columns,
            gender_scheme,
        })
    }

    pub fn gender_scheme(&self) -> GenderScheme {
        self.gender_scheme
    }

    /// Columns with their roles, in model order
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Column names in model order
    pub fn feature_cols(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Names of the grade columns, in model order
    pub fn subject_columns(&self) -> Vec<&str> {
        self.columns()
            .filter(|(_, kind)| *kind == ColumnKind::Subject)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
