//! Type definitions for the career recommender

pub mod person;
pub mod prediction;

pub use person::{Gender, PersonInput};
pub use prediction::{ClassProbability, PredictionResult};
