//! Career Recommender Library
//!
//! Encodes a student's gender, study year, GPA and subject grades into the
//! feature layout of a pre-trained classifier bundle and recommends a
//! career path with class probabilities.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_encoder;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{BundleError, EncodeError, PredictError};
pub use feature_encoder::{EncodedRow, FeatureEncoder, GradePoints};
pub use models::{Bundle, BundleLoader, Predictor};
pub use producer::ResultProducer;
pub use schema::{FeatureSchema, GenderScheme};
pub use types::{person::PersonInput, prediction::PredictionResult};
