//! Model bundle, classifier backends and inference

pub mod aggregator;
pub mod bundle;
pub mod classifier;
pub mod inference;
pub mod loader;
pub mod onnx;

pub use bundle::Bundle;
pub use classifier::Classifier;
pub use inference::Predictor;
pub use loader::BundleLoader;
