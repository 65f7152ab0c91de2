//! Trained model artifacts
//!
//! [`ClassificationPipeline`] couples the fitted preprocessing with the classifier;
//! [`ModelBundle`] wraps it with the schema and label mapping used at training time
//! and defines the persisted file format.

mod bundle;
mod pipeline;

pub use bundle::{ModelBundle, BUNDLE_FORMAT_VERSION, MODEL_NAME};
pub use pipeline::ClassificationPipeline;
