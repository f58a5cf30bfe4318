//! Inference and explainability over the persisted model

pub mod explain;
pub mod inference;

pub use explain::{ExplainabilityExtractor, ImportanceEntry, ImportanceTable};
pub use inference::{DriverForecast, InferenceEngine, PredictionResult};
