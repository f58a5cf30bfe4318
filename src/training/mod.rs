//! Model training and selection

pub mod metrics;
pub mod selector;
pub mod trainer;

pub use metrics::{ComparisonEntry, ComparisonTable, EvalMetrics};
pub use selector::{ModelSelector, SelectedModel};
pub use trainer::{balanced_weights, ModelTrainer, TrainedCandidate};
