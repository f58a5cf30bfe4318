//! Labels and dataset splitting
//!
//! Derives the winner label per (season, driver) row and partitions the
//! matrix into leakage-safe train/eval subsets with fitted transforms.

pub mod labels;
pub mod split;

pub use labels::{derive_labels, LabelSet};
pub use split::{DatasetSplitter, FittedTransformSet, SplitPlan, StandardScaler, TrainEvalSplit};
