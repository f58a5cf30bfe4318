//! Feature engineering
//!
//! Joins raw source tables into the per-(season, driver) feature matrix.

pub mod builder;
pub mod encoding;
pub mod form;

pub use builder::{CoverageReport, FeatureBuilder, FeatureMatrix, FeatureRow, NUMERIC_FEATURES};
pub use encoding::CategoryEncoder;
