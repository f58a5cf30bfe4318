//! Win-probability inference for an upcoming race
//!
//! Applies the persisted transforms and selected model to a new season's
//! feature rows. The engine holds only immutable state, so concurrent
//! read-only prediction calls are safe; a schema mismatch fails the one
//! request and nothing else.

use serde::{Deserialize, Serialize};

use crate::data::split::FittedTransformSet;
use crate::features::FeatureMatrix;
use crate::model::Classifier;
use crate::training::SelectedModel;
use crate::{Error, Result};

/// One driver's predicted chance of winning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverForecast {
    pub driver: crate::DriverId,
    pub constructor: crate::ConstructorId,
    /// Normalized win probability in [0, 1]
    pub probability: f32,
    /// 1 = favourite
    pub rank: usize,
    /// True when a categorical value fell back to the unknown code
    pub unknown_category: bool,
}

/// Probability distribution over the race's driver field, summing to 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub season: u16,
    pub circuit: String,
    /// Sorted by probability descending
    pub entries: Vec<DriverForecast>,
}

impl PredictionResult {
    pub fn favourite(&self) -> Option<&DriverForecast> {
        self.entries.first()
    }
}

/// Stateless prediction over an immutably loaded model + transforms
pub struct InferenceEngine {
    model: SelectedModel,
    transforms: FittedTransformSet,
}

impl InferenceEngine {
    pub fn new(model: SelectedModel, transforms: FittedTransformSet) -> Self {
        InferenceEngine { model, transforms }
    }

    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    pub fn feature_names(&self) -> &[String] {
        &self.transforms.feature_names
    }

    /// Predict win probabilities for every row of the supplied matrix.
    /// The matrix must carry exactly the training-time feature schema.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<PredictionResult> {
        self.check_schema(matrix)?;
        if matrix.rows.is_empty() {
            return Err(Error::EmptyInput("no rows to predict".to_string()));
        }

        let season = matrix.rows[0].season;
        let mut scaled = Vec::with_capacity(matrix.rows.len());
        let mut unknown_flags = Vec::with_capacity(matrix.rows.len());
        for row in &matrix.rows {
            let (values, unknown) = self.transforms.transform(row);
            if unknown {
                log::warn!(
                    "Unknown category for {} / {}: using reserved code",
                    row.driver,
                    row.constructor
                );
            }
            scaled.push(values);
            unknown_flags.push(unknown);
        }

        let raw = self.model.classifier.predict_proba(&scaled);

        // Normalize across the supplied field
        let total: f32 = raw.iter().sum();
        let n = raw.len() as f32;
        let normalized: Vec<f32> = if total > 0.0 {
            raw.iter().map(|p| p / total).collect()
        } else {
            raw.iter().map(|_| 1.0 / n).collect()
        };

        let mut entries: Vec<DriverForecast> = matrix
            .rows
            .iter()
            .zip(normalized.iter().zip(&unknown_flags))
            .map(|(row, (p, unknown))| DriverForecast {
                driver: row.driver.clone(),
                constructor: row.constructor.clone(),
                probability: *p,
                rank: 0,
                unknown_category: *unknown,
            })
            .collect();

        // Probability descending, driver id as the stable tie-break
        entries.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.driver.cmp(&b.driver))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }

        Ok(PredictionResult {
            season,
            circuit: matrix.circuit.clone(),
            entries,
        })
    }

    /// Feature names/count must exactly match the training-time schema
    fn check_schema(&self, matrix: &FeatureMatrix) -> Result<()> {
        let mut supplied = vec!["driver_code".to_string(), "constructor_code".to_string()];
        supplied.extend(matrix.numeric_names.iter().cloned());

        if supplied != self.transforms.feature_names {
            return Err(Error::SchemaMismatch {
                expected: self.transforms.feature_names.len(),
                found: supplied.len(),
                expected_names: self.transforms.feature_names.clone(),
                found_names: supplied,
            });
        }
        Ok(())
    }
}
