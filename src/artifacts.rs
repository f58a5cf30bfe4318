//! Persisted training outputs
//!
//! One JSON file carries everything inference and reporting need: the
//! selected model, the fitted transforms, the comparison table, the
//! importance table, the coverage report and run metadata. Loading it back
//! requires no access to the training tables.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::data::split::FittedTransformSet;
use crate::features::CoverageReport;
use crate::predict::{ImportanceTable, PredictionResult};
use crate::training::{ComparisonTable, SelectedModel};
use crate::{FeatureConfig, Result};

/// Provenance of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub seed: u64,
    pub circuit: String,
    pub train_seasons: Vec<u16>,
    pub model_name: String,
    /// "holdout" or "leave_one_season_out"
    pub split_strategy: String,
    /// Feature settings the matrix was built with; predictions must reuse
    /// these, or the schema check would pass over silently shifted values
    pub features: FeatureConfig,
}

/// The complete output bundle of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifacts {
    pub model: SelectedModel,
    pub transforms: FittedTransformSet,
    pub comparison: ComparisonTable,
    pub importance: ImportanceTable,
    pub coverage: CoverageReport,
    /// Filled in when a prediction run follows training
    pub summary: Option<PredictionResult>,
    pub metadata: RunMetadata,
}

impl TrainedArtifacts {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Saved artifacts to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<TrainedArtifacts> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CandidateClassifier, Classifier, LogisticRegression};
    use crate::predict::{ImportanceEntry, InferenceEngine};
    use crate::training::metrics::{ComparisonEntry, EvalMetrics};

    fn fitted_bundle() -> TrainedArtifacts {
        let x = vec![
            vec![0.0, 1.0],
            vec![0.2, 0.8],
            vec![0.8, 0.2],
            vec![1.0, 0.0],
        ];
        let y = vec![false, false, true, true];
        let w = vec![1.0; 4];
        let mut logistic = LogisticRegression::new(100, 0.5, 1e-3);
        logistic.fit(&x, &y, &w).unwrap();
        let metrics = EvalMetrics::compute(&logistic.predict_proba(&x), &y);

        TrainedArtifacts {
            model: SelectedModel {
                classifier: CandidateClassifier::Logistic(logistic),
                name: "logistic_regression".to_string(),
                roster_index: 2,
                metrics,
            },
            transforms: FittedTransformSet::identity_for_test(vec![
                "driver_code".to_string(),
                "constructor_code".to_string(),
            ]),
            comparison: ComparisonTable::ranked(vec![ComparisonEntry {
                model: "logistic_regression".to_string(),
                roster_index: 2,
                metrics,
            }]),
            importance: ImportanceTable {
                entries: vec![ImportanceEntry {
                    feature: "driver_code".to_string(),
                    score: 1.0,
                }],
                approximate: false,
            },
            coverage: CoverageReport::default(),
            summary: None,
            metadata: RunMetadata {
                seed: 42,
                circuit: "marina_bay".to_string(),
                train_seasons: vec![2021, 2022],
                model_name: "logistic_regression".to_string(),
                split_strategy: "holdout".to_string(),
                features: FeatureConfig {
                    form_window: 3,
                    decay_half_life: 3.0,
                    impute_fallback: 10.0,
                },
            },
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = std::env::temp_dir().join("grandprix_artifacts_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("artifacts.json");

        let bundle = fitted_bundle();
        bundle.save(&path).unwrap();
        let loaded = TrainedArtifacts::load(&path).unwrap();

        assert_eq!(loaded.model.name, bundle.model.name);
        assert_eq!(loaded.metadata.train_seasons, vec![2021, 2022]);
        assert_eq!(loaded.comparison.entries.len(), 1);
        assert_eq!(loaded.importance.entries[0].feature, "driver_code");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_loaded_model_predicts_without_training_state() {
        let dir = std::env::temp_dir().join("grandprix_artifacts_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("artifacts_predict.json");

        fitted_bundle().save(&path).unwrap();
        let loaded = TrainedArtifacts::load(&path).unwrap();

        // The reloaded classifier scores rows on its own
        let probs = loaded.model.classifier.predict_proba(&[vec![0.9, 0.1]]);
        assert_eq!(probs.len(), 1);
        assert!(probs[0] > 0.5);

        let engine = InferenceEngine::new(loaded.model, loaded.transforms);
        assert_eq!(engine.model_name(), "logistic_regression");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = TrainedArtifacts::load(Path::new("/nonexistent/artifacts.json"));
        assert!(matches!(err, Err(crate::Error::Io(_))));
    }
}
