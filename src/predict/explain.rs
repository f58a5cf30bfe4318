//! Global feature-importance extraction
//!
//! Uses the selected model's native importances when the family has them;
//! otherwise approximates by permutation: shuffle one feature's column on
//! the evaluation subset and measure the F1 drop.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{CandidateClassifier, Classifier};
use crate::training::metrics::EvalMetrics;
use crate::training::SelectedModel;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub score: f32,
}

/// Feature importances, descending by score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceTable {
    pub entries: Vec<ImportanceEntry>,
    /// True when derived by permutation rather than natively
    pub approximate: bool,
}

impl fmt::Display for ImportanceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{:<28} {:.4}", entry.feature, entry.score)?;
        }
        if self.approximate {
            writeln!(f, "(permutation approximation)")?;
        }
        Ok(())
    }
}

pub struct ExplainabilityExtractor;

impl ExplainabilityExtractor {
    /// Extract importances from the selected model. `x_eval`/`y_eval` are
    /// only consulted for the permutation fallback.
    pub fn extract(
        model: &SelectedModel,
        feature_names: &[String],
        x_eval: &[Vec<f32>],
        y_eval: &[bool],
        seed: u64,
    ) -> Result<ImportanceTable> {
        match model.classifier.feature_importance() {
            Some(scores) => Ok(Self::table(feature_names, &scores, false)),
            None => {
                log::info!(
                    "{} has no native importances, using permutation",
                    model.name
                );
                let scores =
                    Self::permutation_importance(&model.classifier, x_eval, y_eval, seed)?;
                Ok(Self::table(feature_names, &scores, true))
            }
        }
    }

    fn table(feature_names: &[String], scores: &[f32], approximate: bool) -> ImportanceTable {
        let mut entries: Vec<ImportanceEntry> = feature_names
            .iter()
            .zip(scores)
            .map(|(name, score)| ImportanceEntry {
                feature: name.clone(),
                score: *score,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        ImportanceTable {
            entries,
            approximate,
        }
    }

    /// F1 drop after shuffling each feature's column in turn
    fn permutation_importance(
        classifier: &CandidateClassifier,
        x_eval: &[Vec<f32>],
        y_eval: &[bool],
        seed: u64,
    ) -> Result<Vec<f32>> {
        if x_eval.is_empty() {
            return Err(Error::EmptyInput(
                "permutation importance needs evaluation rows".to_string(),
            ));
        }
        let n_features = x_eval[0].len();
        let baseline = EvalMetrics::compute(&classifier.predict_proba(x_eval), y_eval).f1;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut scores = Vec::with_capacity(n_features);
        for feature in 0..n_features {
            let mut column: Vec<f32> = x_eval.iter().map(|r| r[feature]).collect();
            column.shuffle(&mut rng);

            let shuffled: Vec<Vec<f32>> = x_eval
                .iter()
                .zip(&column)
                .map(|(row, v)| {
                    let mut r = row.clone();
                    r[feature] = *v;
                    r
                })
                .collect();

            let shuffled_f1 =
                EvalMetrics::compute(&classifier.predict_proba(&shuffled), y_eval).f1;
            scores.push((baseline - shuffled_f1).max(0.0) as f32);
        }
        Ok(scores)
    }
}
