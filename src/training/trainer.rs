//! Training the candidate roster
//!
//! Every family trains on the same scaled representation with balanced
//! sample weights. Winners are ~5% of rows, so class weighting is a fixed
//! design element here, not an optional tuning knob.

use crate::model::{CandidateClassifier, Classifier};
use crate::{Error, ModelRosterConfig, Result};

/// One fitted roster member, tagged with its declared position
#[derive(Debug, Clone)]
pub struct TrainedCandidate {
    pub classifier: CandidateClassifier,
    pub roster_index: usize,
}

/// Per-sample weights that balance the winner class: positives get
/// `n_neg / n_pos`, negatives 1.0.
pub fn balanced_weights(y: &[bool]) -> Vec<f32> {
    let n_pos = y.iter().filter(|v| **v).count();
    let n_neg = y.len() - n_pos;
    let pos_weight = if n_pos > 0 {
        n_neg as f32 / n_pos as f32
    } else {
        1.0
    };
    y.iter()
        .map(|&v| if v { pos_weight } else { 1.0 })
        .collect()
}

/// Fits the fixed candidate roster on one training subset
pub struct ModelTrainer {
    config: ModelRosterConfig,
    seed: u64,
}

impl ModelTrainer {
    pub fn new(config: ModelRosterConfig, seed: u64) -> Self {
        ModelTrainer { config, seed }
    }

    /// Train every roster member. A single family failing aborts the run;
    /// no partial roster reaches selection.
    pub fn train(&self, x_train: &[Vec<f32>], y_train: &[bool]) -> Result<Vec<TrainedCandidate>> {
        if x_train.is_empty() {
            return Err(Error::EmptyInput("no training rows".to_string()));
        }
        if x_train.len() != y_train.len() {
            return Err(Error::LabelJoin(format!(
                "{} training rows but {} labels",
                x_train.len(),
                y_train.len()
            )));
        }

        let weights = balanced_weights(y_train);
        let mut trained = Vec::new();

        for (roster_index, mut candidate) in CandidateClassifier::roster(&self.config, self.seed)
            .into_iter()
            .enumerate()
        {
            log::info!(
                "Training {} on {} rows ({} winners)",
                candidate.name(),
                x_train.len(),
                y_train.iter().filter(|v| **v).count()
            );
            candidate.fit(x_train, y_train, &weights)?;
            trained.push(TrainedCandidate {
                classifier: candidate,
                roster_index,
            });
        }
        Ok(trained)
    }
}
