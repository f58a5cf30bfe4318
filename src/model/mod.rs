//! Candidate classifier families
//!
//! Four families share one capability surface: `fit` with per-sample
//! weights, `predict_proba`, and optional `feature_importance`. The roster
//! is iterated through the tagged [`CandidateClassifier`] variant, never
//! through family-specific branching.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod svm;
pub mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use linear::LogisticRegression;
pub use svm::KernelSvm;
pub use tree::DecisionTree;

use serde::{Deserialize, Serialize};

use crate::{ModelRosterConfig, Result};

/// Common capability surface for every candidate family
pub trait Classifier {
    /// Fit on scaled feature rows with per-sample weights
    fn fit(&mut self, x: &[Vec<f32>], y: &[bool], sample_weights: &[f32]) -> Result<()>;

    /// Class-1 probability per row
    fn predict_proba(&self, x: &[Vec<f32>]) -> Vec<f32>;

    /// Per-feature importance scores, if the family supports them
    fn feature_importance(&self) -> Option<Vec<f32>>;

    fn name(&self) -> &'static str;
}

/// Tagged variant over the four model families, serializable as a whole
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CandidateClassifier {
    Forest(RandomForest),
    Boosted(GradientBoosting),
    Logistic(LogisticRegression),
    Svm(KernelSvm),
}

impl CandidateClassifier {
    /// The fixed roster in declared order. The order is the final
    /// tie-break when candidates are otherwise metric-identical.
    pub fn roster(config: &ModelRosterConfig, seed: u64) -> Vec<CandidateClassifier> {
        vec![
            CandidateClassifier::Forest(RandomForest::new(
                config.forest_trees,
                config.forest_max_depth,
                seed,
            )),
            CandidateClassifier::Boosted(GradientBoosting::new(
                config.boost_rounds,
                config.boost_learning_rate,
                config.boost_max_depth,
                seed.wrapping_add(1),
            )),
            CandidateClassifier::Logistic(LogisticRegression::new(
                config.logistic_epochs,
                config.logistic_learning_rate,
                config.logistic_l2,
            )),
            CandidateClassifier::Svm(KernelSvm::new(
                config.svm_epochs,
                config.svm_lambda,
                config.svm_gamma,
                seed.wrapping_add(3),
            )),
        ]
    }
}

impl Classifier for CandidateClassifier {
    fn fit(&mut self, x: &[Vec<f32>], y: &[bool], sample_weights: &[f32]) -> Result<()> {
        match self {
            CandidateClassifier::Forest(m) => m.fit(x, y, sample_weights),
            CandidateClassifier::Boosted(m) => m.fit(x, y, sample_weights),
            CandidateClassifier::Logistic(m) => m.fit(x, y, sample_weights),
            CandidateClassifier::Svm(m) => m.fit(x, y, sample_weights),
        }
    }

    fn predict_proba(&self, x: &[Vec<f32>]) -> Vec<f32> {
        match self {
            CandidateClassifier::Forest(m) => m.predict_proba(x),
            CandidateClassifier::Boosted(m) => m.predict_proba(x),
            CandidateClassifier::Logistic(m) => m.predict_proba(x),
            CandidateClassifier::Svm(m) => m.predict_proba(x),
        }
    }

    fn feature_importance(&self) -> Option<Vec<f32>> {
        match self {
            CandidateClassifier::Forest(m) => m.feature_importance(),
            CandidateClassifier::Boosted(m) => m.feature_importance(),
            CandidateClassifier::Logistic(m) => m.feature_importance(),
            CandidateClassifier::Svm(m) => m.feature_importance(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CandidateClassifier::Forest(m) => m.name(),
            CandidateClassifier::Boosted(m) => m.name(),
            CandidateClassifier::Logistic(m) => m.name(),
            CandidateClassifier::Svm(m) => m.name(),
        }
    }
}

/// Numerically safe logistic sigmoid shared by several families
pub(crate) fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}


#[cfg(test)]
impl ModelRosterConfig {
    /// Small hyperparameters for fast unit tests
    pub(crate) fn default_for_test() -> Self {
        ModelRosterConfig {
            forest_trees: 10,
            forest_max_depth: 3,
            boost_rounds: 10,
            boost_learning_rate: 0.2,
            boost_max_depth: 2,
            logistic_epochs: 50,
            logistic_learning_rate: 0.1,
            logistic_l2: 1e-3,
            svm_epochs: 50,
            svm_lambda: 1e-2,
            svm_gamma: 0.5,
        }
    }
}
