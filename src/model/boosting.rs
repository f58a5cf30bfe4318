//! Gradient-boosted tree ensemble
//!
//! Stagewise logistic-loss boosting: each round fits a shallow regression
//! tree to the weighted pseudo-residuals (y - p) and adds its scaled
//! output to the running logit.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::model::tree::{DecisionTree, TreeConfig};
use crate::model::{sigmoid, Classifier};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    rounds: usize,
    learning_rate: f32,
    max_depth: usize,
    seed: u64,
    init_logit: f32,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn new(rounds: usize, learning_rate: f32, max_depth: usize, seed: u64) -> Self {
        GradientBoosting {
            rounds,
            learning_rate,
            max_depth,
            seed,
            init_logit: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    fn raw_score(&self, row: &[f32]) -> f32 {
        let mut score = self.init_logit;
        for tree in &self.trees {
            score += self.learning_rate * tree.predict(row);
        }
        score
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &[Vec<f32>], y: &[bool], sample_weights: &[f32]) -> Result<()> {
        if x.is_empty() {
            return Err(Error::Training {
                model: self.name().to_string(),
                message: "empty training set".to_string(),
            });
        }
        self.n_features = x[0].len();
        let targets: Vec<f32> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();

        // Weighted base rate as the starting logit
        let total_w: f32 = sample_weights.iter().sum();
        let pos_w: f32 = targets
            .iter()
            .zip(sample_weights)
            .map(|(t, w)| t * w)
            .sum();
        let base = (pos_w / total_w.max(1e-9)).clamp(1e-4, 1.0 - 1e-4);
        self.init_logit = (base / (1.0 - base)).ln();

        let config = TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: 2,
            feature_subsample: None,
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut logits = vec![self.init_logit; x.len()];
        self.trees = Vec::with_capacity(self.rounds);

        for _ in 0..self.rounds {
            let residuals: Vec<f32> = logits
                .iter()
                .zip(&targets)
                .map(|(z, t)| t - sigmoid(*z))
                .collect();

            let tree = DecisionTree::fit(x, &residuals, sample_weights, config, &mut rng);
            for (i, row) in x.iter().enumerate() {
                logits[i] += self.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f32>]) -> Vec<f32> {
        x.iter().map(|row| sigmoid(self.raw_score(row))).collect()
    }

    fn feature_importance(&self) -> Option<Vec<f32>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut totals = vec![0.0f32; self.n_features];
        for tree in &self.trees {
            for (j, gain) in tree.gains().iter().enumerate() {
                totals[j] += gain;
            }
        }
        let sum: f32 = totals.iter().sum();
        if sum > 0.0 {
            for t in &mut totals {
                *t /= sum;
            }
        }
        Some(totals)
    }

    fn name(&self) -> &'static str {
        "gradient_boosting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<Vec<f32>>, Vec<bool>, Vec<f32>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let v = i as f32 / 40.0;
            x.push(vec![v, 1.0 - v]);
            y.push(v > 0.5);
        }
        let w = vec![1.0; x.len()];
        (x, y, w)
    }

    #[test]
    fn test_boosting_learns_separable_data() {
        let (x, y, w) = separable_data();
        let mut model = GradientBoosting::new(30, 0.3, 2, 5);
        model.fit(&x, &y, &w).unwrap();

        let probs = model.predict_proba(&[vec![0.05, 0.95], vec![0.95, 0.05]]);
        assert!(probs[0] < 0.3);
        assert!(probs[1] > 0.7);
    }

    #[test]
    fn test_boosting_probabilities_in_unit_interval() {
        let (x, y, w) = separable_data();
        let mut model = GradientBoosting::new(30, 0.3, 2, 5);
        model.fit(&x, &y, &w).unwrap();

        for p in model.predict_proba(&x) {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_boosting_deterministic() {
        let (x, y, w) = separable_data();
        let mut a = GradientBoosting::new(15, 0.2, 2, 8);
        let mut b = GradientBoosting::new(15, 0.2, 2, 8);
        a.fit(&x, &y, &w).unwrap();
        b.fit(&x, &y, &w).unwrap();
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
    }

    #[test]
    fn test_boosting_importance_available() {
        let (x, y, w) = separable_data();
        let mut model = GradientBoosting::new(20, 0.3, 2, 5);
        model.fit(&x, &y, &w).unwrap();
        let importance = model.feature_importance().unwrap();
        assert_eq!(importance.len(), 2);
    }
}
