//! Bagged tree ensemble
//!
//! Bootstrap-sampled probability trees with per-split feature subsampling.
//! Leaf means over 0/1 targets make each tree a probability estimator; the
//! forest averages them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::tree::{DecisionTree, TreeConfig};
use crate::model::Classifier;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        RandomForest {
            n_trees,
            max_depth,
            seed,
            trees: Vec::new(),
            n_features: 0,
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[Vec<f32>], y: &[bool], sample_weights: &[f32]) -> Result<()> {
        if x.is_empty() {
            return Err(Error::Training {
                model: self.name().to_string(),
                message: "empty training set".to_string(),
            });
        }
        self.n_features = x[0].len();
        let targets: Vec<f32> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();

        let subsample = (self.n_features as f32).sqrt().ceil() as usize;
        let config = TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: 2,
            feature_subsample: Some(subsample.max(1)),
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.trees = (0..self.n_trees)
            .map(|_| {
                // Bootstrap sample with replacement
                let boot_x: Vec<Vec<f32>>;
                let boot_t: Vec<f32>;
                let boot_w: Vec<f32>;
                {
                    let mut bx = Vec::with_capacity(x.len());
                    let mut bt = Vec::with_capacity(x.len());
                    let mut bw = Vec::with_capacity(x.len());
                    for _ in 0..x.len() {
                        let i = rng.gen_range(0..x.len());
                        bx.push(x[i].clone());
                        bt.push(targets[i]);
                        bw.push(sample_weights[i]);
                    }
                    boot_x = bx;
                    boot_t = bt;
                    boot_w = bw;
                }
                DecisionTree::fit(&boot_x, &boot_t, &boot_w, config, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f32>]) -> Vec<f32> {
        x.iter()
            .map(|row| {
                let sum: f32 = self.trees.iter().map(|t| t.predict(row)).sum();
                (sum / self.trees.len().max(1) as f32).clamp(0.0, 1.0)
            })
            .collect()
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
        "random_forest"
    }
}
