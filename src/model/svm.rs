//! RBF-kernel margin classifier
//!
//! Kernelized Pegasos: stochastic sub-gradient descent over the hinge
//! loss, keeping a support coefficient per training point. Margin
//! violations on weighted samples grow their coefficient by the sample
//! weight, which is how class balancing reaches this family.
//!
//! Probabilities are a sigmoid squash of the raw decision value, not a
//! calibrated estimate; no native feature importance exists, so callers
//! fall back to permutation importance.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::{sigmoid, Classifier};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSvm {
    epochs: usize,
    lambda: f32,
    gamma: f32,
    seed: u64,
    support_x: Vec<Vec<f32>>,
    /// +1 / -1 labels for the support points
    support_y: Vec<f32>,
    alphas: Vec<f32>,
    /// 1 / (lambda * total_steps), the final decision scale
    scale: f32,
}

impl KernelSvm {
    pub fn new(epochs: usize, lambda: f32, gamma: f32, seed: u64) -> Self {
        KernelSvm {
            epochs,
            lambda,
            gamma,
            seed,
            support_x: Vec::new(),
            support_y: Vec::new(),
            alphas: Vec::new(),
            scale: 0.0,
        }
    }

    fn kernel(&self, a: &[f32], b: &[f32]) -> f32 {
        let dist2: f32 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
        (-self.gamma * dist2).exp()
    }

    fn decision(&self, row: &[f32]) -> f32 {
        let sum: f32 = self
            .alphas
            .iter()
            .zip(self.support_x.iter().zip(&self.support_y))
            .filter(|(alpha, _)| **alpha > 0.0)
            .map(|(alpha, (sx, sy))| alpha * sy * self.kernel(sx, row))
            .sum();
        self.scale * sum
    }
}

impl Classifier for KernelSvm {
    fn fit(&mut self, x: &[Vec<f32>], y: &[bool], sample_weights: &[f32]) -> Result<()> {
        if x.is_empty() {
            return Err(Error::Training {
                model: self.name().to_string(),
                message: "empty training set".to_string(),
            });
        }

        self.support_x = x.to_vec();
        self.support_y = y.iter().map(|&v| if v { 1.0 } else { -1.0 }).collect();
        self.alphas = vec![0.0; x.len()];

        let mut rng = StdRng::seed_from_u64(self.seed);
        let steps = self.epochs * x.len();

        for t in 1..=steps {
            let i = rng.gen_range(0..x.len());
            let factor = 1.0 / (self.lambda * t as f32);

            let margin: f32 = self
                .alphas
                .iter()
                .zip(self.support_x.iter().zip(&self.support_y))
                .filter(|(alpha, _)| **alpha > 0.0)
                .map(|(alpha, (sx, sy))| alpha * sy * self.kernel(sx, &x[i]))
                .sum::<f32>()
                * factor
                * self.support_y[i];

            if margin < 1.0 {
                self.alphas[i] += sample_weights[i];
            }
        }

        self.scale = 1.0 / (self.lambda * steps as f32);
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f32>]) -> Vec<f32> {
        x.iter().map(|row| sigmoid(self.decision(row))).collect()
    }

    /// Kernel machines have no per-feature weights; degrade gracefully
    fn feature_importance(&self) -> Option<Vec<f32>> {
        None
    }

    fn name(&self) -> &'static str {
        "kernel_svm"
    }
}
