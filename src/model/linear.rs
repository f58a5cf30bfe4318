//! L2-regularized logistic regression
//!
//! Full-batch gradient descent on weighted binary cross-entropy. The
//! coefficient magnitudes double as the feature-importance signal.

use serde::{Deserialize, Serialize};

use crate::model::{sigmoid, Classifier};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    epochs: usize,
    learning_rate: f32,
    l2: f32,
    weights: Vec<f32>,
    bias: f32,
}

impl LogisticRegression {
    pub fn new(epochs: usize, learning_rate: f32, l2: f32) -> Self {
        LogisticRegression {
            epochs,
            learning_rate,
            l2,
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    fn decision(&self, row: &[f32]) -> f32 {
        let dot: f32 = self.weights.iter().zip(row).map(|(w, v)| w * v).sum();
        dot + self.bias
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &[Vec<f32>], y: &[bool], sample_weights: &[f32]) -> Result<()> {
        if x.is_empty() {
            return Err(Error::Training {
                model: self.name().to_string(),
                message: "empty training set".to_string(),
            });
        }
        let n_features = x[0].len();
        self.weights = vec![0.0; n_features];
        self.bias = 0.0;

        let targets: Vec<f32> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        let total_weight: f32 = sample_weights.iter().sum::<f32>().max(1e-9);

        for _ in 0..self.epochs {
            let mut grad = vec![0.0f32; n_features];
            let mut grad_bias = 0.0f32;

            for (i, row) in x.iter().enumerate() {
                let error = (sigmoid(self.decision(row)) - targets[i]) * sample_weights[i];
                for (g, v) in grad.iter_mut().zip(row) {
                    *g += error * v;
                }
                grad_bias += error;
            }

            for (w, g) in self.weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * (g / total_weight + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_bias / total_weight;
        }
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f32>]) -> Vec<f32> {
        x.iter().map(|row| sigmoid(self.decision(row))).collect()
    }

    fn feature_importance(&self) -> Option<Vec<f32>> {
        if self.weights.is_empty() {
            return None;
        }
        Some(self.weights.iter().map(|w| w.abs()).collect())
    }

    fn name(&self) -> &'static str {
        "logistic_regression"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<Vec<f32>>, Vec<bool>, Vec<f32>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let v = i as f32 / 40.0 - 0.5;
            x.push(vec![v, 0.0]);
            y.push(v > 0.0);
        }
        let w = vec![1.0; x.len()];
        (x, y, w)
    }

    #[test]
    fn test_logistic_learns_separable_data() {
        let (x, y, w) = separable_data();
        let mut model = LogisticRegression::new(300, 0.5, 1e-4);
        model.fit(&x, &y, &w).unwrap();

        let probs = model.predict_proba(&[vec![-0.4, 0.0], vec![0.4, 0.0]]);
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
    }

    #[test]
    fn test_coefficients_rank_informative_feature() {
        let (x, y, w) = separable_data();
        let mut model = LogisticRegression::new(300, 0.5, 1e-4);
        model.fit(&x, &y, &w).unwrap();

        let importance = model.feature_importance().unwrap();
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn test_class_weights_raise_minority_probability() {
        // 1 positive among 10, weighted vs unweighted
        let x: Vec<Vec<f32>> = (0..10).map(|_| vec![1.0]).collect();
        let mut y = vec![false; 10];
        y[0] = true;

        let mut unweighted = LogisticRegression::new(200, 0.5, 0.0);
        unweighted.fit(&x, &y, &vec![1.0; 10]).unwrap();

        let mut weights = vec![1.0; 10];
        weights[0] = 9.0;
        let mut weighted = LogisticRegression::new(200, 0.5, 0.0);
        weighted.fit(&x, &y, &weights).unwrap();

        let p_unweighted = unweighted.predict_proba(&[vec![1.0]])[0];
        let p_weighted = weighted.predict_proba(&[vec![1.0]])[0];
        assert!(p_weighted > p_unweighted);
    }
}
