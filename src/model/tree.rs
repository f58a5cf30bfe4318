//! Weighted regression tree
//!
//! The shared building block for both ensemble families: the forest fits
//! trees on 0/1 targets (leaf mean = class probability), boosting fits
//! them on pseudo-residuals. Splits minimize weighted variance, which for
//! Bernoulli targets is equivalent to the Gini criterion.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f32,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

/// Tree growth parameters
#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; None = all
    pub feature_subsample: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Total weighted variance reduction per feature
    gains: Vec<f32>,
}

impl DecisionTree {
    /// Grow a tree on `targets` with per-sample `weights`.
    pub fn fit(
        x: &[Vec<f32>],
        targets: &[f32],
        weights: &[f32],
        config: TreeConfig,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        let mut tree = DecisionTree {
            nodes: Vec::new(),
            gains: vec![0.0; n_features],
        };
        let indices: Vec<usize> = (0..x.len()).collect();
        tree.grow(x, targets, weights, &indices, config, 0, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f32>],
        targets: &[f32],
        weights: &[f32],
        indices: &[usize],
        config: TreeConfig,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let leaf_value = weighted_mean(targets, weights, indices);

        if depth >= config.max_depth || indices.len() < 2 * config.min_samples_leaf {
            return self.push(Node::Leaf { value: leaf_value });
        }

        let n_features = self.gains.len();
        let mut candidates: Vec<usize> = (0..n_features).collect();
        if let Some(k) = config.feature_subsample {
            candidates.shuffle(rng);
            candidates.truncate(k.max(1).min(n_features));
        }

        let parent_impurity = weighted_sse(targets, weights, indices, leaf_value);
        let mut best: Option<(usize, f32, f32)> = None; // (feature, threshold, gain)

        for &feature in &candidates {
            if let Some((threshold, gain)) = best_split_for_feature(
                x,
                targets,
                weights,
                indices,
                feature,
                parent_impurity,
                config.min_samples_leaf,
            ) {
                let better = match best {
                    None => true,
                    Some((_, _, best_gain)) => gain > best_gain,
                };
                if better {
                    best = Some((feature, threshold, gain));
                }
            }
        }

        let (feature, threshold, gain) = match best {
            Some(split) if split.2 > 1e-9 => split,
            _ => return self.push(Node::Leaf { value: leaf_value }),
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][feature] <= threshold);

        self.gains[feature] += gain;

        let node = self.push(Node::Leaf { value: leaf_value }); // placeholder
        let left = self.grow(x, targets, weights, &left_idx, config, depth + 1, rng);
        let right = self.grow(x, targets, weights, &right_idx, config, depth + 1, rng);
        self.nodes[node] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Predicted value for one row
    pub fn predict(&self, row: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Accumulated split gains per feature
    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn weighted_mean(targets: &[f32], weights: &[f32], indices: &[usize]) -> f32 {
    let mut sum = 0.0f32;
    let mut total = 0.0f32;
    for &i in indices {
        sum += targets[i] * weights[i];
        total += weights[i];
    }
    if total > 0.0 {
        sum / total
    } else {
        0.0
    }
}

fn weighted_sse(targets: &[f32], weights: &[f32], indices: &[usize], mean: f32) -> f32 {
    indices
        .iter()
        .map(|&i| weights[i] * (targets[i] - mean).powi(2))
        .sum()
}

/// Scan sorted values of one feature and return the best (threshold, gain)
fn best_split_for_feature(
    x: &[Vec<f32>],
    targets: &[f32],
    weights: &[f32],
    indices: &[usize],
    feature: usize,
    parent_impurity: f32,
    min_samples_leaf: usize,
) -> Option<(f32, f32)> {
    let mut order: Vec<usize> = indices.to_vec();
    order.sort_by(|&a, &b| {
        x[a][feature]
            .partial_cmp(&x[b][feature])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Prefix sums over the sorted order
    let mut w_sum = 0.0f32;
    let mut wt_sum = 0.0f32;
    let mut wt2_sum = 0.0f32;
    let totals: Vec<(f32, f32, f32)> = order
        .iter()
        .map(|&i| {
            w_sum += weights[i];
            wt_sum += weights[i] * targets[i];
            wt2_sum += weights[i] * targets[i] * targets[i];
            (w_sum, wt_sum, wt2_sum)
        })
        .collect();
    let (total_w, total_wt, total_wt2) = *totals.last()?;
    if total_w <= 0.0 {
        return None;
    }

    let mut best: Option<(f32, f32)> = None;
    for split_at in min_samples_leaf..=order.len().saturating_sub(min_samples_leaf) {
        if split_at == 0 || split_at >= order.len() {
            continue;
        }
        let left_val = x[order[split_at - 1]][feature];
        let right_val = x[order[split_at]][feature];
        if (right_val - left_val).abs() < 1e-12 {
            continue;
        }

        let (lw, lwt, lwt2) = totals[split_at - 1];
        let (rw, rwt, rwt2) = (total_w - lw, total_wt - lwt, total_wt2 - lwt2);
        if lw <= 0.0 || rw <= 0.0 {
            continue;
        }

        // SSE = sum(w t^2) - (sum(w t))^2 / sum(w)
        let left_sse = lwt2 - lwt * lwt / lw;
        let right_sse = rwt2 - rwt * rwt / rw;
        let gain = parent_impurity - left_sse - right_sse;

        let threshold = (left_val + right_val) / 2.0;
        let better = match best {
            None => true,
            Some((_, best_gain)) => gain > best_gain,
        };
        if better {
            best = Some((threshold, gain));
        }
    }
    best
}
