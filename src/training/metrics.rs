//! Evaluation metrics and the model comparison table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification metrics at the 0.5 threshold, plus ranking AUC
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
}

impl EvalMetrics {
    /// Compute all metrics from class-1 probabilities and true labels
    pub fn compute(probs: &[f32], labels: &[bool]) -> Self {
        debug_assert_eq!(probs.len(), labels.len());

        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut tn = 0usize;
        let mut fn_ = 0usize;
        for (p, &label) in probs.iter().zip(labels) {
            let predicted = *p >= 0.5;
            match (predicted, label) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }
        }

        let total = probs.len().max(1) as f64;
        let accuracy = (tp + tn) as f64 / total;
        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        EvalMetrics {
            accuracy,
            precision,
            recall,
            f1,
            auc: auc(probs, labels),
        }
    }

    /// Element-wise mean across folds
    pub fn mean(all: &[EvalMetrics]) -> EvalMetrics {
        if all.is_empty() {
            return EvalMetrics::default();
        }
        let n = all.len() as f64;
        EvalMetrics {
            accuracy: all.iter().map(|m| m.accuracy).sum::<f64>() / n,
            precision: all.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: all.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: all.iter().map(|m| m.f1).sum::<f64>() / n,
            auc: all.iter().map(|m| m.auc).sum::<f64>() / n,
        }
    }
}

impl fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acc: {:.3} | P: {:.3} | R: {:.3} | F1: {:.3} | AUC: {:.3}",
            self.accuracy, self.precision, self.recall, self.f1, self.auc
        )
    }
}

/// Rank-based AUC (Mann-Whitney). 0.5 when only one class is present.
fn auc(probs: &[f32], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|l| **l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| {
        probs[a]
            .partial_cmp(&probs[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Ranks with tie averaging
    let mut ranks = vec![0.0f64; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l)
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

/// One row of the model comparison table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub model: String,
    pub roster_index: usize,
    pub metrics: EvalMetrics,
}

/// All candidates' evaluation results, sorted by the selection key:
/// F1 desc, then AUC, then accuracy, then roster order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub entries: Vec<ComparisonEntry>,
}

impl ComparisonTable {
    /// Build a table sorted by the stable ranking key
    pub fn ranked(mut entries: Vec<ComparisonEntry>) -> Self {
        entries.sort_by(|a, b| {
            b.metrics
                .f1
                .total_cmp(&a.metrics.f1)
                .then(b.metrics.auc.total_cmp(&a.metrics.auc))
                .then(b.metrics.accuracy.total_cmp(&a.metrics.accuracy))
                .then(a.roster_index.cmp(&b.roster_index))
        });
        ComparisonTable { entries }
    }

    pub fn winner(&self) -> Option<&ComparisonEntry> {
        self.entries.first()
    }
}

impl fmt::Display for ComparisonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, entry) in self.entries.iter().enumerate() {
            writeln!(f, "{}. {:<22} {}", rank + 1, entry.model, entry.metrics)?;
        }
        Ok(())
    }
}
