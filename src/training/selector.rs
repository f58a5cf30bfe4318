//! Candidate evaluation and winner selection
//!
//! Ranks every candidate by F1, tie-broken by AUC, then accuracy, then
//! declared roster order. The same inputs and seeds always produce the
//! same ranking and the same comparison table.

use serde::{Deserialize, Serialize};

use crate::model::{CandidateClassifier, Classifier};
use crate::training::metrics::{ComparisonEntry, ComparisonTable, EvalMetrics};
use crate::training::trainer::TrainedCandidate;
use crate::{Error, Result};

/// The winning candidate, ready to pair with its transforms for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedModel {
    pub classifier: CandidateClassifier,
    pub name: String,
    pub roster_index: usize,
    pub metrics: EvalMetrics,
}

pub struct ModelSelector;

impl ModelSelector {
    /// Score one candidate on an evaluation subset
    pub fn evaluate(
        candidate: &CandidateClassifier,
        x_eval: &[Vec<f32>],
        y_eval: &[bool],
    ) -> EvalMetrics {
        let probs = candidate.predict_proba(x_eval);
        EvalMetrics::compute(&probs, y_eval)
    }

    /// Evaluate all candidates on a single holdout and pick the winner
    pub fn select(
        candidates: Vec<TrainedCandidate>,
        x_eval: &[Vec<f32>],
        y_eval: &[bool],
    ) -> Result<(SelectedModel, ComparisonTable)> {
        if candidates.is_empty() {
            return Err(Error::EmptyInput("no trained candidates".to_string()));
        }

        let entries: Vec<ComparisonEntry> = candidates
            .iter()
            .map(|c| ComparisonEntry {
                model: c.classifier.name().to_string(),
                roster_index: c.roster_index,
                metrics: Self::evaluate(&c.classifier, x_eval, y_eval),
            })
            .collect();
        let table = ComparisonTable::ranked(entries);

        Self::pick(candidates, table)
    }

    /// Pick the winner from per-candidate metrics already averaged across
    /// folds. `candidates` are the refit-on-everything instances.
    pub fn select_scored(
        candidates: Vec<TrainedCandidate>,
        scored: Vec<ComparisonEntry>,
    ) -> Result<(SelectedModel, ComparisonTable)> {
        if candidates.is_empty() {
            return Err(Error::EmptyInput("no trained candidates".to_string()));
        }
        let table = ComparisonTable::ranked(scored);
        Self::pick(candidates, table)
    }

    fn pick(
        candidates: Vec<TrainedCandidate>,
        table: ComparisonTable,
    ) -> Result<(SelectedModel, ComparisonTable)> {
        let winner_entry = table
            .winner()
            .ok_or_else(|| Error::EmptyInput("empty comparison table".to_string()))?
            .clone();

        let winner = candidates
            .into_iter()
            .find(|c| c.roster_index == winner_entry.roster_index)
            .ok_or_else(|| Error::EmptyInput("winner missing from candidates".to_string()))?;

        log::info!(
            "Selected {} ({})",
            winner_entry.model,
            winner_entry.metrics
        );

        Ok((
            SelectedModel {
                classifier: winner.classifier,
                name: winner_entry.model.clone(),
                roster_index: winner_entry.roster_index,
                metrics: winner_entry.metrics,
            },
            table,
        ))
    }
}
