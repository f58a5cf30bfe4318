//! Winner label derivation
//!
//! Marks exactly one driver row per season as the winner, by key-based
//! join against the race results. Seasons without a classified winner are
//! flagged and later excluded from training rather than taught as
//! all-losers examples.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::FeatureMatrix;
use crate::{DriverId, Error, RaceResultRecord, Result};

/// Binary labels aligned index-wise with a feature matrix's rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSet {
    pub labels: Vec<bool>,
    /// Seasons with no classified winner (e.g. abandoned race)
    pub excluded_seasons: Vec<u16>,
    /// Seasons whose winner is absent from the feature rows
    pub missing_winner_seasons: Vec<u16>,
}

impl LabelSet {
    /// Seasons that must not enter training
    pub fn unusable_seasons(&self) -> Vec<u16> {
        let mut seasons: Vec<u16> = self
            .excluded_seasons
            .iter()
            .chain(self.missing_winner_seasons.iter())
            .copied()
            .collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }

    pub fn winner_count(&self) -> usize {
        self.labels.iter().filter(|l| **l).count()
    }
}

/// Derive winner labels for every row of the matrix.
///
/// A season present in the matrix but absent from the results table is a
/// join error. A season with more than one position-1 entry is malformed
/// input, also an error.
pub fn derive_labels(matrix: &FeatureMatrix, results: &[RaceResultRecord]) -> Result<LabelSet> {
    let mut winners: BTreeMap<u16, Option<DriverId>> = BTreeMap::new();

    for season in matrix.seasons() {
        let season_results: Vec<&RaceResultRecord> = results
            .iter()
            .filter(|r| r.season == season && r.circuit == matrix.circuit)
            .collect();
        if season_results.is_empty() {
            return Err(Error::LabelJoin(format!(
                "no race results for season {} at '{}'",
                season, matrix.circuit
            )));
        }

        let season_winners: Vec<&DriverId> = season_results
            .iter()
            .filter(|r| r.position == Some(1))
            .map(|r| &r.driver)
            .collect();
        match season_winners.len() {
            0 => {
                winners.insert(season, None);
            }
            1 => {
                winners.insert(season, Some(season_winners[0].clone()));
            }
            n => {
                return Err(Error::LabelJoin(format!(
                    "season {} has {} position-1 entries",
                    season, n
                )));
            }
        }
    }

    let mut excluded_seasons = Vec::new();
    let mut missing_winner_seasons = Vec::new();
    let mut labels = Vec::with_capacity(matrix.rows.len());

    for (season, winner) in &winners {
        match winner {
            None => excluded_seasons.push(*season),
            Some(driver) => {
                let present = matrix
                    .season_rows(*season)
                    .iter()
                    .any(|r| &r.driver == driver);
                if !present {
                    missing_winner_seasons.push(*season);
                }
            }
        }
    }

    for row in &matrix.rows {
        let is_winner = matches!(
            winners.get(&row.season),
            Some(Some(driver)) if driver == &row.driver
        );
        labels.push(is_winner);
    }

    Ok(LabelSet {
        labels,
        excluded_seasons,
        missing_winner_seasons,
    })
}
