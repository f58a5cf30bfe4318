//! Driver form statistics
//!
//! Rolling and decayed statistics over a driver's race history, computed
//! strictly from races before the target season.

use crate::RaceResultRecord;

/// Finishing position assigned to unclassified entries when averaging.
/// One place worse than a full classified field.
const DNF_POSITION: f32 = 21.0;

fn finish_position(record: &RaceResultRecord) -> f32 {
    record.position.map(|p| p as f32).unwrap_or(DNF_POSITION)
}

/// Mean finishing position over the driver's most recent `window` races
/// strictly before `target_season`. None when the driver has no prior races.
pub fn recent_form(history: &[&RaceResultRecord], target_season: u16, window: usize) -> Option<f32> {
    let mut prior: Vec<&RaceResultRecord> = history
        .iter()
        .copied()
        .filter(|r| r.season < target_season)
        .collect();
    if prior.is_empty() || window == 0 {
        return None;
    }
    prior.sort_by(|a, b| (a.season, a.date).cmp(&(b.season, b.date)));

    let recent: Vec<f32> = prior
        .iter()
        .rev()
        .take(window)
        .map(|r| finish_position(r))
        .collect();
    Some(recent.iter().sum::<f32>() / recent.len() as f32)
}

/// Variance of the driver's finishing position at one circuit across prior
/// seasons. Lower is more consistent. None with fewer than two prior races.
pub fn circuit_consistency(circuit_history: &[&RaceResultRecord], target_season: u16) -> Option<f32> {
    let positions: Vec<f32> = circuit_history
        .iter()
        .filter(|r| r.season < target_season)
        .map(|r| finish_position(r))
        .collect();
    if positions.len() < 2 {
        return None;
    }
    let mean = positions.iter().sum::<f32>() / positions.len() as f32;
    let variance =
        positions.iter().map(|p| (p - mean).powi(2)).sum::<f32>() / positions.len() as f32;
    Some(variance)
}

/// Average finishing position at one circuit across prior seasons
pub fn circuit_average(circuit_history: &[&RaceResultRecord], target_season: u16) -> Option<f32> {
    let positions: Vec<f32> = circuit_history
        .iter()
        .filter(|r| r.season < target_season)
        .map(|r| finish_position(r))
        .collect();
    if positions.is_empty() {
        return None;
    }
    Some(positions.iter().sum::<f32>() / positions.len() as f32)
}

/// Recency-weighted average of past circuit results. Each result from
/// season `s` gets weight `0.5^((target_season - s) / half_life)`, so a
/// result `half_life` seasons old counts half as much as this year's.
pub fn track_history_score(
    circuit_history: &[&RaceResultRecord],
    target_season: u16,
    half_life: f32,
) -> Option<f32> {
    let mut weighted_sum = 0.0f32;
    let mut weight_total = 0.0f32;

    for record in circuit_history.iter().filter(|r| r.season < target_season) {
        let age = (target_season - record.season) as f32;
        let weight = 0.5f32.powf(age / half_life.max(f32::EPSILON));
        weighted_sum += weight * finish_position(record);
        weight_total += weight;
    }

    if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else {
        None
    }
}

/// Fraction of a constructor's entries that were classified finishers,
/// over prior seasons. None with no prior entries.
pub fn constructor_reliability(entries: &[&RaceResultRecord], target_season: u16) -> Option<f32> {
    let prior: Vec<&&RaceResultRecord> =
        entries.iter().filter(|r| r.season < target_season).collect();
    if prior.is_empty() {
        return None;
    }
    let classified = prior.iter().filter(|r| r.is_classified()).count();
    Some(classified as f32 / prior.len() as f32)
}
