//! Season-grouped dataset splitting and fitted transforms
//!
//! Whole seasons are never split across train and eval, so within-season
//! correlated rows cannot leak. The scaler and categorical encoders are fit
//! on the training rows only and returned alongside the split; nothing
//! downstream can refit them because no mutating API exists on the set.

use serde::{Deserialize, Serialize};

use crate::features::{CategoryEncoder, FeatureMatrix, FeatureRow};
use crate::data::labels::LabelSet;
use crate::{Error, Result, SplitConfig};

/// Z-score scaler fit on training rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f32>,
    pub stds: Vec<f32>,
}

impl StandardScaler {
    fn fit(rows: &[Vec<f32>]) -> Self {
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len().max(1) as f32;

        let mut means = vec![0.0f32; n_features];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                means[j] += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0f32; n_features];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                stds[j] += (v - means[j]).powi(2);
            }
        }
        for s in &mut stds {
            // Constant columns scale to zero offset instead of dividing by zero
            *s = (*s / n).sqrt().max(1e-6);
        }

        StandardScaler { means, stds }
    }

    /// Pure transform; applying it twice to the same input is identical
    pub fn transform(&self, values: &[f32]) -> Vec<f32> {
        values
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// The scaler, encoders and feature-name order fit on one training subset.
/// Created only by [`DatasetSplitter`]; consumed read-only everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransformSet {
    pub driver_encoder: CategoryEncoder,
    pub constructor_encoder: CategoryEncoder,
    pub scaler: StandardScaler,
    /// Full ordered feature names: the two category codes, then numerics
    pub feature_names: Vec<String>,
}

impl FittedTransformSet {
    pub(crate) fn fit(train_rows: &[&FeatureRow], numeric_names: &[String]) -> Self {
        let driver_encoder =
            CategoryEncoder::fit(train_rows.iter().map(|r| r.driver.0.as_str()));
        let constructor_encoder =
            CategoryEncoder::fit(train_rows.iter().map(|r| r.constructor.0.as_str()));

        let mut feature_names = vec!["driver_code".to_string(), "constructor_code".to_string()];
        feature_names.extend(numeric_names.iter().cloned());

        let encoded: Vec<Vec<f32>> = train_rows
            .iter()
            .map(|r| encode_raw(r, &driver_encoder, &constructor_encoder))
            .collect();
        let scaler = StandardScaler::fit(&encoded);

        FittedTransformSet {
            driver_encoder,
            constructor_encoder,
            scaler,
            feature_names,
        }
    }

    /// Encode and scale one row. The flag is true when either categorical
    /// value was unseen in training and fell back to the unknown code.
    pub fn transform(&self, row: &FeatureRow) -> (Vec<f32>, bool) {
        let unknown = !self.driver_encoder.is_known(&row.driver.0)
            || !self.constructor_encoder.is_known(&row.constructor.0);
        let raw = encode_raw(row, &self.driver_encoder, &self.constructor_encoder);
        (self.scaler.transform(&raw), unknown)
    }

    /// Transform a slice of rows, dropping the unknown flags
    pub fn transform_all(&self, rows: &[&FeatureRow]) -> Vec<Vec<f32>> {
        rows.iter().map(|r| self.transform(r).0).collect()
    }

    /// Number of features after encoding
    pub fn width(&self) -> usize {
        self.feature_names.len()
    }
}

#[cfg(test)]
impl FittedTransformSet {
    /// Pass-through transforms over empty encoders, for fixtures that do
    /// not care about encoding
    pub(crate) fn identity_for_test(feature_names: Vec<String>) -> Self {
        let width = feature_names.len();
        FittedTransformSet {
            driver_encoder: CategoryEncoder::fit(std::iter::empty::<&str>()),
            constructor_encoder: CategoryEncoder::fit(std::iter::empty::<&str>()),
            scaler: StandardScaler {
                means: vec![0.0; width],
                stds: vec![1.0; width],
            },
            feature_names,
        }
    }
}

fn encode_raw(
    row: &FeatureRow,
    driver_encoder: &CategoryEncoder,
    constructor_encoder: &CategoryEncoder,
) -> Vec<f32> {
    let mut values = Vec::with_capacity(row.values.len() + 2);
    values.push(driver_encoder.encode(&row.driver.0) as f32);
    values.push(constructor_encoder.encode(&row.constructor.0) as f32);
    values.extend_from_slice(&row.values);
    values
}

/// One train/eval partition with its fitted transforms
#[derive(Debug, Clone)]
pub struct TrainEvalSplit {
    pub x_train: Vec<Vec<f32>>,
    pub y_train: Vec<bool>,
    pub x_eval: Vec<Vec<f32>>,
    pub y_eval: Vec<bool>,
    pub transforms: FittedTransformSet,
    pub train_seasons: Vec<u16>,
    pub eval_seasons: Vec<u16>,
}

/// Split strategy chosen from the usable season count
#[derive(Debug, Clone)]
pub enum SplitPlan {
    /// Single holdout of the most recent seasons
    Holdout(TrainEvalSplit),
    /// Leave-one-season-out folds for small datasets; scores are averaged
    LeaveOneSeasonOut(Vec<TrainEvalSplit>),
}

impl SplitPlan {
    /// The folds, one for a holdout
    pub fn folds(&self) -> Vec<&TrainEvalSplit> {
        match self {
            SplitPlan::Holdout(split) => vec![split],
            SplitPlan::LeaveOneSeasonOut(folds) => folds.iter().collect(),
        }
    }
}

/// Partitions a feature matrix by season and fits the transforms
pub struct DatasetSplitter {
    config: SplitConfig,
}

impl DatasetSplitter {
    pub fn new(config: SplitConfig) -> Self {
        DatasetSplitter { config }
    }

    pub fn split(&self, matrix: &FeatureMatrix, labels: &LabelSet) -> Result<SplitPlan> {
        if matrix.rows.len() != labels.labels.len() {
            return Err(Error::LabelJoin(format!(
                "{} feature rows but {} labels",
                matrix.rows.len(),
                labels.labels.len()
            )));
        }

        let unusable = labels.unusable_seasons();
        let seasons: Vec<u16> = matrix
            .seasons()
            .into_iter()
            .filter(|s| !unusable.contains(s))
            .collect();

        if seasons.len() < 2 {
            return Err(Error::EmptyInput(format!(
                "need at least 2 usable seasons to split, have {}",
                seasons.len()
            )));
        }

        if seasons.len() < self.config.min_seasons_for_holdout {
            log::info!(
                "Only {} usable seasons: falling back to leave-one-season-out",
                seasons.len()
            );
            let folds = seasons
                .iter()
                .map(|eval_season| {
                    let train: Vec<u16> =
                        seasons.iter().copied().filter(|s| s != eval_season).collect();
                    self.make_split(matrix, labels, &train, &[*eval_season])
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(SplitPlan::LeaveOneSeasonOut(folds));
        }

        // Hold out the most recent seasons; every held-out season carries
        // its winner row, so the rare class is always represented in eval.
        let n_eval = ((seasons.len() as f32 * self.config.eval_fraction).round() as usize)
            .clamp(1, seasons.len() - 1);
        let (train_seasons, eval_seasons) = seasons.split_at(seasons.len() - n_eval);
        let split = self.make_split(matrix, labels, train_seasons, eval_seasons)?;
        Ok(SplitPlan::Holdout(split))
    }

    fn make_split(
        &self,
        matrix: &FeatureMatrix,
        labels: &LabelSet,
        train_seasons: &[u16],
        eval_seasons: &[u16],
    ) -> Result<TrainEvalSplit> {
        let mut train_rows = Vec::new();
        let mut y_train = Vec::new();
        let mut eval_rows = Vec::new();
        let mut y_eval = Vec::new();

        for (row, label) in matrix.rows.iter().zip(&labels.labels) {
            if train_seasons.contains(&row.season) {
                train_rows.push(row);
                y_train.push(*label);
            } else if eval_seasons.contains(&row.season) {
                eval_rows.push(row);
                y_eval.push(*label);
            }
        }

        if train_rows.is_empty() || eval_rows.is_empty() {
            return Err(Error::EmptyInput(
                "season split produced an empty subset".to_string(),
            ));
        }

        // Transforms see training rows only
        let transforms = FittedTransformSet::fit(&train_rows, &matrix.numeric_names);
        let x_train = transforms.transform_all(&train_rows);
        let x_eval = transforms.transform_all(&eval_rows);

        Ok(TrainEvalSplit {
            x_train,
            y_train,
            x_eval,
            y_eval,
            transforms,
            train_seasons: train_seasons.to_vec(),
            eval_seasons: eval_seasons.to_vec(),
        })
    }
}
