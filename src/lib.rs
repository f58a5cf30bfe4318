//! Grand Prix winner prediction
//!
//! Joins historical per-race records into an engineered feature matrix,
//! trains a roster of classifiers and selects the best one for predicting
//! the winner of a single annual race.

pub mod artifacts;
pub mod data;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod training;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a driver (Ergast driver code, e.g. "HAM")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub String);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DriverId {
    pub fn new(code: impl Into<String>) -> Self {
        DriverId(code.into())
    }
}

/// Unique identifier for a constructor (e.g. "red_bull")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstructorId(pub String);

impl fmt::Display for ConstructorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ConstructorId {
    pub fn new(id: impl Into<String>) -> Self {
        ConstructorId(id.into())
    }
}

/// One race entry, classified or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResultRecord {
    pub season: u16,
    pub date: NaiveDate,
    pub circuit: String,
    pub driver: DriverId,
    pub constructor: ConstructorId,
    pub grid: Option<u8>,
    /// Finishing position; None when the driver was not classified
    pub position: Option<u8>,
    pub status: String,
    pub points: f32,
}

impl RaceResultRecord {
    /// Whether this entry counts as a classified finish
    pub fn is_classified(&self) -> bool {
        self.position.is_some()
    }
}

/// End-of-season driver championship standing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverStandingRecord {
    pub season: u16,
    pub driver: DriverId,
    pub constructor: ConstructorId,
    pub position: u8,
    pub points: f32,
    pub wins: u8,
}

/// End-of-season constructor championship standing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorStandingRecord {
    pub season: u16,
    pub constructor: ConstructorId,
    pub position: u8,
    pub points: f32,
    pub wins: u8,
}

/// Race-day weather for one season of the target event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub season: u16,
    pub circuit: String,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub precipitation_mm: f32,
    pub wind_speed_kmh: f32,
    pub pressure_hpa: f32,
}

/// Static circuit characteristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub circuit: String,
    /// 0 = easy to pass, 1 = processional
    pub overtaking_difficulty: f32,
    /// 0 = gentle on tires, 1 = heavy degradation
    pub tire_degradation: f32,
    pub laps: u16,
}

/// Immutable snapshot of all raw source tables, passed to the feature
/// builder at call time. There is no process-wide cache of these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTables {
    pub race_results: Vec<RaceResultRecord>,
    pub driver_standings: Vec<DriverStandingRecord>,
    pub constructor_standings: Vec<ConstructorStandingRecord>,
    pub weather: Vec<WeatherRecord>,
    pub tracks: Vec<TrackRecord>,
}

impl SourceTables {
    /// Results at the given circuit, in (season, date) order
    pub fn circuit_results(&self, circuit: &str) -> Vec<&RaceResultRecord> {
        let mut results: Vec<&RaceResultRecord> = self
            .race_results
            .iter()
            .filter(|r| r.circuit == circuit)
            .collect();
        results.sort_by(|a, b| (a.season, a.date).cmp(&(b.season, b.date)));
        results
    }
}

/// Pipeline-wide errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("Schema error in table '{table}': {message}")]
    Schema { table: String, message: String },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Feature schema mismatch: expected {expected} features {expected_names:?}, got {found} {found_names:?}")]
    SchemaMismatch {
        expected: usize,
        found: usize,
        expected_names: Vec<String>,
        found_names: Vec<String>,
    },

    #[error("Label join failed: {0}")]
    LabelJoin(String),

    #[error("Model '{model}' failed to train: {message}")]
    Training { model: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a schema error
    pub fn schema(table: &str, message: impl Into<String>) -> Self {
        Error::Schema {
            table: table.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub models: ModelRosterConfig,
    /// Seed for every stochastic stage
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Number of prior races in the recent-form window
    pub form_window: usize,
    /// Half-life in seasons for the track-history decay
    pub decay_half_life: f32,
    /// Constant used when no median is available for imputation
    pub impute_fallback: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of seasons held out for evaluation
    pub eval_fraction: f32,
    /// Below this many usable seasons, fall back to leave-one-season-out
    pub min_seasons_for_holdout: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRosterConfig {
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub boost_rounds: usize,
    pub boost_learning_rate: f32,
    pub boost_max_depth: usize,
    pub logistic_epochs: usize,
    pub logistic_learning_rate: f32,
    pub logistic_l2: f32,
    pub svm_epochs: usize,
    pub svm_lambda: f32,
    pub svm_gamma: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            features: FeatureConfig {
                form_window: 3,
                decay_half_life: 3.0,
                impute_fallback: 10.0,
            },
            split: SplitConfig {
                eval_fraction: 0.2,
                min_seasons_for_holdout: 5,
            },
            models: ModelRosterConfig {
                forest_trees: 200,
                forest_max_depth: 6,
                boost_rounds: 150,
                boost_learning_rate: 0.1,
                boost_max_depth: 3,
                logistic_epochs: 500,
                logistic_learning_rate: 0.05,
                logistic_l2: 1e-3,
                svm_epochs: 400,
                svm_lambda: 1e-3,
                svm_gamma: 0.5,
            },
            seed: 42,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
