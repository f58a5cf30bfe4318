//! Feature matrix construction
//!
//! Joins race results, standings, weather and track tables into one
//! FeatureRow per (season, driver) at the target circuit. Every row comes
//! out fully imputed against the fixed feature schema, and every imputed
//! value is recorded in a coverage report.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::form;
use crate::{ConstructorId, DriverId, Error, FeatureConfig, RaceResultRecord, Result, SourceTables};

/// Ordered numeric feature schema. Categorical identity features (driver,
/// constructor) are carried on the row and encoded by the fitted transforms.
pub const NUMERIC_FEATURES: [&str; 15] = [
    "championship_position",
    "championship_points",
    "season_wins",
    "recent_form",
    "circuit_avg_position",
    "circuit_consistency",
    "track_history_score",
    "constructor_position",
    "constructor_points",
    "constructor_reliability",
    "overtaking_difficulty",
    "tire_degradation",
    "temperature_c",
    "humidity_pct",
    "precipitation_mm",
];

/// One (season, driver) observation with the full numeric feature vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub season: u16,
    pub driver: DriverId,
    pub constructor: ConstructorId,
    /// Values aligned with [`NUMERIC_FEATURES`]
    pub values: Vec<f32>,
}

/// The joined feature matrix for one circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub circuit: String,
    /// Numeric feature names, identical across all rows
    pub numeric_names: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    /// Distinct seasons present, ascending
    pub fn seasons(&self) -> Vec<u16> {
        let mut seasons: Vec<u16> = self.rows.iter().map(|r| r.season).collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }

    /// Rows belonging to one season
    pub fn season_rows(&self, season: u16) -> Vec<&FeatureRow> {
        self.rows.iter().filter(|r| r.season == season).collect()
    }
}

/// Where an imputed value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputationSource {
    DriverMedian,
    SeasonMedian,
    Fallback,
}

impl fmt::Display for ImputationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputationSource::DriverMedian => write!(f, "driver median"),
            ImputationSource::SeasonMedian => write!(f, "season median"),
            ImputationSource::Fallback => write!(f, "fallback constant"),
        }
    }
}

/// Record of a single imputed cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationEntry {
    pub season: u16,
    pub driver: DriverId,
    pub field: String,
    pub source: ImputationSource,
}

/// Every imputation performed while building a matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    pub entries: Vec<ImputationEntry>,
    /// Cells observed directly from source tables
    pub observed_cells: usize,
}

impl CoverageReport {
    /// Fraction of cells that needed no imputation
    pub fn coverage(&self) -> f32 {
        let total = self.observed_cells + self.entries.len();
        if total == 0 {
            return 1.0;
        }
        self.observed_cells as f32 / total as f32
    }

    pub fn imputed_cells(&self) -> usize {
        self.entries.len()
    }
}

/// Row under construction: each cell may still be missing
struct PartialRow {
    season: u16,
    driver: DriverId,
    constructor: ConstructorId,
    values: Vec<Option<f32>>,
}

/// Builds the feature matrix for one target circuit from an immutable
/// snapshot of the source tables.
pub struct FeatureBuilder<'a> {
    tables: &'a SourceTables,
    circuit: String,
    config: FeatureConfig,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(tables: &'a SourceTables, circuit: impl Into<String>, config: FeatureConfig) -> Self {
        FeatureBuilder {
            tables,
            circuit: circuit.into(),
            config,
        }
    }

    /// Build the historical matrix: one row per (season, driver) entry at
    /// the target circuit, plus the coverage report for the imputed cells.
    pub fn build(&self) -> Result<(FeatureMatrix, CoverageReport)> {
        self.validate_tables()?;

        let circuit_results = self.tables.circuit_results(&self.circuit);
        if circuit_results.is_empty() {
            return Err(Error::EmptyInput(format!(
                "no race results for circuit '{}'",
                self.circuit
            )));
        }

        let mut partial = Vec::with_capacity(circuit_results.len());
        for record in &circuit_results {
            partial.push(self.assemble_row(record.season, &record.driver, &record.constructor));
        }

        self.finish(partial)
    }

    /// Build rows for an upcoming season from its entry list. The schema is
    /// identical to the training matrix; driver medians for imputation come
    /// from the drivers' historical rows at this circuit.
    pub fn build_upcoming(
        &self,
        season: u16,
        entries: &[(DriverId, ConstructorId)],
    ) -> Result<(FeatureMatrix, CoverageReport)> {
        self.validate_tables()?;
        if entries.is_empty() {
            return Err(Error::EmptyInput(format!(
                "empty entry list for season {}",
                season
            )));
        }

        // Rows from strictly prior seasons participate in median
        // computation only; they are dropped from the returned matrix.
        // Results the tables may already hold for the target season are
        // ignored outright: the race being predicted has not happened.
        let circuit_results = self.tables.circuit_results(&self.circuit);
        let mut partial: Vec<PartialRow> = circuit_results
            .iter()
            .filter(|r| r.season < season)
            .map(|r| self.assemble_row(r.season, &r.driver, &r.constructor))
            .collect();
        let history_len = partial.len();

        for (driver, constructor) in entries {
            partial.push(self.assemble_row(season, driver, constructor));
        }

        let (mut matrix, mut report) = self.finish(partial)?;
        matrix.rows.drain(..history_len);
        report.entries.retain(|e| e.season == season);
        report.observed_cells =
            matrix.rows.len() * NUMERIC_FEATURES.len() - report.entries.len();
        Ok((matrix, report))
    }

    /// Required-table validation. Typed records make per-column checks
    /// unnecessary, but a missing track entry or an entirely absent table
    /// is still a schema error, not something to impute around.
    fn validate_tables(&self) -> Result<()> {
        if self.tables.race_results.is_empty() {
            return Err(Error::schema("race_results", "table is empty"));
        }
        if self.tables.driver_standings.is_empty() {
            return Err(Error::schema("driver_standings", "table is empty"));
        }
        if self.tables.constructor_standings.is_empty() {
            return Err(Error::schema("constructor_standings", "table is empty"));
        }
        if !self.tables.tracks.iter().any(|t| t.circuit == self.circuit) {
            return Err(Error::schema(
                "tracks",
                format!("no metadata for circuit '{}'", self.circuit),
            ));
        }
        Ok(())
    }

    fn assemble_row(&self, season: u16, driver: &DriverId, constructor: &ConstructorId) -> PartialRow {
        let driver_history: Vec<&RaceResultRecord> = self
            .tables
            .race_results
            .iter()
            .filter(|r| &r.driver == driver)
            .collect();
        let circuit_history: Vec<&RaceResultRecord> = self
            .tables
            .race_results
            .iter()
            .filter(|r| &r.driver == driver && r.circuit == self.circuit)
            .collect();
        let constructor_entries: Vec<&RaceResultRecord> = self
            .tables
            .race_results
            .iter()
            .filter(|r| &r.constructor == constructor)
            .collect();

        let standing = self
            .tables
            .driver_standings
            .iter()
            .find(|s| s.season == season && &s.driver == driver);
        let team_standing = self
            .tables
            .constructor_standings
            .iter()
            .find(|s| s.season == season && &s.constructor == constructor);
        let weather = self
            .tables
            .weather
            .iter()
            .find(|w| w.season == season && w.circuit == self.circuit);
        let track = self.tables.tracks.iter().find(|t| t.circuit == self.circuit);

        let values = vec![
            standing.map(|s| s.position as f32),
            standing.map(|s| s.points),
            standing.map(|s| s.wins as f32),
            form::recent_form(&driver_history, season, self.config.form_window),
            form::circuit_average(&circuit_history, season),
            form::circuit_consistency(&circuit_history, season),
            form::track_history_score(&circuit_history, season, self.config.decay_half_life),
            team_standing.map(|s| s.position as f32),
            team_standing.map(|s| s.points),
            form::constructor_reliability(&constructor_entries, season),
            track.map(|t| t.overtaking_difficulty),
            track.map(|t| t.tire_degradation),
            weather.map(|w| w.temperature_c),
            weather.map(|w| w.humidity_pct),
            weather.map(|w| w.precipitation_mm),
        ];
        debug_assert_eq!(values.len(), NUMERIC_FEATURES.len());

        PartialRow {
            season,
            driver: driver.clone(),
            constructor: constructor.clone(),
            values,
        }
    }

    /// Impute every missing cell: driver median across seasons, then that
    /// season's median across drivers, then the fallback constant.
    fn finish(&self, partial: Vec<PartialRow>) -> Result<(FeatureMatrix, CoverageReport)> {
        if partial.is_empty() {
            return Err(Error::EmptyInput("feature join produced zero rows".to_string()));
        }

        let n_features = NUMERIC_FEATURES.len();
        let mut report = CoverageReport::default();

        // Per-(feature, driver) and per-(feature, season) observed values
        let mut by_driver: BTreeMap<(usize, DriverId), Vec<f32>> = BTreeMap::new();
        let mut by_season: BTreeMap<(usize, u16), Vec<f32>> = BTreeMap::new();
        for row in &partial {
            for (j, value) in row.values.iter().enumerate() {
                if let Some(v) = value {
                    by_driver
                        .entry((j, row.driver.clone()))
                        .or_default()
                        .push(*v);
                    by_season.entry((j, row.season)).or_default().push(*v);
                }
            }
        }

        let mut rows = Vec::with_capacity(partial.len());
        for row in partial {
            let mut values = Vec::with_capacity(n_features);
            for (j, cell) in row.values.iter().enumerate() {
                let value = match cell {
                    Some(v) => {
                        report.observed_cells += 1;
                        *v
                    }
                    None => {
                        let (v, source) = self.impute_cell(j, &row, &by_driver, &by_season);
                        report.entries.push(ImputationEntry {
                            season: row.season,
                            driver: row.driver.clone(),
                            field: NUMERIC_FEATURES[j].to_string(),
                            source,
                        });
                        v
                    }
                };
                values.push(value);
            }
            rows.push(FeatureRow {
                season: row.season,
                driver: row.driver,
                constructor: row.constructor,
                values,
            });
        }

        let matrix = FeatureMatrix {
            circuit: self.circuit.clone(),
            numeric_names: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            rows,
        };
        Ok((matrix, report))
    }

    fn impute_cell(
        &self,
        feature: usize,
        row: &PartialRow,
        by_driver: &BTreeMap<(usize, DriverId), Vec<f32>>,
        by_season: &BTreeMap<(usize, u16), Vec<f32>>,
    ) -> (f32, ImputationSource) {
        if let Some(values) = by_driver.get(&(feature, row.driver.clone())) {
            if !values.is_empty() {
                return (median(values), ImputationSource::DriverMedian);
            }
        }
        if let Some(values) = by_season.get(&(feature, row.season)) {
            if !values.is_empty() {
                return (median(values), ImputationSource::SeasonMedian);
            }
        }
        (self.config.impute_fallback, ImputationSource::Fallback)
    }
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConstructorStandingRecord, DriverStandingRecord, TrackRecord, WeatherRecord,
    };
    use chrono::NaiveDate;

    const CIRCUIT: &str = "marina_bay";

    fn result(season: u16, driver: &str, team: &str, position: Option<u8>) -> RaceResultRecord {
        RaceResultRecord {
            season,
            date: NaiveDate::from_ymd_opt(season as i32, 9, 22).unwrap(),
            circuit: CIRCUIT.to_string(),
            driver: DriverId::new(driver),
            constructor: ConstructorId::new(team),
            grid: Some(1),
            position,
            status: "Finished".to_string(),
            points: 0.0,
        }
    }

    fn standing(season: u16, driver: &str, team: &str, position: u8) -> DriverStandingRecord {
        DriverStandingRecord {
            season,
            driver: DriverId::new(driver),
            constructor: ConstructorId::new(team),
            position,
            points: 100.0 / position as f32,
            wins: 0,
        }
    }

    fn team_standing(season: u16, team: &str, position: u8) -> ConstructorStandingRecord {
        ConstructorStandingRecord {
            season,
            constructor: ConstructorId::new(team),
            position,
            points: 200.0 / position as f32,
            wins: 0,
        }
    }

    fn weather(season: u16) -> WeatherRecord {
        WeatherRecord {
            season,
            circuit: CIRCUIT.to_string(),
            temperature_c: 29.0,
            humidity_pct: 80.0,
            precipitation_mm: 2.0,
            wind_speed_kmh: 8.0,
            pressure_hpa: 1012.0,
        }
    }

    fn track() -> TrackRecord {
        TrackRecord {
            circuit: CIRCUIT.to_string(),
            overtaking_difficulty: 0.9,
            tire_degradation: 0.6,
            laps: 62,
        }
    }

    fn sample_tables() -> SourceTables {
        SourceTables {
            race_results: vec![
                result(2022, "VER", "red_bull", Some(1)),
                result(2022, "HAM", "mercedes", Some(2)),
                result(2023, "VER", "red_bull", Some(2)),
                result(2023, "HAM", "mercedes", Some(1)),
            ],
            driver_standings: vec![
                standing(2022, "VER", "red_bull", 1),
                standing(2022, "HAM", "mercedes", 2),
                standing(2023, "VER", "red_bull", 1),
                standing(2023, "HAM", "mercedes", 3),
            ],
            constructor_standings: vec![
                team_standing(2022, "red_bull", 1),
                team_standing(2022, "mercedes", 2),
                team_standing(2023, "red_bull", 1),
                team_standing(2023, "mercedes", 2),
            ],
            weather: vec![weather(2022), weather(2023)],
            tracks: vec![track()],
        }
    }

    fn config() -> FeatureConfig {
        FeatureConfig {
            form_window: 3,
            decay_half_life: 3.0,
            impute_fallback: 10.0,
        }
    }

    #[test]
    fn test_build_produces_one_row_per_entry() {
        let tables = sample_tables();
        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let (matrix, _) = builder.build().unwrap();

        assert_eq!(matrix.rows.len(), 4);
        assert_eq!(matrix.numeric_names.len(), NUMERIC_FEATURES.len());
        assert_eq!(matrix.seasons(), vec![2022, 2023]);
    }

    #[test]
    fn test_every_row_fully_imputed() {
        let tables = sample_tables();
        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let (matrix, _) = builder.build().unwrap();

        for row in &matrix.rows {
            assert_eq!(row.values.len(), NUMERIC_FEATURES.len());
            for (name, value) in matrix.numeric_names.iter().zip(&row.values) {
                assert!(value.is_finite(), "{} not imputed for {}", name, row.driver);
            }
        }
    }

    #[test]
    fn test_missing_weather_is_imputed_and_reported() {
        let mut tables = sample_tables();
        tables.weather.retain(|w| w.season != 2023);

        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let (matrix, report) = builder.build().unwrap();

        assert_eq!(matrix.rows.len(), 4);
        assert!(report
            .entries
            .iter()
            .any(|e| e.season == 2023 && e.field == "temperature_c"));
        assert!(report.coverage() < 1.0);
    }

    #[test]
    fn test_missing_track_metadata_is_schema_error() {
        let mut tables = sample_tables();
        tables.tracks.clear();

        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        match builder.build() {
            Err(Error::Schema { table, .. }) => assert_eq!(table, "tracks"),
            other => panic!("expected schema error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_circuit_is_empty_input() {
        let tables = sample_tables();
        let mut cfg_tables = tables.clone();
        cfg_tables.tracks.push(TrackRecord {
            circuit: "monza".to_string(),
            overtaking_difficulty: 0.3,
            tire_degradation: 0.4,
            laps: 53,
        });
        let builder = FeatureBuilder::new(&cfg_tables, "monza", config());
        assert!(matches!(builder.build(), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_driver_median_preferred_over_season_median() {
        let mut tables = sample_tables();
        // VER has no 2023 standing, but his 2022 one is observed
        tables
            .driver_standings
            .retain(|s| !(s.season == 2023 && s.driver == DriverId::new("VER")));

        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let (matrix, report) = builder.build().unwrap();

        let entry = report
            .entries
            .iter()
            .find(|e| {
                e.season == 2023
                    && e.driver == DriverId::new("VER")
                    && e.field == "championship_position"
            })
            .unwrap();
        assert_eq!(entry.source, ImputationSource::DriverMedian);

        // VER's own prior position (1.0), not HAM's 2023 value (3.0)
        let row = matrix
            .rows
            .iter()
            .find(|r| r.season == 2023 && r.driver == DriverId::new("VER"))
            .unwrap();
        assert_eq!(row.values[0], 1.0);
    }

    #[test]
    fn test_season_median_when_driver_has_no_history() {
        let mut tables = sample_tables();
        // VER never appears in the standings at all
        tables
            .driver_standings
            .retain(|s| s.driver != DriverId::new("VER"));

        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let (matrix, report) = builder.build().unwrap();

        let entry = report
            .entries
            .iter()
            .find(|e| {
                e.season == 2023
                    && e.driver == DriverId::new("VER")
                    && e.field == "championship_position"
            })
            .unwrap();
        assert_eq!(entry.source, ImputationSource::SeasonMedian);

        // The 2023 season median comes from HAM's observed position
        let row = matrix
            .rows
            .iter()
            .find(|r| r.season == 2023 && r.driver == DriverId::new("VER"))
            .unwrap();
        assert_eq!(row.values[0], 3.0);
    }

    #[test]
    fn test_upcoming_ignores_target_season_results() {
        // The tables already hold results for the season being predicted;
        // those rows must not leak into the matrix or the coverage report.
        let tables = sample_tables();
        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let entries = vec![(DriverId::new("VER"), ConstructorId::new("red_bull"))];

        let (matrix, report) = builder.build_upcoming(2023, &entries).unwrap();

        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].driver, DriverId::new("VER"));
        // Every report entry belongs to a returned row
        for entry in &report.entries {
            assert_eq!(entry.season, 2023);
            assert_eq!(entry.driver, DriverId::new("VER"));
        }
        assert!(report.entries.len() <= NUMERIC_FEATURES.len());
        assert_eq!(
            report.observed_cells + report.entries.len(),
            matrix.rows.len() * NUMERIC_FEATURES.len()
        );
    }

    #[test]
    fn test_upcoming_rows_share_schema() {
        let tables = sample_tables();
        let builder = FeatureBuilder::new(&tables, CIRCUIT, config());
        let entries = vec![
            (DriverId::new("VER"), ConstructorId::new("red_bull")),
            (DriverId::new("PIA"), ConstructorId::new("mclaren")),
        ];
        let (matrix, report) = builder.build_upcoming(2024, &entries).unwrap();

        assert_eq!(matrix.rows.len(), 2);
        for row in &matrix.rows {
            assert_eq!(row.season, 2024);
            assert_eq!(row.values.len(), NUMERIC_FEATURES.len());
            assert!(row.values.iter().all(|v| v.is_finite()));
        }
        // The rookie has no history anywhere: everything imputed
        assert!(report.entries.iter().any(|e| e.driver == DriverId::new("PIA")));
        // Report covers only the upcoming season
        assert!(report.entries.iter().all(|e| e.season == 2024));
    }
}
