//! End-to-end training orchestration
//!
//! Runs feature building, label derivation, season-grouped splitting,
//! roster training, selection and explainability, and bundles the results
//! into one persistable artifact set. The whole run is deterministic for a
//! fixed config, seed and input snapshot.

use crate::artifacts::{RunMetadata, TrainedArtifacts};
use crate::data::split::{DatasetSplitter, FittedTransformSet, SplitPlan, TrainEvalSplit};
use crate::data::{derive_labels, LabelSet};
use crate::features::{FeatureBuilder, FeatureMatrix};
use crate::model::Classifier;
use crate::predict::{ExplainabilityExtractor, InferenceEngine, PredictionResult};
use crate::training::metrics::{ComparisonEntry, EvalMetrics};
use crate::training::{ModelSelector, ModelTrainer, TrainedCandidate};
use crate::{ConstructorId, DriverId, PipelineConfig, Result, SourceTables};

pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        TrainingPipeline { config }
    }

    /// Train on everything the source tables hold for one circuit and
    /// return the full artifact bundle.
    pub fn run(&self, tables: &SourceTables, circuit: &str) -> Result<TrainedArtifacts> {
        let builder = FeatureBuilder::new(tables, circuit, self.config.features.clone());
        let (matrix, coverage) = builder.build()?;
        log::info!(
            "Built {} feature rows over {} seasons at '{}' (coverage {:.1}%)",
            matrix.rows.len(),
            matrix.seasons().len(),
            circuit,
            coverage.coverage() * 100.0
        );

        let labels = derive_labels(&matrix, &tables.race_results)?;
        for season in labels.unusable_seasons() {
            log::warn!("Season {} has no usable winner label, excluding it", season);
        }

        let splitter = DatasetSplitter::new(self.config.split.clone());
        let plan = splitter.split(&matrix, &labels)?;

        let (selected, comparison, transforms, train_seasons, strategy, x_eval, y_eval) =
            match plan {
                SplitPlan::Holdout(split) => self.run_holdout(split)?,
                SplitPlan::LeaveOneSeasonOut(folds) => {
                    self.run_cross_validated(&matrix, &labels, folds)?
                }
            };

        let importance = ExplainabilityExtractor::extract(
            &selected,
            &transforms.feature_names,
            &x_eval,
            &y_eval,
            self.config.seed,
        )?;

        let metadata = RunMetadata {
            seed: self.config.seed,
            circuit: circuit.to_string(),
            train_seasons,
            model_name: selected.name.clone(),
            split_strategy: strategy.to_string(),
            features: self.config.features.clone(),
        };

        Ok(TrainedArtifacts {
            model: selected,
            transforms,
            comparison,
            importance,
            coverage,
            summary: None,
            metadata,
        })
    }

    #[allow(clippy::type_complexity)]
    fn run_holdout(
        &self,
        split: TrainEvalSplit,
    ) -> Result<(
        crate::training::SelectedModel,
        crate::training::ComparisonTable,
        FittedTransformSet,
        Vec<u16>,
        &'static str,
        Vec<Vec<f32>>,
        Vec<bool>,
    )> {
        log::info!(
            "Holdout split: train seasons {:?}, eval seasons {:?}",
            split.train_seasons,
            split.eval_seasons
        );

        let trainer = ModelTrainer::new(self.config.models.clone(), self.config.seed);
        let trained = trainer.train(&split.x_train, &split.y_train)?;
        let (selected, comparison) =
            ModelSelector::select(trained, &split.x_eval, &split.y_eval)?;

        Ok((
            selected,
            comparison,
            split.transforms,
            split.train_seasons,
            "holdout",
            split.x_eval,
            split.y_eval,
        ))
    }

    /// Small-dataset path: score every candidate family across the folds,
    /// average the metrics, then refit the whole roster on every usable
    /// season so the winner ships with all available signal.
    #[allow(clippy::type_complexity)]
    fn run_cross_validated(
        &self,
        matrix: &FeatureMatrix,
        labels: &LabelSet,
        folds: Vec<TrainEvalSplit>,
    ) -> Result<(
        crate::training::SelectedModel,
        crate::training::ComparisonTable,
        FittedTransformSet,
        Vec<u16>,
        &'static str,
        Vec<Vec<f32>>,
        Vec<bool>,
    )> {
        let trainer = ModelTrainer::new(self.config.models.clone(), self.config.seed);

        let mut fold_metrics: Vec<Vec<EvalMetrics>> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for fold in &folds {
            log::info!("Fold: eval season {:?}", fold.eval_seasons);
            let trained = trainer.train(&fold.x_train, &fold.y_train)?;
            if names.is_empty() {
                names = trained
                    .iter()
                    .map(|c| c.classifier.name().to_string())
                    .collect();
                fold_metrics = vec![Vec::new(); trained.len()];
            }
            for candidate in &trained {
                fold_metrics[candidate.roster_index].push(ModelSelector::evaluate(
                    &candidate.classifier,
                    &fold.x_eval,
                    &fold.y_eval,
                ));
            }
        }

        let scored: Vec<ComparisonEntry> = names
            .iter()
            .enumerate()
            .map(|(roster_index, model)| ComparisonEntry {
                model: model.clone(),
                roster_index,
                metrics: EvalMetrics::mean(&fold_metrics[roster_index]),
            })
            .collect();

        // Refit on every usable season with transforms fit on the same rows
        let unusable = labels.unusable_seasons();
        let mut usable_rows = Vec::new();
        let mut y_all = Vec::new();
        for (row, label) in matrix.rows.iter().zip(&labels.labels) {
            if !unusable.contains(&row.season) {
                usable_rows.push(row);
                y_all.push(*label);
            }
        }
        let transforms = FittedTransformSet::fit(&usable_rows, &matrix.numeric_names);
        let x_all = transforms.transform_all(&usable_rows);

        let refit: Vec<TrainedCandidate> = trainer.train(&x_all, &y_all)?;
        let (selected, comparison) = ModelSelector::select_scored(refit, scored)?;

        let mut train_seasons: Vec<u16> = usable_rows.iter().map(|r| r.season).collect();
        train_seasons.sort_unstable();
        train_seasons.dedup();

        Ok((
            selected,
            comparison,
            transforms,
            train_seasons,
            "leave_one_season_out",
            x_all,
            y_all,
        ))
    }
}

/// Predict the upcoming edition of the artifact's race from its entry list.
/// Features are rebuilt with the settings persisted at training time, so a
/// later config edit cannot shift their semantics under the same schema.
pub fn predict_upcoming(
    artifacts: &TrainedArtifacts,
    tables: &SourceTables,
    season: u16,
    entries: &[(DriverId, ConstructorId)],
) -> Result<PredictionResult> {
    let builder = FeatureBuilder::new(
        tables,
        artifacts.metadata.circuit.clone(),
        artifacts.metadata.features.clone(),
    );
    let (matrix, coverage) = builder.build_upcoming(season, entries)?;
    log::info!(
        "Upcoming matrix for season {}: {} entries, coverage {:.1}%",
        season,
        matrix.rows.len(),
        coverage.coverage() * 100.0
    );

    let engine = InferenceEngine::new(artifacts.model.clone(), artifacts.transforms.clone());
    engine.predict(&matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConstructorStandingRecord, DriverStandingRecord, RaceResultRecord, TrackRecord,
        WeatherRecord,
    };
    use chrono::NaiveDate;

    const CIRCUIT: &str = "marina_bay";

    struct Entry {
        driver: &'static str,
        team: &'static str,
        position: u8,
    }

    fn season_tables(tables: &mut SourceTables, season: u16, entries: &[Entry]) {
        for entry in entries {
            tables.race_results.push(RaceResultRecord {
                season,
                date: NaiveDate::from_ymd_opt(season as i32, 9, 22).unwrap(),
                circuit: CIRCUIT.to_string(),
                driver: DriverId::new(entry.driver),
                constructor: ConstructorId::new(entry.team),
                grid: Some(entry.position),
                position: Some(entry.position),
                status: "Finished".to_string(),
                points: (26 - entry.position as i32).max(0) as f32,
            });
            tables.driver_standings.push(DriverStandingRecord {
                season,
                driver: DriverId::new(entry.driver),
                constructor: ConstructorId::new(entry.team),
                position: entry.position,
                points: 400.0 / entry.position as f32,
                wins: if entry.position == 1 { 5 } else { 0 },
            });
            tables.constructor_standings.push(ConstructorStandingRecord {
                season,
                constructor: ConstructorId::new(entry.team),
                position: entry.position,
                points: 600.0 / entry.position as f32,
                wins: if entry.position == 1 { 5 } else { 0 },
            });
        }
        tables.weather.push(WeatherRecord {
            season,
            circuit: CIRCUIT.to_string(),
            temperature_c: 29.5,
            humidity_pct: 78.0,
            precipitation_mm: 1.0,
            wind_speed_kmh: 9.0,
            pressure_hpa: 1011.0,
        });
    }

    fn base_tables() -> SourceTables {
        SourceTables {
            tracks: vec![TrackRecord {
                circuit: CIRCUIT.to_string(),
                overtaking_difficulty: 0.9,
                tire_degradation: 0.6,
                laps: 62,
            }],
            ..SourceTables::default()
        }
    }

    /// Seven seasons where the championship leader always wins
    fn large_fixture() -> SourceTables {
        let mut tables = base_tables();
        for season in 2017..2024u16 {
            season_tables(
                &mut tables,
                season,
                &[
                    Entry { driver: "VER", team: "red_bull", position: 1 },
                    Entry { driver: "HAM", team: "mercedes", position: 2 },
                    Entry { driver: "ALO", team: "aston_martin", position: 3 },
                    Entry { driver: "NOR", team: "mclaren", position: 4 },
                ],
            );
        }
        tables
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            models: crate::ModelRosterConfig::default_for_test(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_run_is_deterministic() {
        let tables = large_fixture();
        let run = || TrainingPipeline::new(test_config()).run(&tables, CIRCUIT).unwrap();

        let a = run();
        let b = run();

        assert_eq!(a.metadata.model_name, b.metadata.model_name);
        let order_a: Vec<&str> = a.comparison.entries.iter().map(|e| e.model.as_str()).collect();
        let order_b: Vec<&str> = b.comparison.entries.iter().map(|e| e.model.as_str()).collect();
        assert_eq!(order_a, order_b);
        for (ea, eb) in a.comparison.entries.iter().zip(&b.comparison.entries) {
            assert_eq!(ea.metrics.f1, eb.metrics.f1);
            assert_eq!(ea.metrics.auc, eb.metrics.auc);
        }
    }

    #[test]
    fn test_holdout_strategy_recorded_for_large_dataset() {
        let tables = large_fixture();
        let artifacts = TrainingPipeline::new(test_config()).run(&tables, CIRCUIT).unwrap();

        assert_eq!(artifacts.metadata.split_strategy, "holdout");
        // Most recent season is held out of training
        assert!(!artifacts.metadata.train_seasons.contains(&2023));
        assert_eq!(artifacts.comparison.entries.len(), 4);
    }

    #[test]
    fn test_three_seasons_fall_back_to_cross_validation() {
        let mut tables = base_tables();
        // Driver "IMP" improves season over season and wins the last two;
        // "VET" declines from champion to midfield.
        season_tables(
            &mut tables,
            2021,
            &[
                Entry { driver: "VET", team: "ferrari", position: 1 },
                Entry { driver: "IMP", team: "red_bull", position: 3 },
                Entry { driver: "MID", team: "alpine", position: 5 },
                Entry { driver: "TAI", team: "haas", position: 9 },
            ],
        );
        season_tables(
            &mut tables,
            2022,
            &[
                Entry { driver: "IMP", team: "red_bull", position: 1 },
                Entry { driver: "VET", team: "ferrari", position: 4 },
                Entry { driver: "MID", team: "alpine", position: 6 },
                Entry { driver: "TAI", team: "haas", position: 10 },
            ],
        );
        season_tables(
            &mut tables,
            2023,
            &[
                Entry { driver: "IMP", team: "red_bull", position: 1 },
                Entry { driver: "VET", team: "ferrari", position: 7 },
                Entry { driver: "MID", team: "alpine", position: 5 },
                Entry { driver: "TAI", team: "haas", position: 11 },
            ],
        );

        let artifacts = TrainingPipeline::new(test_config()).run(&tables, CIRCUIT).unwrap();
        assert_eq!(artifacts.metadata.split_strategy, "leave_one_season_out");
        assert_eq!(artifacts.metadata.train_seasons, vec![2021, 2022, 2023]);

        // The 2024 grid: the improving driver leads the standings, the
        // declining one sits midfield. The model must favour "IMP".
        season_tables(
            &mut tables,
            2024,
            &[
                Entry { driver: "IMP", team: "red_bull", position: 1 },
                Entry { driver: "VET", team: "ferrari", position: 8 },
                Entry { driver: "MID", team: "alpine", position: 5 },
                Entry { driver: "TAI", team: "haas", position: 12 },
            ],
        );
        // Drop the 2024 race result: the race has not happened yet
        tables.race_results.retain(|r| r.season != 2024);

        let entries = vec![
            (DriverId::new("IMP"), ConstructorId::new("red_bull")),
            (DriverId::new("VET"), ConstructorId::new("ferrari")),
            (DriverId::new("MID"), ConstructorId::new("alpine")),
            (DriverId::new("TAI"), ConstructorId::new("haas")),
        ];
        let result = predict_upcoming(&artifacts, &tables, 2024, &entries).unwrap();

        assert_eq!(result.favourite().unwrap().driver, DriverId::new("IMP"));
        let imp = &result.entries[0];
        let vet = result
            .entries
            .iter()
            .find(|e| e.driver == DriverId::new("VET"))
            .unwrap();
        assert!(imp.probability > vet.probability);
    }

    #[test]
    fn test_rookie_entry_predicted_with_unknown_flag() {
        let tables = large_fixture();
        let artifacts = TrainingPipeline::new(test_config()).run(&tables, CIRCUIT).unwrap();

        let entries = vec![
            (DriverId::new("VER"), ConstructorId::new("red_bull")),
            (DriverId::new("HAM"), ConstructorId::new("mercedes")),
            // Never raced here, unknown to the encoders
            (DriverId::new("PIA"), ConstructorId::new("sauber")),
        ];
        let result = predict_upcoming(&artifacts, &tables, 2024, &entries).unwrap();

        assert_eq!(result.entries.len(), 3);
        let rookie = result
            .entries
            .iter()
            .find(|e| e.driver == DriverId::new("PIA"))
            .unwrap();
        assert!(rookie.unknown_category);
        let total: f32 = result.entries.iter().map(|e| e.probability).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_prediction_uses_training_time_feature_settings() {
        let tables = large_fixture();
        let mut config = test_config();
        config.features.form_window = 2;
        config.features.decay_half_life = 1.5;
        let artifacts = TrainingPipeline::new(config).run(&tables, CIRCUIT).unwrap();

        // The bundle carries the settings the matrix was built with
        assert_eq!(artifacts.metadata.features.form_window, 2);
        assert_eq!(artifacts.metadata.features.decay_half_life, 1.5);

        // Prediction needs no config: a later edit cannot reach it
        let entries = vec![
            (DriverId::new("VER"), ConstructorId::new("red_bull")),
            (DriverId::new("HAM"), ConstructorId::new("mercedes")),
        ];
        let result = predict_upcoming(&artifacts, &tables, 2024, &entries).unwrap();
        assert_eq!(result.entries.len(), 2);
    }

    #[test]
    fn test_artifacts_round_trip_through_disk() {
        let tables = large_fixture();
        let artifacts = TrainingPipeline::new(test_config()).run(&tables, CIRCUIT).unwrap();

        let dir = std::env::temp_dir().join("grandprix_pipeline_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("artifacts.json");
        artifacts.save(&path).unwrap();

        let loaded = TrainedArtifacts::load(&path).unwrap();
        assert_eq!(loaded.metadata.model_name, artifacts.metadata.model_name);
        assert_eq!(
            loaded.comparison.entries.len(),
            artifacts.comparison.entries.len()
        );
        assert_eq!(
            loaded.importance.entries.len(),
            loaded.transforms.feature_names.len()
        );
        std::fs::remove_file(&path).unwrap();
    }
}
