use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use grandprix::artifacts::TrainedArtifacts;
use grandprix::pipeline::{predict_upcoming, TrainingPipeline};
use grandprix::{ConstructorId, DriverId, Error, PipelineConfig, Result, SourceTables};

#[derive(Parser)]
#[command(name = "grandprix", about = "Grand Prix winner prediction pipeline")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the candidate roster and persist the selected model
    Train {
        /// JSON file holding the raw source tables
        #[arg(short, long)]
        tables: PathBuf,

        /// Target circuit identifier, e.g. "marina_bay"
        #[arg(long)]
        circuit: String,

        /// Where to write the artifact bundle
        #[arg(short, long, default_value = "artifacts.json")]
        out: PathBuf,
    },

    /// Predict win probabilities for an upcoming season's entry list
    Predict {
        /// Artifact bundle produced by `train`
        #[arg(short, long, default_value = "artifacts.json")]
        artifacts: PathBuf,

        /// JSON file holding the raw source tables
        #[arg(short, long)]
        tables: PathBuf,

        /// Season to predict; its entry list comes from the driver standings
        #[arg(short, long)]
        season: u16,

        /// Write the bundle back with the prediction summary attached
        #[arg(long)]
        save_summary: bool,
    },

    /// Print the comparison table and feature importances of a bundle
    Explain {
        #[arg(short, long, default_value = "artifacts.json")]
        artifacts: PathBuf,
    },

    /// Write the default configuration to the config path
    InitConfig,
}

fn load_tables(path: &Path) -> Result<SourceTables> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn load_config(path: &str) -> Result<PipelineConfig> {
    if Path::new(path).exists() {
        PipelineConfig::load(path)
    } else {
        log::info!("No config at {}, using defaults", path);
        Ok(PipelineConfig::default())
    }
}

/// The predict entry list: every driver in that season's standings
fn entry_list(tables: &SourceTables, season: u16) -> Result<Vec<(DriverId, ConstructorId)>> {
    let mut standings: Vec<_> = tables
        .driver_standings
        .iter()
        .filter(|s| s.season == season)
        .collect();
    if standings.is_empty() {
        return Err(Error::EmptyInput(format!(
            "no driver standings for season {}",
            season
        )));
    }
    standings.sort_by_key(|s| s.position);
    Ok(standings
        .iter()
        .map(|s| (s.driver.clone(), s.constructor.clone()))
        .collect())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Train { tables, circuit, out } => {
            let tables = load_tables(&tables)?;
            let artifacts = TrainingPipeline::new(config).run(&tables, &circuit)?;

            println!("Model comparison:");
            println!("{}", artifacts.comparison);
            println!(
                "Selected: {} ({})",
                artifacts.metadata.model_name, artifacts.model.metrics
            );
            println!(
                "Feature coverage: {:.1}% observed, {} cells imputed",
                artifacts.coverage.coverage() * 100.0,
                artifacts.coverage.imputed_cells()
            );
            artifacts.save(&out)?;
        }
        Command::Predict {
            artifacts,
            tables,
            season,
            save_summary,
        } => {
            let path = artifacts;
            let mut artifacts = TrainedArtifacts::load(&path)?;
            let tables = load_tables(&tables)?;
            let entries = entry_list(&tables, season)?;

            let result = predict_upcoming(&artifacts, &tables, season, &entries)?;
            println!(
                "Season {} at '{}' ({}):",
                result.season, result.circuit, artifacts.metadata.model_name
            );
            for forecast in &result.entries {
                println!(
                    "{:>2}. {:<6} {:<16} {:>5.1}%{}",
                    forecast.rank,
                    forecast.driver,
                    forecast.constructor,
                    forecast.probability * 100.0,
                    if forecast.unknown_category { "  (new entry)" } else { "" }
                );
            }

            if save_summary {
                artifacts.summary = Some(result);
                artifacts.save(&path)?;
            }
        }
        Command::Explain { artifacts } => {
            let artifacts = TrainedArtifacts::load(&artifacts)?;
            println!("Model comparison:");
            println!("{}", artifacts.comparison);
            println!("Feature importance ({}):", artifacts.metadata.model_name);
            println!("{}", artifacts.importance);
        }
        Command::InitConfig => {
            PipelineConfig::default().save(&cli.config)?;
            println!("Wrote default configuration to {}", cli.config);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(err) = run(cli) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
