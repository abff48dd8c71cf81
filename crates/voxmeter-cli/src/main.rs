mod logging;
mod replay;
mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use voxmeter_core::config::Config;

use crate::replay::ReportFormat;

#[derive(Parser)]
#[command(
    name = "voxmeter",
    about = "Per-call voice quality estimation from voice pipeline timing events",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded JSON Lines session log through a fresh estimator
    Replay {
        /// Path to the session log
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: ReportFormat,
    },

    /// Run concurrent synthetic calls and report their quality
    Simulate {
        /// Number of concurrent calls
        #[arg(long)]
        calls: Option<u32>,

        /// Conversation turns per call. The silence between turns counts as
        /// inferred loss, so more than one turn drives MOS toward its floor.
        #[arg(long)]
        turns: Option<u32>,

        /// Base RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: SimulateFormat,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Get a value by dotted path (e.g. simulation.calls)
    Get { key: String },
    /// Check the configuration for problems
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SimulateFormat {
    Json,
    Prometheus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_dir);
    let config = Config::load(&config_path)?;

    logging::init(&config.logging(), cli.verbose)?;
    tracing::debug!(path = %config_path.display(), "Loaded config");

    match cli.command {
        Commands::Replay { file, format } => {
            let snapshot = replay::replay_file(&file, &config.estimator())?;
            println!("{}", replay::render(&snapshot, format)?);
        }
        Commands::Simulate {
            calls,
            turns,
            seed,
            format,
        } => {
            let (_, errors) = config.validate();
            if !errors.is_empty() {
                anyhow::bail!("Invalid configuration: {}", errors.join("; "));
            }

            let mut sim = config.simulation();
            if let Some(calls) = calls {
                sim.calls = calls;
            }
            if let Some(turns) = turns {
                sim.turns = turns;
            }
            if let Some(seed) = seed {
                sim.seed = seed;
            }

            match format {
                SimulateFormat::Json => {
                    let report =
                        simulate::run(&sim, &config.estimator(), config.metrics_enabled()).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                SimulateFormat::Prometheus => {
                    let handle = voxmeter_quality::export::install_prometheus_recorder()?;
                    let report = simulate::run(&sim, &config.estimator(), true).await?;
                    voxmeter_quality::export::record_fleet_outcome(&report.fleet_outcome());
                    print!("{}", handle.render());
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("Config: {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
                println!("Config OK ({} warning(s))", warnings.len());
            }
        },
    }

    Ok(())
}
