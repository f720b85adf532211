//! sim_runner - Headless DPS simulation of the demonstration fire mage

mod demo;
mod report;

use clap::Parser;
use sim_core::config::load_encounter_config;
use sim_core::{run_batch, EncounterConfig, SimTime};
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

/// Simulate a fire mage against training dummies
#[derive(Parser, Debug)]
#[command(name = "sim_runner")]
#[command(about = "Deterministic combat simulation runner")]
#[command(version)]
struct Args {
    /// Encounter TOML file; command-line values override it
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    iterations: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Fight length in seconds
    #[arg(long)]
    duration: Option<f64>,

    #[arg(long)]
    targets: Option<usize>,

    /// Run every iteration on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Talent string, one digit per talent and trees separated by '-'
    #[arg(long, default_value = demo::DEFAULT_TALENTS)]
    talents: String,

    /// Print the batch result as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn encounter(&self) -> Result<EncounterConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => load_encounter_config(path)?,
            None => EncounterConfig::default(),
        };
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(duration) = self.duration {
            config.duration = SimTime::from_secs_f64(duration);
        }
        if let Some(targets) = self.targets {
            config.target_count = targets;
        }
        if self.sequential {
            config.parallel = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Initialize logging to stderr, filtered by RUST_LOG (default info)
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = args.encounter()?;
    let talents = demo::fire_mage_talents().parse(&args.talents)?;
    info!(talents = %args.talents, points = talents.total_points(), "fire mage");

    let batch = run_batch(&config, |sim| demo::install(sim, &talents))?;

    if args.json {
        println!("{}", report::format_json(&batch)?);
    } else {
        print!("{}", report::format_text(&config, &batch));
    }
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
