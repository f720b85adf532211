//! Batch runner: many independent iterations, sequential or on the rayon pool

use super::Simulation;
use crate::config::EncounterConfig;
use crate::error::{SimError, SimResult};
use crate::metrics::{BatchResult, IterationResult};
use rayon::prelude::*;
use tracing::info;

/// Seed for iteration `i`, independent of which worker runs it
pub fn seed_for_iteration(base_seed: u64, iteration: u32) -> u64 {
    // splitmix64 step
    let mut z = base_seed.wrapping_add((iteration as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn build<F>(config: &EncounterConfig, setup: &F) -> SimResult<Simulation>
where
    F: Fn(&mut Simulation) -> SimResult<()>,
{
    let mut sim = Simulation::new(config);
    setup(&mut sim)?;
    Ok(sim)
}

/// Run every iteration of the encounter and reduce the results
///
/// `setup` installs agents and content on a fresh simulation. It runs once
/// on the calling thread first, so configuration errors surface directly,
/// and once more for each parallel worker.
pub fn run_batch<F>(config: &EncounterConfig, setup: F) -> SimResult<BatchResult>
where
    F: Fn(&mut Simulation) -> SimResult<()> + Sync + Send,
{
    config.validate()?;
    info!(
        iterations = config.iterations,
        seed = config.seed,
        parallel = config.parallel,
        "starting batch"
    );

    let results = if config.parallel {
        // Fail fast before spinning up workers
        build(config, &setup)?;
        run_parallel(config, &setup)?
    } else {
        let mut sim = build(config, &setup)?;
        run_sequential(&mut sim, config.iterations)?
    };

    let batch = BatchResult::from_iterations(&results);
    info!(
        iterations = batch.iterations,
        mean_dps = batch.dps.mean,
        stdev = batch.dps.stdev,
        "batch complete"
    );
    Ok(batch)
}

/// Run iterations `0..iterations` on one simulation
pub fn run_sequential(sim: &mut Simulation, iterations: u32) -> SimResult<Vec<IterationResult>> {
    (0..iterations).map(|i| sim.run_iteration(i)).collect()
}

fn run_parallel<F>(config: &EncounterConfig, setup: &F) -> SimResult<Vec<IterationResult>>
where
    F: Fn(&mut Simulation) -> SimResult<()> + Sync + Send,
{
    (0..config.iterations)
        .into_par_iter()
        .map_init(
            || build(config, setup),
            |worker, i| match worker {
                Ok(sim) => sim.run_iteration(i),
                Err(e) => Err(SimError::WorkerSetup(e.to_string())),
            },
        )
        .collect()
}
