//! Damage metrics per spell, per iteration and across a batch

use crate::sim::Simulation;
use crate::spell::{HitOutcome, SpellResult};
use crate::types::{ActionId, SimTime};
use serde::{Deserialize, Serialize};

/// Counters for one spell in one iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellMetrics {
    pub casts: u32,
    /// Direct hits that landed, crits included
    pub hits: u32,
    pub crits: u32,
    pub misses: u32,
    /// Periodic ticks that landed
    pub ticks: u32,
    pub damage: f64,
}

impl SpellMetrics {
    pub(crate) fn record(&mut self, result: &SpellResult) {
        match result.outcome {
            HitOutcome::Miss => {
                self.misses += 1;
                return;
            }
            HitOutcome::Crit => self.crits += 1,
            HitOutcome::Hit => {}
        }
        if result.is_periodic {
            self.ticks += 1;
        } else {
            self.hits += 1;
        }
        self.damage += result.damage;
    }

    /// Crit rate as percentage of landed hits and ticks
    pub fn crit_rate(&self) -> f64 {
        let landed = self.hits + self.ticks;
        if landed == 0 {
            return 0.0;
        }
        self.crits as f64 / landed as f64 * 100.0
    }

    fn merge(&mut self, other: &SpellMetrics) {
        self.casts += other.casts;
        self.hits += other.hits;
        self.crits += other.crits;
        self.misses += other.misses;
        self.ticks += other.ticks;
        self.damage += other.damage;
    }
}

/// A spell's metrics under its display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellReport {
    pub label: String,
    pub action_id: ActionId,
    pub metrics: SpellMetrics,
}

/// Outcome of one iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: u32,
    pub duration: SimTime,
    /// Damage dealt by the player's spells
    pub damage: f64,
    pub dps: f64,
    /// The player's spells in registration order
    pub spells: Vec<SpellReport>,
}

impl IterationResult {
    pub(crate) fn collect(sim: &Simulation) -> Self {
        let player = sim.player();
        let spells: Vec<SpellReport> = sim
            .unit(player)
            .spells()
            .iter()
            .map(|&id| {
                let spell = sim.spell(id);
                SpellReport {
                    label: spell.label.clone(),
                    action_id: spell.action_id,
                    metrics: spell.metrics,
                }
            })
            .collect();
        let damage = spells.iter().map(|s| s.metrics.damage).sum::<f64>();
        let seconds = sim.duration().as_secs_f64();
        IterationResult {
            iteration: sim.iteration(),
            duration: sim.duration(),
            damage,
            dps: if seconds > 0.0 { damage / seconds } else { 0.0 },
            spells,
        }
    }
}

/// Summary statistics of one value across iterations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetrics {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

impl DistributionMetrics {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return DistributionMetrics::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        DistributionMetrics {
            mean,
            stdev: variance.sqrt(),
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Aggregate over every iteration of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub iterations: u32,
    pub dps: DistributionMetrics,
    /// Per-spell totals summed over every iteration
    pub spells: Vec<SpellReport>,
}

impl BatchResult {
    /// Reduce iteration results, which must be ordered by iteration index
    pub fn from_iterations(results: &[IterationResult]) -> Self {
        let dps: Vec<f64> = results.iter().map(|r| r.dps).collect();

        let mut spells: Vec<SpellReport> = Vec::new();
        for result in results {
            for report in &result.spells {
                match spells.iter_mut().find(|s| s.label == report.label) {
                    Some(total) => total.metrics.merge(&report.metrics),
                    None => spells.push(report.clone()),
                }
            }
        }

        BatchResult {
            iterations: results.len() as u32,
            dps: DistributionMetrics::from_samples(&dps),
            spells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpellId, UnitId};

    fn result(outcome: HitOutcome, damage: f64, is_periodic: bool) -> SpellResult {
        SpellResult {
            spell: SpellId(0),
            target: UnitId(1),
            outcome,
            damage,
            is_periodic,
        }
    }

    #[test]
    fn test_record_outcomes() {
        let mut metrics = SpellMetrics::default();
        metrics.record(&result(HitOutcome::Hit, 100.0, false));
        metrics.record(&result(HitOutcome::Crit, 150.0, false));
        metrics.record(&result(HitOutcome::Miss, 0.0, false));
        metrics.record(&result(HitOutcome::Hit, 20.0, true));

        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.crits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.ticks, 1);
        assert!((metrics.damage - 270.0).abs() < 1e-9);
        assert!((metrics.crit_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_distribution() {
        let stats = DistributionMetrics::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.stdev - 2.0).abs() < 1e-12);
        assert!((stats.min - 2.0).abs() < f64::EPSILON);
        assert!((stats.max - 9.0).abs() < f64::EPSILON);
        assert_eq!(DistributionMetrics::from_samples(&[]), DistributionMetrics::default());
    }

    #[test]
    fn test_batch_reduction() {
        let report = |damage: f64, casts: u32| SpellReport {
            label: "Fireball".to_string(),
            action_id: ActionId::spell(133),
            metrics: SpellMetrics {
                casts,
                damage,
                ..SpellMetrics::default()
            },
        };
        let iterations = vec![
            IterationResult {
                iteration: 0,
                duration: SimTime::from_secs(100),
                damage: 1000.0,
                dps: 10.0,
                spells: vec![report(1000.0, 5)],
            },
            IterationResult {
                iteration: 1,
                duration: SimTime::from_secs(100),
                damage: 3000.0,
                dps: 30.0,
                spells: vec![report(3000.0, 7)],
            },
        ];

        let batch = BatchResult::from_iterations(&iterations);
        assert_eq!(batch.iterations, 2);
        assert!((batch.dps.mean - 20.0).abs() < 1e-12);
        assert_eq!(batch.spells.len(), 1);
        assert_eq!(batch.spells[0].metrics.casts, 12);
        assert!((batch.spells[0].metrics.damage - 4000.0).abs() < 1e-9);
    }
}
