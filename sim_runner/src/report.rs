//! Batch result formatting

use sim_core::{BatchResult, EncounterConfig};
use std::fmt::Write;

/// Plain-text summary: DPS distribution followed by a per-spell breakdown
pub fn format_text(config: &EncounterConfig, batch: &BatchResult) -> String {
    let mut out = String::new();
    let total_damage: f64 = batch.spells.iter().map(|s| s.metrics.damage).sum();
    let iterations = batch.iterations.max(1) as f64;

    let _ = writeln!(
        out,
        "{} iterations of {} against {} target(s), seed {}",
        batch.iterations, config.duration, config.target_count, config.seed
    );
    let _ = writeln!(
        out,
        "DPS: {:.1} (stdev {:.1}, min {:.1}, max {:.1})",
        batch.dps.mean, batch.dps.stdev, batch.dps.min, batch.dps.max
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<20} {:>8} {:>8} {:>7} {:>7} {:>12} {:>7}",
        "Spell", "Casts", "Ticks", "Crit%", "Miss", "Damage", "Share"
    );

    for report in &batch.spells {
        let m = &report.metrics;
        if m.casts == 0 && m.damage == 0.0 {
            continue;
        }
        let share = if total_damage > 0.0 {
            m.damage / total_damage * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "{:<20} {:>8.1} {:>8.1} {:>6.1}% {:>7.1} {:>12.0} {:>6.1}%",
            report.label,
            m.casts as f64 / iterations,
            m.ticks as f64 / iterations,
            m.crit_rate(),
            m.misses as f64 / iterations,
            m.damage / iterations,
            share
        );
    }
    out
}

pub fn format_json(batch: &BatchResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{ActionId, DistributionMetrics, SpellMetrics, SpellReport};

    fn batch() -> BatchResult {
        BatchResult {
            iterations: 2,
            dps: DistributionMetrics {
                mean: 1500.0,
                stdev: 50.0,
                min: 1450.0,
                max: 1550.0,
            },
            spells: vec![
                SpellReport {
                    label: "Fireball".to_string(),
                    action_id: ActionId::spell(133),
                    metrics: SpellMetrics {
                        casts: 40,
                        hits: 36,
                        crits: 9,
                        misses: 4,
                        damage: 300_000.0,
                        ..SpellMetrics::default()
                    },
                },
                SpellReport {
                    label: "Scorch".to_string(),
                    action_id: ActionId::spell(2948),
                    metrics: SpellMetrics::default(),
                },
            ],
        }
    }

    #[test]
    fn test_text_report() {
        let text = format_text(&EncounterConfig::default(), &batch());
        assert!(text.contains("DPS: 1500.0"));
        assert!(text.contains("Fireball"));
        assert!(text.contains("100.0%"));
        // Spells that never did anything are left out
        assert!(!text.contains("Scorch"));
    }

    #[test]
    fn test_json_report() {
        let json = format_json(&batch()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["iterations"], 2);
        assert_eq!(value["spells"][0]["label"], "Fireball");
        assert_eq!(value["spells"][0]["metrics"]["casts"], 40);
    }
}
