//! Hit/crit rolls and damage dealing

use crate::error::SimResult;
use crate::sim::Simulation;
use crate::types::{SpellFlags, SpellId, UnitId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Which rolls an outcome applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Miss roll, then crit roll
    MagicHitAndCrit,
    /// Miss roll only
    MagicHit,
    /// Crit roll only
    MagicCrit,
    /// Neither roll
    AlwaysHit,
    /// Periodic tick; neither roll
    Tick,
}

impl Outcome {
    fn rolls_hit(self) -> bool {
        matches!(self, Outcome::MagicHitAndCrit | Outcome::MagicHit)
    }

    fn rolls_crit(self) -> bool {
        matches!(self, Outcome::MagicHitAndCrit | Outcome::MagicCrit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
    Miss,
    Hit,
    Crit,
}

/// Result of one damage event against one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpellResult {
    pub spell: SpellId,
    pub target: UnitId,
    pub outcome: HitOutcome,
    pub damage: f64,
    pub is_periodic: bool,
}

impl SpellResult {
    pub fn landed(&self) -> bool {
        self.outcome != HitOutcome::Miss
    }

    pub fn did_crit(&self) -> bool {
        self.outcome == HitOutcome::Crit
    }
}

impl Simulation {
    /// Chance (0.0 to 1.0) for the spell to miss
    pub fn spell_miss_chance(&self, spell: SpellId) -> f64 {
        let state = &self.spells[spell.0];
        let unit = &self.units[state.unit.0];
        let hit_percent = unit.spell_hit_percent + state.bonus_hit_rating / self.constants.hit_rating_per_percent;
        (self.constants.base_spell_miss - hit_percent / 100.0).clamp(0.0, 1.0)
    }

    /// Chance (0.0 to 1.0) for the spell to crit
    pub fn spell_crit_chance(&self, spell: SpellId) -> f64 {
        let state = &self.spells[spell.0];
        let unit = &self.units[state.unit.0];
        let crit_percent =
            unit.spell_crit_percent + state.bonus_crit_rating / self.constants.crit_rating_per_percent;
        (crit_percent / 100.0).clamp(0.0, 1.0)
    }

    /// Roll the outcome and compute damage from the spell's current multipliers
    pub fn calc_damage(&mut self, spell: SpellId, target: UnitId, base_damage: f64, outcome: Outcome) -> SpellResult {
        self.roll(spell, target, base_damage, outcome, false)
    }

    /// Like `calc_damage`, for a periodic tick
    pub fn calc_periodic_damage(
        &mut self,
        spell: SpellId,
        target: UnitId,
        base_damage: f64,
        outcome: Outcome,
    ) -> SpellResult {
        self.roll(spell, target, base_damage, outcome, true)
    }

    fn roll(&mut self, spell: SpellId, target: UnitId, base_damage: f64, outcome: Outcome, is_periodic: bool) -> SpellResult {
        let miss_chance = self.spell_miss_chance(spell);
        let crit_chance = self.spell_crit_chance(spell);

        let hit_outcome = if outcome.rolls_hit() && self.proc(miss_chance) {
            HitOutcome::Miss
        } else if outcome.rolls_crit() && self.proc(crit_chance) {
            HitOutcome::Crit
        } else {
            HitOutcome::Hit
        };

        let state = &self.spells[spell.0];
        let damage = match hit_outcome {
            HitOutcome::Miss => 0.0,
            HitOutcome::Hit => base_damage * state.damage_multiplier * state.damage_multiplier_additive,
            HitOutcome::Crit => {
                base_damage * state.damage_multiplier * state.damage_multiplier_additive * state.crit_multiplier
            }
        };

        SpellResult {
            spell,
            target,
            outcome: hit_outcome,
            damage,
            is_periodic,
        }
    }

    /// Record a direct damage result and notify the caster's observers
    pub fn deal_damage(&mut self, result: &SpellResult) -> SimResult<()> {
        self.record(result);
        let caster = self.spells[result.spell.0].unit;
        self.dispatch_spell_hit(caster, result)
    }

    pub fn calc_and_deal_damage(
        &mut self,
        spell: SpellId,
        target: UnitId,
        base_damage: f64,
        outcome: Outcome,
    ) -> SimResult<SpellResult> {
        let result = self.calc_damage(spell, target, base_damage, outcome);
        self.deal_damage(&result)?;
        Ok(result)
    }

    /// Record a periodic tick and notify the caster's periodic observers
    pub fn deal_periodic_damage(&mut self, result: &SpellResult) -> SimResult<()> {
        self.record(result);
        let caster = self.spells[result.spell.0].unit;
        self.dispatch_periodic_damage(caster, result)
    }

    pub fn calc_and_deal_periodic_damage(
        &mut self,
        spell: SpellId,
        target: UnitId,
        base_damage: f64,
        outcome: Outcome,
    ) -> SimResult<SpellResult> {
        let result = self.calc_periodic_damage(spell, target, base_damage, outcome);
        self.deal_periodic_damage(&result)?;
        Ok(result)
    }

    fn record(&mut self, result: &SpellResult) {
        trace!(
            time = %self.now(),
            spell = %self.spells[result.spell.0].label,
            outcome = ?result.outcome,
            damage = result.damage,
            "damage"
        );
        self.units[result.target.0].damage_taken += result.damage;
        let state = &mut self.spells[result.spell.0];
        if state.flags.matches(SpellFlags::NO_METRICS) {
            return;
        }
        state.metrics.record(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncounterConfig;
    use crate::spell::SpellConfig;
    use crate::types::SpellSchool;

    fn setup(crit_percent: f64, config: SpellConfig) -> (Simulation, SpellId) {
        let mut sim = Simulation::new(&EncounterConfig {
            seed: 12345,
            ..EncounterConfig::default()
        });
        let player = sim.player();
        sim.unit_mut(player).spell_crit_percent = crit_percent;
        let spell = sim.register_spell(player, config).unwrap();
        sim.begin_iteration(0).unwrap();
        (sim, spell)
    }

    fn scorch() -> SpellConfig {
        SpellConfig {
            label: "Scorch".to_string(),
            school: SpellSchool::FIRE,
            damage_multiplier: 1.1,
            damage_multiplier_additive: 1.05,
            crit_multiplier: Some(2.0),
            ..SpellConfig::default()
        }
    }

    #[test]
    fn test_always_hit_damage() {
        let (mut sim, spell) = setup(100.0, scorch());
        let target = sim.primary_target();
        let result = sim.calc_damage(spell, target, 1000.0, Outcome::AlwaysHit);
        assert_eq!(result.outcome, HitOutcome::Hit);
        assert!((result.damage - 1155.0).abs() < 1e-9);
    }

    #[test]
    fn test_guaranteed_crit() {
        let (mut sim, spell) = setup(100.0, scorch());
        let target = sim.primary_target();
        let result = sim.calc_damage(spell, target, 1000.0, Outcome::MagicCrit);
        assert!(result.did_crit());
        assert!((result.damage - 2310.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rating_removes_misses() {
        let (mut sim, spell) = setup(0.0, SpellConfig {
            bonus_hit_rating: 17.0 * 102.45,
            ..scorch()
        });
        assert!(sim.spell_miss_chance(spell).abs() < 1e-9);
        let target = sim.primary_target();
        for _ in 0..200 {
            let result = sim.calc_damage(spell, target, 100.0, Outcome::MagicHitAndCrit);
            assert_eq!(result.outcome, HitOutcome::Hit);
        }
    }

    #[test]
    fn test_crit_rating_adds_chance() {
        let (sim, spell) = setup(
            10.0,
            SpellConfig {
                bonus_crit_rating: 5.0 * 179.28,
                ..scorch()
            },
        );
        assert!((sim.spell_crit_chance(spell) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_miss_rate_matches_chance() {
        let (mut sim, spell) = setup(0.0, scorch());
        let target = sim.primary_target();
        let misses = (0..20_000)
            .filter(|_| !sim.calc_damage(spell, target, 100.0, Outcome::MagicHit).landed())
            .count();
        assert!((misses as f64 / 20_000.0 - 0.17).abs() < 0.02);
    }

    #[test]
    fn test_deal_damage_records_metrics() {
        let (mut sim, spell) = setup(100.0, scorch());
        let target = sim.primary_target();
        sim.calc_and_deal_damage(spell, target, 500.0, Outcome::MagicCrit).unwrap();
        sim.calc_and_deal_periodic_damage(spell, target, 100.0, Outcome::Tick).unwrap();

        let metrics = &sim.spell(spell).metrics;
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.crits, 1);
        assert_eq!(metrics.ticks, 1);
        assert!((metrics.damage - (1155.0 + 115.5)).abs() < 1e-9);
        assert!((sim.unit(target).damage_taken() - metrics.damage).abs() < 1e-9);
    }
}
