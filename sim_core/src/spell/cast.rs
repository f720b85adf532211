//! Casting: resource checks, GCD, cast time and cooldowns

use crate::error::SimResult;
use crate::sim::Simulation;
use crate::types::{SimTime, SpellFlags, SpellId, UnitId};
use tracing::trace;

impl Simulation {
    /// Mana cost of the next cast, after modifiers
    pub fn current_cost(&self, spell: SpellId) -> f64 {
        let spell = &self.spells[spell.0];
        (spell.default_cast.cost * spell.cost_multiplier).max(0.0)
    }

    /// Cast time of the next cast, after modifiers
    pub fn effective_cast_time(&self, spell: SpellId) -> SimTime {
        let spell = &self.spells[spell.0];
        spell
            .default_cast
            .cast_time
            .mul_f64(spell.cast_time_multiplier)
            .max_zero()
    }

    /// GCD the next cast will start; zero stays zero, anything else respects the floor
    pub fn effective_gcd(&self, spell: SpellId) -> SimTime {
        let gcd = self.spells[spell.0].default_cast.gcd;
        if gcd <= SimTime::ZERO {
            SimTime::ZERO
        } else {
            gcd.max(self.constants.min_gcd)
        }
    }

    pub fn cooldown_ready(&self, spell: SpellId) -> bool {
        self.spells[spell.0].cd.ready_at <= self.now()
    }

    pub fn cooldown_remaining(&self, spell: SpellId) -> SimTime {
        (self.spells[spell.0].cd.ready_at - self.now()).max_zero()
    }

    /// Make the spell castable again immediately
    pub fn reset_cooldown(&mut self, spell: SpellId) {
        self.spells[spell.0].cd.ready_at = SimTime::ZERO;
    }

    /// Whether `cast` would succeed right now
    pub fn can_cast(&self, spell: SpellId) -> bool {
        let state = &self.spells[spell.0];
        let unit = &self.units[state.unit.0];
        if unit.casting.is_some() {
            return false;
        }
        if state.default_cast.gcd > SimTime::ZERO && unit.gcd_ready_at > self.now() {
            return false;
        }
        if !self.cooldown_ready(spell) {
            return false;
        }
        if self.current_cost(spell) > unit.mana {
            return false;
        }
        match &state.extra_cast_condition {
            Some(condition) => condition(self, spell),
            None => true,
        }
    }

    /// Start casting at `target`. Returns false without side effects if the
    /// spell cannot be cast right now.
    pub fn cast(&mut self, spell: SpellId, target: UnitId) -> SimResult<bool> {
        if !self.can_cast(spell) {
            return Ok(false);
        }
        let now = self.now();
        let cost = self.current_cost(spell);
        let gcd = self.effective_gcd(spell);
        let cast_time = self.effective_cast_time(spell);
        let caster = self.spells[spell.0].unit;
        trace!(
            time = %now,
            spell = %self.spells[spell.0].label,
            %cast_time,
            "cast started"
        );

        self.spend_mana(caster, cost);
        if gcd > SimTime::ZERO {
            self.units[caster.0].gcd_ready_at = now + gcd;
        }

        if cast_time > SimTime::ZERO {
            let handle = self.schedule_at(now + cast_time, move |sim| sim.complete_cast(spell, target))?;
            self.units[caster.0].casting = Some((spell, handle));
        } else {
            self.complete_cast(spell, target)?;
        }
        Ok(true)
    }

    /// Finish a cast: start the cooldown, run the effects, notify observers
    /// and give the agent its next decision point
    fn complete_cast(&mut self, spell: SpellId, target: UnitId) -> SimResult<()> {
        let now = self.now();
        let caster = self.spells[spell.0].unit;
        self.units[caster.0].casting = None;

        let state = &mut self.spells[spell.0];
        state.cd.ready_at = now + state.cd.duration.max_zero();
        if !state.flags.matches(SpellFlags::NO_METRICS) {
            state.metrics.casts += 1;
        }
        let flags = state.flags;
        let apply_effects = state.apply_effects.clone();
        trace!(time = %now, spell = %state.label, "cast complete");

        if let Some(apply_effects) = apply_effects {
            apply_effects(self, spell, target)?;
        }
        if !flags.matches(SpellFlags::NO_ON_CAST_COMPLETE) {
            self.dispatch_cast_complete(caster, spell)?;
        }

        let gcd_ready = self.units[caster.0].gcd_ready_at;
        self.schedule_decision(caster, gcd_ready.max(now))
    }
}
