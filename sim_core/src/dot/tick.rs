//! Dot creation, application and ticking

use super::{Dot, DotConfig};
use crate::aura::AuraConfig;
use crate::error::SimResult;
use crate::sim::{PeriodicOptions, Simulation};
use crate::types::{DotId, SpellId, UnitId};
use tracing::trace;

impl Simulation {
    pub(crate) fn create_dots(&mut self, spell: SpellId, config: DotConfig) -> SimResult<()> {
        let caster = self.spells[spell.0].unit;
        let label = format!("{} ({})", config.label, self.units[caster.0].label());
        if config.is_aoe {
            let dot = self.create_dot(spell, caster, &label, &config)?;
            self.spells[spell.0].aoe_dot = Some(dot);
        } else {
            for target in self.targets().to_vec() {
                let dot = self.create_dot(spell, target, &label, &config)?;
                self.spells[spell.0].dots[target.0] = Some(dot);
            }
        }
        Ok(())
    }

    fn create_dot(&mut self, spell: SpellId, target: UnitId, label: &str, config: &DotConfig) -> SimResult<DotId> {
        let id = DotId(self.dots.len());
        let aura_config = AuraConfig::new(label)
            .with_action_id(self.spells[spell.0].action_id)
            .on_expire(move |sim, _| {
                if let Some(pending) = sim.dots[id.0].tick_action.take() {
                    sim.cancel(pending);
                }
                Ok(())
            });
        let aura = self.register_aura(target, aura_config)?;
        self.dots.push(Dot {
            spell,
            target,
            aura,
            is_aoe: config.is_aoe,
            number_of_ticks: config.number_of_ticks,
            tick_length: config.tick_length,
            ticks_done: 0,
            ticks_total: 0,
            tick_action: None,
            on_tick: config.on_tick.clone(),
        });
        Ok(id)
    }

    /// Apply or roll over a dot
    ///
    /// The tick count is read at application time. Reapplying an active dot
    /// replaces its remaining ticks with a fresh set.
    pub fn apply_dot(&mut self, dot: DotId) -> SimResult<()> {
        if let Some(pending) = self.dots[dot.0].tick_action.take() {
            self.cancel(pending);
        }
        let state = &mut self.dots[dot.0];
        let (ticks, tick_length, aura) = (state.number_of_ticks, state.tick_length, state.aura);
        state.ticks_done = 0;
        state.ticks_total = ticks;

        if ticks <= 0 {
            return self.deactivate_aura(aura);
        }
        self.activate_aura(aura)?;
        trace!(time = %self.now(), aura = %self.auras[aura.0].label(), ticks, "dot applied");

        let options = PeriodicOptions::every(tick_length).with_num_ticks(ticks as u32);
        let handle = self.schedule_periodic(options, move |sim| sim.tick_dot(dot))?;
        self.dots[dot.0].tick_action = Some(handle);
        Ok(())
    }

    fn tick_dot(&mut self, dot: DotId) -> SimResult<()> {
        self.dots[dot.0].ticks_done += 1;
        let on_tick = self.dots[dot.0].on_tick.clone();
        if let Some(on_tick) = on_tick {
            on_tick(self, dot)?;
        }

        let state = &mut self.dots[dot.0];
        if state.ticks_done >= state.ticks_total {
            state.tick_action = None;
            let aura = state.aura;
            self.deactivate_aura(aura)?;
        }
        Ok(())
    }

    /// Remove a dot before its final tick
    pub fn deactivate_dot(&mut self, dot: DotId) -> SimResult<()> {
        let aura = self.dots[dot.0].aura;
        self.deactivate_aura(aura)
    }
}
