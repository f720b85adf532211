//! Aura registration, activation, stacking and observer dispatch

use super::{Aura, AuraCallback, AuraConfig};
use crate::error::{SimError, SimResult};
use crate::sim::Simulation;
use crate::spell::SpellResult;
use crate::types::{AuraId, SimTime, SpellId, UnitId, NEVER_EXPIRES};
use std::rc::Rc;
use tracing::debug;

impl Simulation {
    // ===== Registration =====

    /// Register an aura on a unit; labels are unique per unit
    pub fn register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        if self.units[unit.0].aura_labels.contains_key(&config.label) {
            return Err(SimError::DuplicateAura {
                unit: self.units[unit.0].label().to_string(),
                label: config.label,
            });
        }
        if config.duration.is_negative() {
            return Err(SimError::InvalidAura {
                label: config.label,
                reason: format!("negative duration {}", config.duration),
            });
        }

        let id = AuraId(self.auras.len());
        let observers = &mut self.units[unit.0].observers;
        let callbacks = &config.callbacks;
        if callbacks.on_cast_complete.is_some() {
            observers.cast_complete.push(id);
        }
        if callbacks.on_spell_hit_dealt.is_some() {
            observers.spell_hit_dealt.push(id);
        }
        if callbacks.on_periodic_damage_dealt.is_some() {
            observers.periodic_damage_dealt.push(id);
        }
        if callbacks.on_reset.is_some() {
            observers.reset.push(id);
        }

        let unit_state = &mut self.units[unit.0];
        unit_state.aura_labels.insert(config.label.clone(), id);
        unit_state.auras.push(id);
        self.auras.push(Aura::new(unit, config));
        Ok(id)
    }

    /// Return the aura with this label on the unit, registering it if missing
    pub fn get_or_register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        match self.aura_by_label(unit, &config.label) {
            Some(id) => Ok(id),
            None => self.register_aura(unit, config),
        }
    }

    pub fn aura_by_label(&self, unit: UnitId, label: &str) -> Option<AuraId> {
        self.units[unit.0].aura_labels.get(label).copied()
    }

    pub fn aura(&self, aura: AuraId) -> &Aura {
        &self.auras[aura.0]
    }

    pub fn aura_mut(&mut self, aura: AuraId) -> &mut Aura {
        &mut self.auras[aura.0]
    }

    pub fn is_aura_active(&self, aura: AuraId) -> bool {
        self.auras[aura.0].active
    }

    pub fn aura_stacks(&self, aura: AuraId) -> i32 {
        self.auras[aura.0].stacks
    }

    /// Time until the aura expires; zero when inactive
    pub fn aura_remaining_duration(&self, aura: AuraId) -> SimTime {
        let aura = &self.auras[aura.0];
        if !aura.active {
            return SimTime::ZERO;
        }
        if aura.expires_at.is_never() {
            return NEVER_EXPIRES;
        }
        (aura.expires_at - self.now()).max_zero()
    }

    /// Change the duration used by future activations and refreshes
    pub fn set_aura_duration(&mut self, aura: AuraId, duration: SimTime) -> SimResult<()> {
        if duration.is_negative() {
            return Err(SimError::InvalidAura {
                label: self.auras[aura.0].label.clone(),
                reason: format!("negative duration {}", duration),
            });
        }
        self.auras[aura.0].duration = duration;
        Ok(())
    }

    /// Never expire, and activate at the start of every iteration
    pub fn make_permanent(&mut self, aura: AuraId) {
        let state = &mut self.auras[aura.0];
        state.duration = NEVER_EXPIRES;
        if state.active {
            state.expires_at = NEVER_EXPIRES;
            if let Some(pending) = state.expiration.take() {
                self.scheduler.cancel(pending);
            }
        }
        let state = &mut self.auras[aura.0];
        let previous = state.callbacks.on_reset.take();
        if previous.is_none() {
            self.units[state.unit.0].observers.reset.push(aura);
        }
        let on_reset: AuraCallback = Rc::new(move |sim: &mut Simulation, id: AuraId| {
            if let Some(previous) = &previous {
                previous(sim, id)?;
            }
            sim.activate_aura(id)
        });
        self.auras[aura.0].callbacks.on_reset = Some(on_reset);
    }

    // ===== Lifecycle =====

    /// Activate with one stack. No-op if already active.
    pub fn activate_aura(&mut self, aura: AuraId) -> SimResult<()> {
        if self.auras[aura.0].active {
            return Ok(());
        }
        self.activate_with_stacks(aura, 1)
    }

    fn activate_with_stacks(&mut self, aura: AuraId, stacks: i32) -> SimResult<()> {
        self.ensure_initialized(aura)?;
        let now = self.now();
        let state = &mut self.auras[aura.0];
        state.active = true;
        state.stacks = stacks;
        state.start_time = now;
        let duration = state.duration;
        debug!(time = %now, aura = %state.label, "aura gained");

        if duration.is_never() {
            self.auras[aura.0].expires_at = NEVER_EXPIRES;
        } else {
            self.schedule_expiration(aura, now + duration)?;
        }

        let on_gain = self.auras[aura.0].callbacks.on_gain.clone();
        if let Some(on_gain) = on_gain {
            on_gain(self, aura)?;
        }
        Ok(())
    }

    /// Deactivate and clear stacks. No-op if inactive.
    pub fn deactivate_aura(&mut self, aura: AuraId) -> SimResult<()> {
        let state = &mut self.auras[aura.0];
        if !state.active {
            return Ok(());
        }
        state.active = false;
        state.stacks = 0;
        let pending = state.expiration.take();
        debug!(time = %self.scheduler.now(), aura = %state.label, "aura expired");
        if let Some(pending) = pending {
            self.scheduler.cancel(pending);
        }

        let on_expire = self.auras[aura.0].callbacks.on_expire.clone();
        if let Some(on_expire) = on_expire {
            on_expire(self, aura)?;
        }
        Ok(())
    }

    /// Restart the full duration of an active aura without firing on-gain
    pub fn refresh_aura(&mut self, aura: AuraId) -> SimResult<()> {
        let state = &self.auras[aura.0];
        if !state.active || state.duration.is_never() {
            return Ok(());
        }
        let expires_at = self.now() + state.duration;
        self.schedule_expiration(aura, expires_at)
    }

    pub fn activate_or_refresh_aura(&mut self, aura: AuraId) -> SimResult<()> {
        if self.auras[aura.0].active {
            self.refresh_aura(aura)
        } else {
            self.activate_aura(aura)
        }
    }

    fn schedule_expiration(&mut self, aura: AuraId, at: SimTime) -> SimResult<()> {
        if let Some(pending) = self.auras[aura.0].expiration.take() {
            self.scheduler.cancel(pending);
        }
        let handle = self.schedule_at(at, move |sim| sim.expire_aura(aura))?;
        let state = &mut self.auras[aura.0];
        state.expires_at = at;
        state.expiration = Some(handle);
        Ok(())
    }

    fn expire_aura(&mut self, aura: AuraId) -> SimResult<()> {
        // The firing action is no longer pending
        self.auras[aura.0].expiration = None;
        self.deactivate_aura(aura)
    }

    // ===== Stacks =====

    pub fn add_stack(&mut self, aura: AuraId) -> SimResult<()> {
        let stacks = self.auras[aura.0].stacks;
        self.set_stacks(aura, stacks + 1)
    }

    pub fn remove_stack(&mut self, aura: AuraId) -> SimResult<()> {
        let stacks = self.auras[aura.0].stacks;
        self.set_stacks(aura, stacks - 1)
    }

    /// Set the stack count, clamped to `[0, max_stacks]`
    ///
    /// Going from zero activates the aura and going to zero deactivates it,
    /// so the stack count and the active flag never disagree.
    pub fn set_stacks(&mut self, aura: AuraId, stacks: i32) -> SimResult<()> {
        let state = &self.auras[aura.0];
        let new = stacks.clamp(0, state.max_stacks);
        let old = state.stacks;
        if new == old {
            return Ok(());
        }

        if old == 0 {
            self.activate_with_stacks(aura, new)?;
        } else if new == 0 {
            self.deactivate_aura(aura)?;
        } else {
            self.auras[aura.0].stacks = new;
        }

        let on_stacks_change = self.auras[aura.0].callbacks.on_stacks_change.clone();
        if let Some(on_stacks_change) = on_stacks_change {
            on_stacks_change(self, aura, old, new)?;
        }
        Ok(())
    }

    // ===== Iteration boundaries =====

    /// Deactivate every active aura in registration order
    pub fn expire_all_auras(&mut self) -> SimResult<()> {
        for index in 0..self.auras.len() {
            self.deactivate_aura(AuraId(index))?;
        }
        Ok(())
    }

    pub(crate) fn init_auras(&mut self) -> SimResult<()> {
        for index in 0..self.auras.len() {
            self.ensure_initialized(AuraId(index))?;
        }
        Ok(())
    }

    fn ensure_initialized(&mut self, aura: AuraId) -> SimResult<()> {
        let state = &mut self.auras[aura.0];
        if state.initialized {
            return Ok(());
        }
        state.initialized = true;
        let on_init = state.callbacks.on_init.clone();
        if let Some(on_init) = on_init {
            on_init(self, aura)?;
        }
        Ok(())
    }

    // ===== Observer dispatch =====

    pub(crate) fn dispatch_reset(&mut self) -> SimResult<()> {
        for index in 0..self.units.len() {
            let observers = self.units[index].observers.reset.clone();
            for aura in observers {
                let on_reset = self.auras[aura.0].callbacks.on_reset.clone();
                if let Some(on_reset) = on_reset {
                    on_reset(self, aura)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn dispatch_cast_complete(&mut self, unit: UnitId, spell: SpellId) -> SimResult<()> {
        let observers = self.units[unit.0].observers.cast_complete.clone();
        for aura in observers {
            if !self.auras[aura.0].active {
                continue;
            }
            let callback = self.auras[aura.0].callbacks.on_cast_complete.clone();
            if let Some(callback) = callback {
                callback(self, aura, spell)?;
            }
        }
        Ok(())
    }

    pub(crate) fn dispatch_spell_hit(&mut self, unit: UnitId, result: &SpellResult) -> SimResult<()> {
        let observers = self.units[unit.0].observers.spell_hit_dealt.clone();
        for aura in observers {
            if !self.auras[aura.0].active {
                continue;
            }
            let callback = self.auras[aura.0].callbacks.on_spell_hit_dealt.clone();
            if let Some(callback) = callback {
                callback(self, aura, result.spell, result)?;
            }
        }
        Ok(())
    }

    pub(crate) fn dispatch_periodic_damage(&mut self, unit: UnitId, result: &SpellResult) -> SimResult<()> {
        let observers = self.units[unit.0].observers.periodic_damage_dealt.clone();
        for aura in observers {
            if !self.auras[aura.0].active {
                continue;
            }
            let callback = self.auras[aura.0].callbacks.on_periodic_damage_dealt.clone();
            if let Some(callback) = callback {
                callback(self, aura, result.spell, result)?;
            }
        }
        Ok(())
    }
}
