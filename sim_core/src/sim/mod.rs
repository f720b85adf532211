//! The simulation: clock, scheduler, RNG and every registered entity

pub mod runner;
mod scheduler;

pub use runner::{run_batch, seed_for_iteration};
pub use scheduler::{ActionHandle, OnceAction, PeriodicAction, PeriodicOptions, Scheduler};

use crate::aura::Aura;
use crate::config::{CombatConstants, EncounterConfig};
use crate::dot::Dot;
use crate::error::SimResult;
use crate::metrics::IterationResult;
use crate::spell::{Spell, SpellSnapshot};
use crate::spell_mod::{SpellMod, SpellModValue};
use crate::types::{SimTime, UnitId};
use crate::unit::{Unit, UnitKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use scheduler::Fired;
use std::rc::Rc;
use tracing::{debug, trace};

/// Numeric state captured once after setup and restored before every iteration
///
/// Restoring exact values keeps repeated apply/remove of multiplicative
/// modifiers from accumulating float error across iterations.
struct AttributeSnapshot {
    spells: Vec<SpellSnapshot>,
    dot_ticks: Vec<i32>,
    mods_active: Vec<bool>,
    mod_values: Vec<SpellModValue>,
}

/// One encounter replayed iteration by iteration
///
/// Owns the clock, the pending action queue, the seeded random source and the
/// arenas of units, spells, auras, modifiers and dots. Never shared between
/// threads: the parallel runner builds one per worker.
pub struct Simulation {
    pub(crate) scheduler: Scheduler,
    rng: ChaCha8Rng,
    pub(crate) constants: CombatConstants,
    pub(crate) units: Vec<Unit>,
    pub(crate) spells: Vec<Spell>,
    pub(crate) auras: Vec<Aura>,
    pub(crate) mods: Vec<SpellMod>,
    pub(crate) dots: Vec<Dot>,
    player: UnitId,
    targets: Vec<UnitId>,
    base_duration: SimTime,
    duration_variation: SimTime,
    duration: SimTime,
    base_seed: u64,
    iteration: u32,
    snapshot: Option<AttributeSnapshot>,
}

impl Simulation {
    /// Create a simulation with one player unit and `target_count` targets
    pub fn new(config: &EncounterConfig) -> Self {
        let mut sim = Simulation {
            scheduler: Scheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed_for_iteration(config.seed, 0)),
            constants: config.constants.clone(),
            units: Vec::new(),
            spells: Vec::new(),
            auras: Vec::new(),
            mods: Vec::new(),
            dots: Vec::new(),
            player: UnitId(0),
            targets: Vec::new(),
            base_duration: config.duration,
            duration_variation: config.duration_variation,
            duration: config.duration,
            base_seed: config.seed,
            iteration: 0,
            snapshot: None,
        };
        sim.player = sim.add_unit("Player", UnitKind::Player);
        for i in 0..config.target_count {
            let target = sim.add_unit(&format!("Target {}", i + 1), UnitKind::Target);
            sim.targets.push(target);
        }
        sim
    }

    fn add_unit(&mut self, label: &str, kind: UnitKind) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(Unit::new(label, kind));
        id
    }

    // ===== Clock and scheduling =====

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Length of the current iteration
    pub fn duration(&self) -> SimTime {
        self.duration
    }

    /// Time left until the current iteration ends
    pub fn remaining_duration(&self) -> SimTime {
        (self.duration - self.now()).max_zero()
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn constants(&self) -> &CombatConstants {
        &self.constants
    }

    /// Schedule a one-shot action at an absolute time; earlier than now is an error
    pub fn schedule_at<F>(&mut self, at: SimTime, action: F) -> SimResult<ActionHandle>
    where
        F: FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    {
        self.scheduler.schedule_once(at, Box::new(action))
    }

    /// Schedule a one-shot action `delay` from now
    pub fn schedule_after<F>(&mut self, delay: SimTime, action: F) -> SimResult<ActionHandle>
    where
        F: FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    {
        let at = self.now() + delay;
        self.schedule_at(at, action)
    }

    /// Schedule a repeating action starting now
    pub fn schedule_periodic<F>(&mut self, options: PeriodicOptions, action: F) -> SimResult<ActionHandle>
    where
        F: Fn(&mut Simulation) -> SimResult<()> + 'static,
    {
        self.scheduler.schedule_periodic(options, Rc::new(action))
    }

    /// Cancel a pending action. No-op for handles that already fired or were cancelled.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    pub fn is_pending(&self, handle: ActionHandle) -> bool {
        self.scheduler.is_pending(handle)
    }

    /// Fire every action due at or before `time`, then move the clock to `time`
    pub fn run_until(&mut self, time: SimTime) -> SimResult<()> {
        while self.fire_next(time, true)? {}
        self.scheduler.advance_to(time);
        Ok(())
    }

    fn fire_next(&mut self, limit: SimTime, inclusive: bool) -> SimResult<bool> {
        let Some((handle, fired)) = self.scheduler.pop_due(limit, inclusive) else {
            return Ok(false);
        };
        trace!(time = %self.now(), ?handle, "firing action");
        match fired {
            Fired::Once(action) => action(self)?,
            Fired::Periodic { action, is_final } => {
                action(self)?;
                if !is_final {
                    self.scheduler.requeue_periodic(handle);
                }
            }
        }
        Ok(true)
    }

    // ===== Randomness =====

    /// Roll a proc with the given chance (0.0 to 1.0)
    pub fn proc(&mut self, chance: f64) -> bool {
        if chance >= 1.0 {
            return true;
        }
        if chance <= 0.0 {
            return false;
        }
        self.rng.gen::<f64>() < chance
    }

    /// Uniform draw in `[0, 1)`
    pub fn random_float(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    // ===== Units =====

    pub fn player(&self) -> UnitId {
        self.player
    }

    pub fn targets(&self) -> &[UnitId] {
        &self.targets
    }

    /// First target, the default recipient of single-target spells
    pub fn primary_target(&self) -> UnitId {
        self.targets.first().copied().unwrap_or(self.player)
    }

    pub fn unit(&self, unit: UnitId) -> &Unit {
        &self.units[unit.0]
    }

    pub fn unit_mut(&mut self, unit: UnitId) -> &mut Unit {
        &mut self.units[unit.0]
    }

    // ===== Iteration lifecycle =====

    /// Reset every piece of per-iteration state and schedule the first decision
    pub fn begin_iteration(&mut self, iteration: u32) -> SimResult<()> {
        self.expire_all_auras()?;
        self.restore_attributes();

        self.scheduler.reset();
        self.iteration = iteration;
        self.rng = ChaCha8Rng::seed_from_u64(seed_for_iteration(self.base_seed, iteration));

        for unit in &mut self.units {
            unit.reset_state();
        }
        for spell in &mut self.spells {
            spell.reset_state();
        }
        for dot in &mut self.dots {
            dot.reset_state();
        }

        self.duration = self.base_duration;
        if self.duration_variation > SimTime::ZERO {
            let variation = self.duration_variation.as_nanos();
            let offset = self.rng.gen_range(-variation..=variation);
            self.duration = self.base_duration + SimTime::from_nanos(offset);
        }
        debug!(iteration, duration = %self.duration, "starting iteration");

        self.init_auras()?;
        for index in 0..self.units.len() {
            self.reset_agent(UnitId(index))?;
        }
        self.dispatch_reset()?;

        for index in 0..self.units.len() {
            self.schedule_decision(UnitId(index), SimTime::ZERO)?;
        }
        Ok(())
    }

    /// Fire everything due strictly before the end of the encounter
    pub fn run_to_end(&mut self) -> SimResult<()> {
        let end = self.duration;
        while self.fire_next(end, false)? {}
        self.scheduler.advance_to(end);
        Ok(())
    }

    /// Collect the iteration's results, then expire whatever is still active
    pub fn finish_iteration(&mut self) -> SimResult<IterationResult> {
        let result = IterationResult::collect(self);
        self.expire_all_auras()?;
        debug!(
            iteration = self.iteration,
            damage = result.damage,
            dps = result.dps,
            actions = self.scheduler.fired_count(),
            "finished iteration"
        );
        Ok(result)
    }

    /// Run one complete iteration
    pub fn run_iteration(&mut self, iteration: u32) -> SimResult<IterationResult> {
        self.begin_iteration(iteration)?;
        self.run_to_end()?;
        self.finish_iteration()
    }

    /// Take the post-setup snapshot on first use, restore it on every later one
    fn restore_attributes(&mut self) {
        let stale = match &self.snapshot {
            Some(snapshot) => {
                snapshot.spells.len() != self.spells.len()
                    || snapshot.dot_ticks.len() != self.dots.len()
                    || snapshot.mods_active.len() != self.mods.len()
            }
            None => true,
        };
        if stale {
            self.snapshot = Some(AttributeSnapshot {
                spells: self.spells.iter().map(Spell::snapshot).collect(),
                dot_ticks: self.dots.iter().map(|d| d.number_of_ticks).collect(),
                mods_active: self.mods.iter().map(|m| m.active).collect(),
                mod_values: self.mods.iter().map(|m| m.value).collect(),
            });
            return;
        }
        if let Some(snapshot) = &self.snapshot {
            for (spell, saved) in self.spells.iter_mut().zip(&snapshot.spells) {
                spell.restore(saved);
            }
            for (dot, &ticks) in self.dots.iter_mut().zip(&snapshot.dot_ticks) {
                dot.number_of_ticks = ticks;
            }
            let saved = snapshot.mods_active.iter().zip(&snapshot.mod_values);
            for (spell_mod, (&active, &value)) in self.mods.iter_mut().zip(saved) {
                spell_mod.active = active;
                spell_mod.value = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use std::cell::RefCell;

    fn sim() -> Simulation {
        Simulation::new(&EncounterConfig::default())
    }

    #[test]
    fn test_new_creates_player_and_targets() {
        let config = EncounterConfig {
            target_count: 3,
            ..EncounterConfig::default()
        };
        let sim = Simulation::new(&config);
        assert_eq!(sim.targets().len(), 3);
        assert_eq!(sim.unit(sim.player()).label(), "Player");
        assert_eq!(sim.unit(sim.primary_target()).label(), "Target 1");
    }

    #[test]
    fn test_run_until_fires_due_actions_in_order() {
        let mut sim = sim();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (at, name) in [(3, "c"), (1, "a"), (2, "b"), (9, "late")] {
            let log = Rc::clone(&log);
            sim.schedule_at(SimTime::from_secs(at), move |sim| {
                log.borrow_mut().push((name, sim.now()));
                Ok(())
            })
            .unwrap();
        }

        sim.run_until(SimTime::from_secs(5)).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                ("a", SimTime::from_secs(1)),
                ("b", SimTime::from_secs(2)),
                ("c", SimTime::from_secs(3)),
            ]
        );
        assert_eq!(sim.now(), SimTime::from_secs(5));
    }

    #[test]
    fn test_action_can_schedule_at_current_time() {
        let mut sim = sim();
        let fired = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&fired);
        sim.schedule_at(SimTime::from_secs(1), move |sim| {
            sim.schedule_at(sim.now(), move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        sim.run_until(SimTime::from_secs(1)).unwrap();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_schedule_in_past_fails() {
        let mut sim = sim();
        sim.run_until(SimTime::from_secs(10)).unwrap();
        let result = sim.schedule_at(SimTime::from_secs(4), |_| Ok(()));
        assert!(matches!(result, Err(SimError::ScheduledInPast { .. })));
    }

    #[test]
    fn test_periodic_cancels_itself() {
        let mut sim = sim();
        let ticks = Rc::new(RefCell::new(0));
        let handle = Rc::new(RefCell::new(None));

        let (t, h) = (Rc::clone(&ticks), Rc::clone(&handle));
        let periodic = sim
            .schedule_periodic(PeriodicOptions::every(SimTime::from_secs(1)), move |sim| {
                *t.borrow_mut() += 1;
                if *t.borrow() == 3 {
                    if let Some(own) = *h.borrow() {
                        sim.cancel(own);
                    }
                }
                Ok(())
            })
            .unwrap();
        *handle.borrow_mut() = Some(periodic);

        sim.run_until(SimTime::from_secs(10)).unwrap();
        assert_eq!(*ticks.borrow(), 3);
        assert!(!sim.is_pending(periodic));
    }

    #[test]
    fn test_periodic_tick_immediately_with_limit() {
        let mut sim = sim();
        let times = Rc::new(RefCell::new(Vec::new()));
        let t = Rc::clone(&times);
        let options = PeriodicOptions::every(SimTime::from_secs(2))
            .with_num_ticks(3)
            .immediately();
        sim.schedule_periodic(options, move |sim| {
            t.borrow_mut().push(sim.now());
            Ok(())
        })
        .unwrap();

        sim.run_until(SimTime::from_secs(20)).unwrap();
        assert_eq!(
            *times.borrow(),
            vec![SimTime::ZERO, SimTime::from_secs(2), SimTime::from_secs(4)]
        );
    }

    #[test]
    fn test_action_error_aborts_run() {
        let mut sim = sim();
        sim.schedule_at(SimTime::from_secs(1), |sim| {
            sim.schedule_at(SimTime::ZERO, |_| Ok(()))?;
            Ok(())
        })
        .unwrap();
        assert!(sim.run_until(SimTime::from_secs(2)).is_err());
    }

    #[test]
    fn test_run_to_end_stops_before_duration() {
        let config = EncounterConfig {
            duration: SimTime::from_secs(10),
            ..EncounterConfig::default()
        };
        let mut sim = Simulation::new(&config);
        sim.begin_iteration(0).unwrap();
        let fired = Rc::new(RefCell::new(Vec::new()));
        for at in [5, 10] {
            let f = Rc::clone(&fired);
            sim.schedule_at(SimTime::from_secs(at), move |_| {
                f.borrow_mut().push(at);
                Ok(())
            })
            .unwrap();
        }

        sim.run_to_end().unwrap();
        assert_eq!(*fired.borrow(), vec![5]);
        assert_eq!(sim.now(), SimTime::from_secs(10));
    }

    #[test]
    fn test_begin_iteration_is_reproducible() {
        let config = EncounterConfig {
            duration_variation: SimTime::from_secs(20),
            seed: 99,
            ..EncounterConfig::default()
        };
        let mut sim = Simulation::new(&config);

        sim.begin_iteration(4).unwrap();
        let duration = sim.duration();
        let roll = sim.random_float();

        sim.begin_iteration(1).unwrap();
        sim.begin_iteration(4).unwrap();
        assert_eq!(sim.duration(), duration);
        assert!((sim.random_float() - roll).abs() < f64::EPSILON);
        assert!(duration >= SimTime::from_secs(160) && duration <= SimTime::from_secs(200));
    }

    #[test]
    fn test_mod_value_restored_between_iterations() {
        use crate::spell::SpellConfig;
        use crate::spell_mod::{SpellModConfig, SpellModKind};

        let mut sim = sim();
        let player = sim.player();
        let spell = sim
            .register_spell(player, SpellConfig {
                label: "Fireball".to_string(),
                ..SpellConfig::default()
            })
            .unwrap();
        let id = sim
            .add_static_mod(player, SpellModConfig::new(SpellModKind::DamageDonePct).with_float_value(0.1))
            .unwrap();

        sim.begin_iteration(0).unwrap();
        sim.update_float_value(id, 0.3).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.3).abs() < 1e-12);

        sim.begin_iteration(1).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.1).abs() < 1e-12);
        assert!((sim.spell_mod(id).value().float_value - 0.1).abs() < f64::EPSILON);
        sim.update_float_value(id, 0.5).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_proc_extremes() {
        let mut sim = sim();
        assert!(sim.proc(1.0));
        assert!(!sim.proc(0.0));
        let hits = (0..10_000).filter(|_| sim.proc(0.25)).count();
        assert!((hits as f64 / 10_000.0 - 0.25).abs() < 0.03);
    }
}
