//! Units: the player character and the encounter's targets

use crate::error::SimResult;
use crate::sim::{ActionHandle, Simulation};
use crate::types::{AuraId, ModId, SpellId, SimTime, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// Callback run for every spell registered on a unit
pub type SpellRegisteredHook = Rc<dyn Fn(&mut Simulation, SpellId) -> SimResult<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Player,
    Target,
}

/// Rotation logic for a unit
///
/// The simulation calls `on_gcd_ready` whenever the unit is free to act. An
/// agent that casts nothing should either `wait_until` a later time or leave
/// the unit idle until something calls `wake_unit`.
pub trait Agent {
    /// Register spells, auras and modifiers. Called once from `set_agent`.
    fn initialize(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()>;

    /// Clear per-iteration agent state
    fn reset(&mut self, _sim: &mut Simulation, _unit: UnitId) -> SimResult<()> {
        Ok(())
    }

    /// Choose the next action
    fn on_gcd_ready(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()>;
}

/// Per-category observer lists, filled in aura registration order
#[derive(Default)]
pub(crate) struct Observers {
    pub cast_complete: Vec<AuraId>,
    pub spell_hit_dealt: Vec<AuraId>,
    pub periodic_damage_dealt: Vec<AuraId>,
    pub reset: Vec<AuraId>,
}

pub struct Unit {
    label: String,
    kind: UnitKind,
    pub max_mana: f64,
    pub(crate) mana: f64,
    /// Base spell crit chance in percent
    pub spell_crit_percent: f64,
    /// Base spell hit bonus in percent
    pub spell_hit_percent: f64,
    pub(crate) gcd_ready_at: SimTime,
    pub(crate) casting: Option<(SpellId, ActionHandle)>,
    pub(crate) spells: Vec<SpellId>,
    pub(crate) auras: Vec<AuraId>,
    pub(crate) aura_labels: HashMap<String, AuraId>,
    pub(crate) mods: Vec<ModId>,
    pub(crate) observers: Observers,
    pub(crate) spell_registered_hooks: Vec<SpellRegisteredHook>,
    agent: Option<Box<dyn Agent>>,
    has_agent: bool,
    next_decision: Option<ActionHandle>,
    pub(crate) damage_taken: f64,
}

impl Unit {
    pub(crate) fn new(label: &str, kind: UnitKind) -> Self {
        Unit {
            label: label.to_string(),
            kind,
            max_mana: 0.0,
            mana: 0.0,
            spell_crit_percent: 0.0,
            spell_hit_percent: 0.0,
            gcd_ready_at: SimTime::ZERO,
            casting: None,
            spells: Vec::new(),
            auras: Vec::new(),
            aura_labels: HashMap::new(),
            mods: Vec::new(),
            observers: Observers::default(),
            spell_registered_hooks: Vec::new(),
            agent: None,
            has_agent: false,
            next_decision: None,
            damage_taken: 0.0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn mana(&self) -> f64 {
        self.mana
    }

    pub fn gcd_ready_at(&self) -> SimTime {
        self.gcd_ready_at
    }

    /// Spell currently being cast, if any
    pub fn casting(&self) -> Option<SpellId> {
        self.casting.map(|(spell, _)| spell)
    }

    pub fn spells(&self) -> &[SpellId] {
        &self.spells
    }

    pub fn auras(&self) -> &[AuraId] {
        &self.auras
    }

    pub fn damage_taken(&self) -> f64 {
        self.damage_taken
    }

    pub fn has_agent(&self) -> bool {
        self.has_agent
    }

    pub(crate) fn reset_state(&mut self) {
        self.mana = self.max_mana;
        self.gcd_ready_at = SimTime::ZERO;
        self.casting = None;
        self.next_decision = None;
        self.damage_taken = 0.0;
    }
}

impl Simulation {
    /// Attach rotation logic to a unit and let it register its content
    pub fn set_agent(&mut self, unit: UnitId, mut agent: Box<dyn Agent>) -> SimResult<()> {
        self.units[unit.0].has_agent = true;
        let result = agent.initialize(self, unit);
        self.units[unit.0].agent = Some(agent);
        result
    }

    /// Register a callback for every spell later registered on `unit`
    pub fn on_spell_registered<F>(&mut self, unit: UnitId, hook: F)
    where
        F: Fn(&mut Simulation, SpellId) -> SimResult<()> + 'static,
    {
        self.units[unit.0].spell_registered_hooks.push(Rc::new(hook));
    }

    pub fn is_gcd_ready(&self, unit: UnitId) -> bool {
        self.units[unit.0].gcd_ready_at <= self.now()
    }

    pub fn add_mana(&mut self, unit: UnitId, amount: f64) {
        let unit = &mut self.units[unit.0];
        unit.mana = (unit.mana + amount).min(unit.max_mana);
    }

    pub fn spend_mana(&mut self, unit: UnitId, amount: f64) {
        let unit = &mut self.units[unit.0];
        unit.mana = (unit.mana - amount).max(0.0);
    }

    /// Have the agent decide again at `time` (or now, if that is earlier)
    pub fn wait_until(&mut self, unit: UnitId, time: SimTime) -> SimResult<()> {
        self.schedule_decision(unit, time)
    }

    /// Give an idle unit's agent a decision point now
    pub fn wake_unit(&mut self, unit: UnitId) -> SimResult<()> {
        if self.units[unit.0].casting.is_some() {
            return Ok(());
        }
        let ready = self.units[unit.0].gcd_ready_at;
        self.schedule_decision(unit, ready)
    }

    /// Replace the unit's pending decision with one at `max(time, now)`
    pub(crate) fn schedule_decision(&mut self, unit: UnitId, time: SimTime) -> SimResult<()> {
        if !self.units[unit.0].has_agent {
            return Ok(());
        }
        if let Some(pending) = self.units[unit.0].next_decision.take() {
            self.scheduler.cancel(pending);
        }
        let at = time.max(self.now());
        let handle = self.schedule_at(at, move |sim| sim.run_decision(unit))?;
        self.units[unit.0].next_decision = Some(handle);
        Ok(())
    }

    fn run_decision(&mut self, unit: UnitId) -> SimResult<()> {
        self.units[unit.0].next_decision = None;
        let Some(mut agent) = self.units[unit.0].agent.take() else {
            return Ok(());
        };
        trace!(time = %self.now(), unit = %self.units[unit.0].label, "decision point");
        let result = agent.on_gcd_ready(self, unit);
        self.units[unit.0].agent = Some(agent);
        result
    }

    pub(crate) fn reset_agent(&mut self, unit: UnitId) -> SimResult<()> {
        let Some(mut agent) = self.units[unit.0].agent.take() else {
            return Ok(());
        };
        let result = agent.reset(self, unit);
        self.units[unit.0].agent = Some(agent);
        result
    }
}
