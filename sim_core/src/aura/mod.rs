//! Auras: named, timed, stackable effects attached to a unit

mod lifecycle;

use crate::error::SimResult;
use crate::sim::{ActionHandle, Simulation};
use crate::spell::SpellResult;
use crate::types::{ActionId, AuraId, SimTime, SpellId, UnitId, NEVER_EXPIRES};
use std::rc::Rc;

/// Callback taking only the aura (init, gain, expire, reset)
pub type AuraCallback = Rc<dyn Fn(&mut Simulation, AuraId) -> SimResult<()>>;
/// Called with the old and new stack count
pub type StacksCallback = Rc<dyn Fn(&mut Simulation, AuraId, i32, i32) -> SimResult<()>>;
/// Called when a spell of the aura's unit finishes casting
pub type CastCompleteCallback = Rc<dyn Fn(&mut Simulation, AuraId, SpellId) -> SimResult<()>>;
/// Called with the result of a direct hit or a periodic tick
pub type HitCallback = Rc<dyn Fn(&mut Simulation, AuraId, SpellId, &SpellResult) -> SimResult<()>>;

#[derive(Clone, Default)]
pub(crate) struct AuraCallbacks {
    pub on_init: Option<AuraCallback>,
    pub on_gain: Option<AuraCallback>,
    pub on_expire: Option<AuraCallback>,
    pub on_stacks_change: Option<StacksCallback>,
    pub on_cast_complete: Option<CastCompleteCallback>,
    pub on_spell_hit_dealt: Option<HitCallback>,
    pub on_periodic_damage_dealt: Option<HitCallback>,
    pub on_reset: Option<AuraCallback>,
}

/// Registration-time description of an aura
///
/// ```ignore
/// let config = AuraConfig::new("Berserk")
///     .with_action_id(ActionId::spell(50334))
///     .with_duration(SimTime::from_secs(15))
///     .on_gain(|sim, _| sim.activate_mod(cost_mod))
///     .on_expire(|sim, _| sim.deactivate_mod(cost_mod));
/// ```
#[derive(Clone)]
pub struct AuraConfig {
    pub label: String,
    pub action_id: ActionId,
    pub duration: SimTime,
    pub max_stacks: i32,
    pub(crate) callbacks: AuraCallbacks,
}

impl AuraConfig {
    pub fn new(label: impl Into<String>) -> Self {
        AuraConfig {
            label: label.into(),
            action_id: ActionId::default(),
            duration: NEVER_EXPIRES,
            max_stacks: 1,
            callbacks: AuraCallbacks::default(),
        }
    }

    pub fn with_action_id(mut self, action_id: ActionId) -> Self {
        self.action_id = action_id;
        self
    }

    pub fn with_duration(mut self, duration: SimTime) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: i32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    /// Runs once before the aura is first used
    pub fn on_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    {
        self.callbacks.on_init = Some(Rc::new(f));
        self
    }

    pub fn on_gain<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    {
        self.callbacks.on_gain = Some(Rc::new(f));
        self
    }

    pub fn on_expire<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    {
        self.callbacks.on_expire = Some(Rc::new(f));
        self
    }

    pub fn on_stacks_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, i32, i32) -> SimResult<()> + 'static,
    {
        self.callbacks.on_stacks_change = Some(Rc::new(f));
        self
    }

    pub fn on_cast_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, SpellId) -> SimResult<()> + 'static,
    {
        self.callbacks.on_cast_complete = Some(Rc::new(f));
        self
    }

    pub fn on_spell_hit_dealt<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, SpellId, &SpellResult) -> SimResult<()> + 'static,
    {
        self.callbacks.on_spell_hit_dealt = Some(Rc::new(f));
        self
    }

    pub fn on_periodic_damage_dealt<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, SpellId, &SpellResult) -> SimResult<()> + 'static,
    {
        self.callbacks.on_periodic_damage_dealt = Some(Rc::new(f));
        self
    }

    /// Runs at the start of every iteration, whether or not the aura is active
    pub fn on_reset<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    {
        self.callbacks.on_reset = Some(Rc::new(f));
        self
    }
}

/// A registered aura
///
/// Invariant: `active` exactly when `stacks >= 1`.
pub struct Aura {
    pub(crate) unit: UnitId,
    pub(crate) label: String,
    pub(crate) action_id: ActionId,
    pub(crate) duration: SimTime,
    pub(crate) max_stacks: i32,
    pub(crate) stacks: i32,
    pub(crate) active: bool,
    pub(crate) start_time: SimTime,
    pub(crate) expires_at: SimTime,
    pub(crate) expiration: Option<ActionHandle>,
    pub(crate) initialized: bool,
    /// Spells this aura acts on, usually collected in `on_init`
    pub tracked_spells: Vec<SpellId>,
    pub(crate) callbacks: AuraCallbacks,
}

impl Aura {
    pub(crate) fn new(unit: UnitId, config: AuraConfig) -> Self {
        Aura {
            unit,
            label: config.label,
            action_id: config.action_id,
            duration: config.duration,
            max_stacks: config.max_stacks.max(1),
            stacks: 0,
            active: false,
            start_time: SimTime::ZERO,
            expires_at: SimTime::ZERO,
            expiration: None,
            initialized: false,
            tracked_spells: Vec::new(),
            callbacks: config.callbacks,
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn action_id(&self) -> ActionId {
        self.action_id
    }

    pub fn duration(&self) -> SimTime {
        self.duration
    }

    pub fn max_stacks(&self) -> i32 {
        self.max_stacks
    }

    pub fn stacks(&self) -> i32 {
        self.stacks
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Time of the most recent activation
    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    /// Absolute expiration time; `NEVER_EXPIRES` for permanent auras
    pub fn expires_at(&self) -> SimTime {
        self.expires_at
    }
}
