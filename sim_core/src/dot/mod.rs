//! DoT (Damage over Time) instances
//!
//! Each dot is a periodic scheduled action bound to an aura. A single-target
//! dot spell gets one instance per target, with the aura on that target; an
//! AoE dot gets one instance whose aura sits on the caster.

mod tick;

use crate::error::SimResult;
use crate::sim::{ActionHandle, Simulation};
use crate::types::{AuraId, DotId, SimTime, SpellId, UnitId};
use std::rc::Rc;

/// Called on every tick of a dot
pub type DotTickCallback = Rc<dyn Fn(&mut Simulation, DotId) -> SimResult<()>>;

/// Dot part of a spell's configuration
#[derive(Clone)]
pub struct DotConfig {
    /// Base aura label; the caster's name is appended
    pub label: String,
    pub number_of_ticks: i32,
    pub tick_length: SimTime,
    pub is_aoe: bool,
    pub on_tick: Option<DotTickCallback>,
}

impl DotConfig {
    pub fn new(label: impl Into<String>, number_of_ticks: i32, tick_length: SimTime) -> Self {
        DotConfig {
            label: label.into(),
            number_of_ticks,
            tick_length,
            is_aoe: false,
            on_tick: None,
        }
    }

    pub fn aoe(mut self) -> Self {
        self.is_aoe = true;
        self
    }

    pub fn on_tick<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, DotId) -> SimResult<()> + 'static,
    {
        self.on_tick = Some(Rc::new(f));
        self
    }
}

/// A dot instance
pub struct Dot {
    pub(crate) spell: SpellId,
    pub(crate) target: UnitId,
    pub(crate) aura: AuraId,
    pub(crate) is_aoe: bool,
    /// Ticks per application, after modifiers
    pub number_of_ticks: i32,
    pub tick_length: SimTime,
    pub(crate) ticks_done: i32,
    pub(crate) ticks_total: i32,
    pub(crate) tick_action: Option<ActionHandle>,
    pub(crate) on_tick: Option<DotTickCallback>,
}

impl Dot {
    pub fn spell(&self) -> SpellId {
        self.spell
    }

    /// Target unit; the caster for an AoE dot
    pub fn target(&self) -> UnitId {
        self.target
    }

    pub fn aura(&self) -> AuraId {
        self.aura
    }

    pub fn is_aoe(&self) -> bool {
        self.is_aoe
    }

    /// Ticks done in the current application
    pub fn ticks_done(&self) -> i32 {
        self.ticks_done
    }

    pub(crate) fn reset_state(&mut self) {
        self.ticks_done = 0;
        self.ticks_total = 0;
        self.tick_action = None;
    }
}

impl Simulation {
    pub fn dot(&self, dot: DotId) -> &Dot {
        &self.dots[dot.0]
    }

    /// Single-target dot of `spell` on `target`
    pub fn spell_dot(&self, spell: SpellId, target: UnitId) -> Option<DotId> {
        self.spells[spell.0].dots.get(target.0).copied().flatten()
    }

    pub fn spell_aoe_dot(&self, spell: SpellId) -> Option<DotId> {
        self.spells[spell.0].aoe_dot
    }

    pub fn dot_is_active(&self, dot: DotId) -> bool {
        self.auras[self.dots[dot.0].aura.0].active
    }

    /// Ticks left in the current application; zero when inactive
    pub fn dot_ticks_remaining(&self, dot: DotId) -> i32 {
        if !self.dot_is_active(dot) {
            return 0;
        }
        let dot = &self.dots[dot.0];
        (dot.ticks_total - dot.ticks_done).max(0)
    }
}
