//! Spells - registration and the attributes modifiers act on

mod cast;
mod outcome;

pub use outcome::{HitOutcome, Outcome, SpellResult};

use crate::dot::DotConfig;
use crate::error::{SimError, SimResult};
use crate::metrics::SpellMetrics;
use crate::sim::Simulation;
use crate::types::{ActionId, DotId, ProcMask, SimTime, SpellFlags, SpellId, SpellSchool, UnitId};
use std::rc::Rc;

/// Spell effect run when a cast completes
pub type ApplyEffects = Rc<dyn Fn(&mut Simulation, SpellId, UnitId) -> SimResult<()>>;
/// Extra requirement checked by `can_cast`
pub type CastCondition = Rc<dyn Fn(&Simulation, SpellId) -> bool>;

/// Timing of a cast as configured
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CastConfig {
    /// Global cooldown started by the cast; zero for off-GCD spells
    pub gcd: SimTime,
    pub cast_time: SimTime,
    pub cooldown: SimTime,
}

/// Registration-time description of a spell
#[derive(Clone)]
pub struct SpellConfig {
    pub action_id: ActionId,
    pub label: String,
    pub school: SpellSchool,
    pub proc_mask: ProcMask,
    pub flags: SpellFlags,
    /// Class-specific bits modifiers match against
    pub class_spell_mask: u64,
    /// Mana cost
    pub cost: f64,
    pub cast: CastConfig,
    pub damage_multiplier: f64,
    pub damage_multiplier_additive: f64,
    /// Defaults to the encounter's spell crit multiplier
    pub crit_multiplier: Option<f64>,
    pub bonus_crit_rating: f64,
    pub bonus_hit_rating: f64,
    pub dot: Option<DotConfig>,
    pub extra_cast_condition: Option<CastCondition>,
    pub apply_effects: Option<ApplyEffects>,
}

impl Default for SpellConfig {
    fn default() -> Self {
        SpellConfig {
            action_id: ActionId::default(),
            label: String::new(),
            school: SpellSchool::NONE,
            proc_mask: ProcMask::NONE,
            flags: SpellFlags::NONE,
            class_spell_mask: 0,
            cost: 0.0,
            cast: CastConfig::default(),
            damage_multiplier: 1.0,
            damage_multiplier_additive: 1.0,
            crit_multiplier: None,
            bonus_crit_rating: 0.0,
            bonus_hit_rating: 0.0,
            dot: None,
            extra_cast_condition: None,
            apply_effects: None,
        }
    }
}

impl SpellConfig {
    pub fn with_apply_effects<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Simulation, SpellId, UnitId) -> SimResult<()> + 'static,
    {
        self.apply_effects = Some(Rc::new(f));
        self
    }

    pub fn with_cast_condition<F>(mut self, f: F) -> Self
    where
        F: Fn(&Simulation, SpellId) -> bool + 'static,
    {
        self.extra_cast_condition = Some(Rc::new(f));
        self
    }

    fn validate(&self) -> SimResult<()> {
        let invalid = |reason: String| SimError::InvalidSpell {
            label: self.label.clone(),
            reason,
        };
        for (name, value) in [
            ("gcd", self.cast.gcd),
            ("cast time", self.cast.cast_time),
            ("cooldown", self.cast.cooldown),
        ] {
            if value.is_negative() {
                return Err(invalid(format!("negative {} {}", name, value)));
            }
        }
        if self.cost < 0.0 {
            return Err(invalid(format!("negative cost {}", self.cost)));
        }
        if let Some(dot) = &self.dot {
            if dot.tick_length <= SimTime::ZERO || dot.tick_length.is_never() {
                return Err(invalid(format!("dot tick length must be positive, got {}", dot.tick_length)));
            }
        }
        Ok(())
    }
}

/// Current cast values; modifiers change these in place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cast {
    pub cost: f64,
    pub gcd: SimTime,
    pub cast_time: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cooldown {
    pub duration: SimTime,
    pub ready_at: SimTime,
}

/// Numeric attributes restored at the start of every iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpellSnapshot {
    default_cast: Cast,
    cost_multiplier: f64,
    cast_time_multiplier: f64,
    cd_duration: SimTime,
    damage_multiplier: f64,
    damage_multiplier_additive: f64,
    crit_multiplier: f64,
    bonus_crit_rating: f64,
    bonus_hit_rating: f64,
}

/// A registered spell
///
/// Numeric fields are public so content can read their post-modifier values;
/// they should be changed through modifiers so the change can be reverted.
pub struct Spell {
    pub(crate) unit: UnitId,
    pub action_id: ActionId,
    pub label: String,
    pub school: SpellSchool,
    pub proc_mask: ProcMask,
    pub flags: SpellFlags,
    pub class_spell_mask: u64,
    pub default_cast: Cast,
    pub cost_multiplier: f64,
    pub cast_time_multiplier: f64,
    pub cd: Cooldown,
    pub damage_multiplier: f64,
    pub damage_multiplier_additive: f64,
    pub crit_multiplier: f64,
    pub bonus_crit_rating: f64,
    pub bonus_hit_rating: f64,
    /// One slot per unit, indexed by `UnitId`; filled for targets of a single-target dot
    pub(crate) dots: Vec<Option<DotId>>,
    pub(crate) aoe_dot: Option<DotId>,
    pub(crate) extra_cast_condition: Option<CastCondition>,
    pub(crate) apply_effects: Option<ApplyEffects>,
    pub metrics: SpellMetrics,
}

impl Spell {
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub(crate) fn snapshot(&self) -> SpellSnapshot {
        SpellSnapshot {
            default_cast: self.default_cast,
            cost_multiplier: self.cost_multiplier,
            cast_time_multiplier: self.cast_time_multiplier,
            cd_duration: self.cd.duration,
            damage_multiplier: self.damage_multiplier,
            damage_multiplier_additive: self.damage_multiplier_additive,
            crit_multiplier: self.crit_multiplier,
            bonus_crit_rating: self.bonus_crit_rating,
            bonus_hit_rating: self.bonus_hit_rating,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: &SpellSnapshot) {
        self.default_cast = snapshot.default_cast;
        self.cost_multiplier = snapshot.cost_multiplier;
        self.cast_time_multiplier = snapshot.cast_time_multiplier;
        self.cd.duration = snapshot.cd_duration;
        self.damage_multiplier = snapshot.damage_multiplier;
        self.damage_multiplier_additive = snapshot.damage_multiplier_additive;
        self.crit_multiplier = snapshot.crit_multiplier;
        self.bonus_crit_rating = snapshot.bonus_crit_rating;
        self.bonus_hit_rating = snapshot.bonus_hit_rating;
    }

    pub(crate) fn reset_state(&mut self) {
        self.cd.ready_at = SimTime::ZERO;
        self.metrics = SpellMetrics::default();
    }
}

impl Simulation {
    /// Register a spell on a unit
    ///
    /// The new spell is matched against the unit's modifiers, its dots are
    /// created, and then every spell-registered hook of the unit runs.
    pub fn register_spell(&mut self, unit: UnitId, config: SpellConfig) -> SimResult<SpellId> {
        config.validate()?;
        let id = SpellId(self.spells.len());
        let crit_multiplier = config
            .crit_multiplier
            .unwrap_or(self.constants.default_spell_crit_multiplier);

        self.spells.push(Spell {
            unit,
            action_id: config.action_id,
            label: config.label,
            school: config.school,
            proc_mask: config.proc_mask,
            flags: config.flags,
            class_spell_mask: config.class_spell_mask,
            default_cast: Cast {
                cost: config.cost,
                gcd: config.cast.gcd,
                cast_time: config.cast.cast_time,
            },
            cost_multiplier: 1.0,
            cast_time_multiplier: 1.0,
            cd: Cooldown {
                duration: config.cast.cooldown,
                ready_at: SimTime::ZERO,
            },
            damage_multiplier: config.damage_multiplier,
            damage_multiplier_additive: config.damage_multiplier_additive,
            crit_multiplier,
            bonus_crit_rating: config.bonus_crit_rating,
            bonus_hit_rating: config.bonus_hit_rating,
            dots: vec![None; self.units.len()],
            aoe_dot: None,
            extra_cast_condition: config.extra_cast_condition,
            apply_effects: config.apply_effects,
            metrics: SpellMetrics::default(),
        });
        self.units[unit.0].spells.push(id);

        if let Some(dot) = config.dot {
            self.create_dots(id, dot)?;
        }
        self.match_mods_to_spell(id);

        let hooks = self.units[unit.0].spell_registered_hooks.clone();
        for hook in hooks {
            hook(self, id)?;
        }
        Ok(id)
    }

    pub fn spell(&self, spell: SpellId) -> &Spell {
        &self.spells[spell.0]
    }

    pub fn spell_by_action_id(&self, unit: UnitId, action_id: ActionId) -> Option<SpellId> {
        self.units[unit.0]
            .spells
            .iter()
            .copied()
            .find(|spell| self.spells[spell.0].action_id == action_id)
    }

    pub fn spell_by_label(&self, unit: UnitId, label: &str) -> Option<SpellId> {
        self.units[unit.0]
            .spells
            .iter()
            .copied()
            .find(|spell| self.spells[spell.0].label == label)
    }
}
