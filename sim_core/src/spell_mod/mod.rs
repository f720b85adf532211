//! Spell modifiers: reversible, declaratively matched deltas on spell attributes
//!
//! A modifier matches spells by class mask, school and proc mask. Every
//! matching spell of the owner (registered before or after the modifier) is
//! recorded in `affected`, and while the modifier is active its delta is
//! applied to each of them.

mod kinds;

pub use kinds::{SpellModKind, SpellModValue, ValueChannel};

use crate::error::{SimError, SimResult};
use crate::sim::Simulation;
use crate::spell::Spell;
use crate::types::{ModId, ProcMask, SimTime, SpellFlags, SpellId, SpellSchool, UnitId};
use kinds::spell_mod_functions;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Declarative description of a modifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellModConfig {
    pub kind: SpellModKind,
    /// Matches spells whose class mask shares a bit; 0 matches all
    #[serde(default)]
    pub class_mask: u64,
    #[serde(default)]
    pub school: SpellSchool,
    #[serde(default)]
    pub proc_mask: ProcMask,
    #[serde(default)]
    pub int_value: i64,
    #[serde(default)]
    pub time_value: SimTime,
    #[serde(default)]
    pub float_value: f64,
}

impl SpellModConfig {
    pub fn new(kind: SpellModKind) -> Self {
        SpellModConfig {
            kind,
            ..Default::default()
        }
    }

    /// Start from a raw kind bit, e.g. one read from external data
    pub fn from_kind_bits(bits: u32) -> SimResult<Self> {
        Ok(SpellModConfig::new(SpellModKind::from_bits(bits)?))
    }

    pub fn with_class_mask(mut self, class_mask: u64) -> Self {
        self.class_mask = class_mask;
        self
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn with_proc_mask(mut self, proc_mask: ProcMask) -> Self {
        self.proc_mask = proc_mask;
        self
    }

    pub fn with_int_value(mut self, value: i64) -> Self {
        self.int_value = value;
        self
    }

    pub fn with_time_value(mut self, value: SimTime) -> Self {
        self.time_value = value;
        self
    }

    pub fn with_float_value(mut self, value: f64) -> Self {
        self.float_value = value;
        self
    }

    fn value(&self) -> SpellModValue {
        SpellModValue {
            int_value: self.int_value,
            time_value: self.time_value,
            float_value: self.float_value,
        }
    }

    /// Whether this modifier applies to the spell
    pub fn matches(&self, spell: &Spell) -> bool {
        if spell.flags.matches(SpellFlags::NO_SPELL_MODS) {
            return false;
        }
        if self.class_mask != 0 && self.class_mask & spell.class_spell_mask == 0 {
            return false;
        }
        if !self.school.is_empty() && !self.school.matches(spell.school) {
            return false;
        }
        if !self.proc_mask.is_empty() && !self.proc_mask.matches(spell.proc_mask) {
            return false;
        }
        true
    }
}

/// Reject a value the kind does not read, or one its apply/remove pair
/// cannot undo exactly
fn validate_value(kind: SpellModKind, value: &SpellModValue) -> SimResult<()> {
    let invalid = |reason: &str| SimError::InvalidSpellMod {
        kind: kind.to_string(),
        reason: reason.to_string(),
    };
    let int_set = value.int_value != 0;
    let time_set = value.time_value != SimTime::ZERO;
    let float_set = value.float_value != 0.0;
    match kind.channel() {
        ValueChannel::Int if time_set || float_set => Err(invalid("reads int_value only")),
        ValueChannel::Time if int_set || float_set => Err(invalid("reads time_value only")),
        ValueChannel::Float if int_set || time_set => Err(invalid("reads float_value only")),
        ValueChannel::Int if i32::try_from(value.int_value).is_err() => {
            Err(invalid("int_value must fit a tick count"))
        }
        ValueChannel::Float if !value.float_value.is_finite() => Err(invalid("float_value must be finite")),
        _ if kind == SpellModKind::DamageDonePct && value.float_value <= -1.0 => {
            Err(invalid("percent damage must stay above -100%"))
        }
        _ if kind == SpellModKind::CritMultiplierPct && value.float_value <= -1.0 => {
            Err(invalid("crit multiplier percent must stay above -100%"))
        }
        _ => Ok(()),
    }
}

/// A built modifier belonging to one unit
#[derive(Debug)]
pub struct SpellMod {
    pub(crate) owner: UnitId,
    pub(crate) config: SpellModConfig,
    pub(crate) value: SpellModValue,
    pub(crate) is_static: bool,
    pub(crate) active: bool,
    pub(crate) affected: Vec<SpellId>,
}

impl SpellMod {
    pub fn owner(&self) -> UnitId {
        self.owner
    }

    pub fn kind(&self) -> SpellModKind {
        self.config.kind
    }

    pub fn value(&self) -> SpellModValue {
        self.value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Spells matched so far, in registration order
    pub fn affected_spells(&self) -> &[SpellId] {
        &self.affected
    }
}

impl Simulation {
    /// Build an inactive modifier and match it against the owner's spells
    fn build_mod(&mut self, owner: UnitId, config: SpellModConfig, is_static: bool) -> SimResult<ModId> {
        if spell_mod_functions(config.kind).is_none() {
            return Err(SimError::UnimplementedSpellMod(config.kind.bits()));
        }
        let value = config.value();
        validate_value(config.kind, &value)?;

        let affected = self.units[owner.0]
            .spells
            .iter()
            .copied()
            .filter(|spell| config.matches(&self.spells[spell.0]))
            .collect();
        let id = ModId(self.mods.len());
        self.mods.push(SpellMod {
            owner,
            config,
            value,
            is_static,
            active: false,
            affected,
        });
        self.units[owner.0].mods.push(id);
        Ok(id)
    }

    /// Build a modifier that is active for the rest of the simulation
    pub fn add_static_mod(&mut self, owner: UnitId, config: SpellModConfig) -> SimResult<ModId> {
        let id = self.build_mod(owner, config, true)?;
        self.apply_mod(id);
        Ok(id)
    }

    /// Build an inactive modifier for an aura (or other content) to toggle
    pub fn add_dynamic_mod(&mut self, owner: UnitId, config: SpellModConfig) -> SimResult<ModId> {
        self.build_mod(owner, config, false)
    }

    pub fn spell_mod(&self, id: ModId) -> &SpellMod {
        &self.mods[id.0]
    }

    /// No-op if already active
    pub fn activate_mod(&mut self, id: ModId) -> SimResult<()> {
        if self.mods[id.0].active {
            return Ok(());
        }
        debug!(time = %self.now(), kind = %self.mods[id.0].config.kind, "spell mod activated");
        self.apply_mod(id);
        Ok(())
    }

    /// No-op if inactive; static modifiers cannot be deactivated
    pub fn deactivate_mod(&mut self, id: ModId) -> SimResult<()> {
        let spell_mod = &self.mods[id.0];
        if !spell_mod.active {
            return Ok(());
        }
        if spell_mod.is_static {
            return Err(SimError::StaticModDeactivated(spell_mod.config.kind.to_string()));
        }
        debug!(time = %self.now(), kind = %spell_mod.config.kind, "spell mod deactivated");
        self.remove_mod(id);
        Ok(())
    }

    pub fn update_int_value(&mut self, id: ModId, value: i64) -> SimResult<()> {
        self.update_value(id, |v| v.int_value = value)
    }

    pub fn update_time_value(&mut self, id: ModId, value: SimTime) -> SimResult<()> {
        self.update_value(id, |v| v.time_value = value)
    }

    pub fn update_float_value(&mut self, id: ModId, value: f64) -> SimResult<()> {
        self.update_value(id, |v| v.float_value = value)
    }

    /// Swap the value without ever having old and new deltas applied together
    ///
    /// A rejected value leaves the modifier and its spells untouched.
    fn update_value(&mut self, id: ModId, set: impl FnOnce(&mut SpellModValue)) -> SimResult<()> {
        let mut value = self.mods[id.0].value;
        set(&mut value);
        validate_value(self.mods[id.0].config.kind, &value)?;

        let was_active = self.mods[id.0].active;
        if was_active {
            self.remove_mod(id);
        }
        self.mods[id.0].value = value;
        if was_active {
            self.apply_mod(id);
        }
        Ok(())
    }

    fn apply_mod(&mut self, id: ModId) {
        let spell_mod = &mut self.mods[id.0];
        spell_mod.active = true;
        if let Some(functions) = spell_mod_functions(spell_mod.config.kind) {
            for spell in &spell_mod.affected {
                (functions.apply)(&spell_mod.value, &mut self.spells[spell.0], &mut self.dots);
            }
        }
    }

    fn remove_mod(&mut self, id: ModId) {
        let spell_mod = &mut self.mods[id.0];
        spell_mod.active = false;
        if let Some(functions) = spell_mod_functions(spell_mod.config.kind) {
            for spell in &spell_mod.affected {
                (functions.remove)(&spell_mod.value, &mut self.spells[spell.0], &mut self.dots);
            }
        }
    }

    /// Match a newly registered spell against every modifier of its owner
    pub(crate) fn match_mods_to_spell(&mut self, spell: SpellId) {
        let owner = self.spells[spell.0].unit;
        for index in 0..self.units[owner.0].mods.len() {
            let id = self.units[owner.0].mods[index];
            let spell_mod = &mut self.mods[id.0];
            if !spell_mod.config.matches(&self.spells[spell.0]) {
                continue;
            }
            spell_mod.affected.push(spell);
            if spell_mod.active {
                if let Some(functions) = spell_mod_functions(spell_mod.config.kind) {
                    (functions.apply)(&spell_mod.value, &mut self.spells[spell.0], &mut self.dots);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncounterConfig;
    use crate::spell::SpellConfig;
    use proptest::prelude::*;

    const FIRE_BLAST: u64 = 1 << 0;
    const SCORCH: u64 = 1 << 1;

    fn sim_with_spell(config: SpellConfig) -> (Simulation, SpellId) {
        let mut sim = Simulation::new(&EncounterConfig::default());
        let player = sim.player();
        let spell = sim.register_spell(player, config).unwrap();
        (sim, spell)
    }

    fn fire_blast() -> SpellConfig {
        SpellConfig {
            label: "Fire Blast".to_string(),
            school: SpellSchool::FIRE,
            proc_mask: ProcMask::SPELL_DAMAGE,
            class_spell_mask: FIRE_BLAST,
            ..SpellConfig::default()
        }
    }

    #[test]
    fn test_static_mod_applies_to_later_spell() {
        let mut sim = Simulation::new(&EncounterConfig::default());
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::DamageDonePct)
            .with_class_mask(FIRE_BLAST)
            .with_float_value(0.05);
        sim.add_static_mod(player, config).unwrap();
        let spell = sim.register_spell(player, fire_blast()).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_mod_matches_existing_spells_retroactively() {
        let (mut sim, spell) = sim_with_spell(fire_blast());
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::DamageDoneFlat)
            .with_school(SpellSchool::FIRE)
            .with_float_value(0.03);
        let id = sim.add_static_mod(player, config).unwrap();
        assert_eq!(sim.spell_mod(id).affected_spells(), &[spell]);
        assert!((sim.spell(spell).damage_multiplier_additive - 1.03).abs() < 1e-12);
    }

    #[test]
    fn test_match_rules() {
        let (mut sim, spell) = sim_with_spell(fire_blast());
        let player = sim.player();
        let miss_class = SpellModConfig::new(SpellModKind::PowerCostPct)
            .with_class_mask(SCORCH)
            .with_float_value(-0.5);
        let miss_school = SpellModConfig::new(SpellModKind::PowerCostPct)
            .with_school(SpellSchool::FROST)
            .with_float_value(-0.5);
        let miss_proc = SpellModConfig::new(SpellModKind::PowerCostPct)
            .with_proc_mask(ProcMask::MELEE_OR_RANGED)
            .with_float_value(-0.5);
        for config in [miss_class, miss_school, miss_proc] {
            let id = sim.add_static_mod(player, config).unwrap();
            assert!(sim.spell_mod(id).affected_spells().is_empty());
        }
        assert!((sim.spell(spell).cost_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_spell_mod_exempt_flag() {
        let (mut sim, spell) = sim_with_spell(SpellConfig {
            flags: SpellFlags::NO_SPELL_MODS,
            ..fire_blast()
        });
        let player = sim.player();
        let id = sim
            .add_static_mod(player, SpellModConfig::new(SpellModKind::DamageDonePct).with_float_value(0.2))
            .unwrap();
        assert!(sim.spell_mod(id).affected_spells().is_empty());
        assert!((sim.spell(spell).damage_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_dynamic_cooldown_mod() {
        let (mut sim, spell) = sim_with_spell(SpellConfig {
            cast: crate::spell::CastConfig {
                cooldown: SimTime::from_secs(45),
                ..Default::default()
            },
            ..fire_blast()
        });
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::CooldownFlat).with_time_value(SimTime::from_secs(-3));
        let id = sim.add_dynamic_mod(player, config).unwrap();

        assert_eq!(sim.spell(spell).cd.duration, SimTime::from_secs(45));
        sim.activate_mod(id).unwrap();
        sim.activate_mod(id).unwrap();
        assert_eq!(sim.spell(spell).cd.duration, SimTime::from_secs(42));
        sim.deactivate_mod(id).unwrap();
        sim.deactivate_mod(id).unwrap();
        assert_eq!(sim.spell(spell).cd.duration, SimTime::from_secs(45));
    }

    #[test]
    fn test_static_mod_cannot_deactivate() {
        let (mut sim, _) = sim_with_spell(fire_blast());
        let player = sim.player();
        let id = sim
            .add_static_mod(player, SpellModConfig::new(SpellModKind::BonusCritRating).with_float_value(10.0))
            .unwrap();
        assert!(matches!(sim.deactivate_mod(id), Err(SimError::StaticModDeactivated(_))));
        assert!(sim.spell_mod(id).is_active());
    }

    #[test]
    fn test_wrong_channel_rejected() {
        let mut sim = Simulation::new(&EncounterConfig::default());
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::CooldownFlat).with_float_value(3.0);
        assert!(matches!(
            sim.add_static_mod(player, config),
            Err(SimError::InvalidSpellMod { .. })
        ));
        let config = SpellModConfig::new(SpellModKind::DotNumberOfTicksFlat).with_time_value(SimTime::from_secs(1));
        assert!(matches!(
            sim.add_dynamic_mod(player, config),
            Err(SimError::InvalidSpellMod { .. })
        ));
        assert!(matches!(
            SpellModConfig::from_kind_bits(1 << 15),
            Err(SimError::UnimplementedSpellMod(_))
        ));
    }

    #[test]
    fn test_crit_multiplier_pct() {
        let (mut sim, spell) = sim_with_spell(SpellConfig {
            crit_multiplier: Some(2.0),
            ..fire_blast()
        });
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::CritMultiplierPct).with_float_value(0.5);
        let id = sim.add_dynamic_mod(player, config).unwrap();

        sim.activate_mod(id).unwrap();
        assert!((sim.spell(spell).crit_multiplier - 2.5).abs() < 1e-12);
        sim.deactivate_mod(id).unwrap();
        assert!((sim.spell(spell).crit_multiplier - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_while_active_replaces_delta() {
        let (mut sim, spell) = sim_with_spell(fire_blast());
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::DamageDonePct).with_float_value(0.1);
        let id = sim.add_dynamic_mod(player, config).unwrap();

        sim.activate_mod(id).unwrap();
        sim.update_float_value(id, 0.3).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.3).abs() < 1e-12);

        sim.deactivate_mod(id).unwrap();
        sim.update_float_value(id, 0.5).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.0).abs() < 1e-12);
        sim.activate_mod(id).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejected_update_leaves_mod_untouched() {
        let (mut sim, spell) = sim_with_spell(fire_blast());
        let player = sim.player();
        let id = sim
            .add_static_mod(player, SpellModConfig::new(SpellModKind::DamageDonePct).with_float_value(0.1))
            .unwrap();

        for bad in [-1.0, -2.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                sim.update_float_value(id, bad),
                Err(SimError::InvalidSpellMod { .. })
            ));
        }
        assert!(matches!(
            sim.update_int_value(id, 2),
            Err(SimError::InvalidSpellMod { .. })
        ));
        assert!((sim.spell(spell).damage_multiplier - 1.1).abs() < 1e-12);
        assert!((sim.spell_mod(id).value().float_value - 0.1).abs() < f64::EPSILON);

        sim.update_float_value(id, 0.2).unwrap();
        assert!((sim.spell(spell).damage_multiplier - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_crit_multiplier_update_rejects_minus_one() {
        let (mut sim, spell) = sim_with_spell(fire_blast());
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::CritMultiplierPct).with_float_value(0.5);
        let id = sim.add_dynamic_mod(player, config).unwrap();
        sim.activate_mod(id).unwrap();
        let before = sim.spell(spell).crit_multiplier;

        assert!(sim.update_float_value(id, -1.0).is_err());
        assert!(sim.spell_mod(id).is_active());
        assert!((sim.spell(spell).crit_multiplier - before).abs() < 1e-12);
    }

    #[test]
    fn test_tick_delta_must_fit_tick_count() {
        let mut sim = Simulation::new(&EncounterConfig::default());
        let player = sim.player();
        let config = SpellModConfig::new(SpellModKind::DotNumberOfTicksFlat).with_int_value(i64::from(i32::MAX) + 1);
        assert!(matches!(
            sim.add_dynamic_mod(player, config),
            Err(SimError::InvalidSpellMod { .. })
        ));

        let config = SpellModConfig::new(SpellModKind::DotNumberOfTicksFlat).with_int_value(2);
        let id = sim.add_dynamic_mod(player, config).unwrap();
        assert!(sim.update_int_value(id, i64::MIN).is_err());
        assert_eq!(sim.spell_mod(id).value().int_value, 2);
        sim.update_int_value(id, 3).unwrap();
        assert_eq!(sim.spell_mod(id).value().int_value, 3);
    }

    fn float_kind() -> impl Strategy<Value = SpellModKind> {
        prop::sample::select(
            SpellModKind::ALL
                .iter()
                .copied()
                .filter(|k| k.channel() == ValueChannel::Float)
                .collect::<Vec<_>>(),
        )
    }

    fn attributes(spell: &Spell) -> [f64; 7] {
        [
            spell.damage_multiplier,
            spell.damage_multiplier_additive,
            spell.cost_multiplier,
            spell.default_cast.cost,
            spell.crit_multiplier,
            spell.cast_time_multiplier,
            spell.bonus_crit_rating + spell.bonus_hit_rating,
        ]
    }

    proptest! {
        #[test]
        fn prop_activate_deactivate_restores(kind in float_kind(), value in -0.9f64..3.0) {
            let (mut sim, spell) = sim_with_spell(SpellConfig {
                cost: 120.0,
                crit_multiplier: Some(1.5),
                ..fire_blast()
            });
            let before = attributes(sim.spell(spell));
            let player = sim.player();
            let id = sim.add_dynamic_mod(player, SpellModConfig::new(kind).with_float_value(value)).unwrap();
            sim.activate_mod(id).unwrap();
            sim.deactivate_mod(id).unwrap();
            for (after, before) in attributes(sim.spell(spell)).iter().zip(before) {
                prop_assert!((after - before).abs() <= 1e-9 * before.abs().max(1.0));
            }
        }

        #[test]
        fn prop_update_equals_toggle(old in -0.5f64..1.0, new in -0.5f64..1.0) {
            let (mut sim, spell) = sim_with_spell(fire_blast());
            let player = sim.player();
            let config = SpellModConfig::new(SpellModKind::DamageDonePct).with_float_value(old);
            let id = sim.add_dynamic_mod(player, config).unwrap();
            sim.activate_mod(id).unwrap();
            sim.update_float_value(id, new).unwrap();
            prop_assert!((sim.spell(spell).damage_multiplier - (1.0 + new)).abs() < 1e-9);
        }

        #[test]
        fn prop_cooldown_flat_is_exact(delta in -30_000i64..30_000) {
            let (mut sim, spell) = sim_with_spell(fire_blast());
            let player = sim.player();
            let before = sim.spell(spell).cd.duration;
            let config = SpellModConfig::new(SpellModKind::CooldownFlat).with_time_value(SimTime::from_millis(delta));
            let id = sim.add_dynamic_mod(player, config).unwrap();
            sim.activate_mod(id).unwrap();
            prop_assert_eq!(sim.spell(spell).cd.duration, before + SimTime::from_millis(delta));
            sim.deactivate_mod(id).unwrap();
            prop_assert_eq!(sim.spell(spell).cd.duration, before);
        }
    }
}
