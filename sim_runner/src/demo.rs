//! Demonstration fire mage: a handful of spells, talent modifiers and proc
//! auras wired into the simulation core

use sim_core::prelude::*;
use sim_core::{TalentSchema, TalentSlot, Talents};
use std::cell::Cell;
use std::rc::Rc;

pub const MAGE_SPELL_FIREBALL: u64 = 1 << 0;
pub const MAGE_SPELL_FIRE_BLAST: u64 = 1 << 1;
pub const MAGE_SPELL_SCORCH: u64 = 1 << 2;
pub const MAGE_SPELL_PYROBLAST: u64 = 1 << 3;
pub const MAGE_SPELL_LIVING_BOMB: u64 = 1 << 4;
pub const MAGE_SPELL_FLAMESTRIKE: u64 = 1 << 5;
pub const MAGE_SPELLS_ALL: u64 = (1 << 6) - 1;

const SPELL_FLAG_MAGE: SpellFlags = SpellFlags::AGENT_RESERVED_1;
/// Crits with these spells feed Hot Streak
const HOT_STREAK_SPELLS: SpellFlags = SpellFlags::AGENT_RESERVED_3;

const SCALING_BASE_DAMAGE: f64 = 937.33;
const BASE_MANA: f64 = 20_000.0;

/// Arcane and fire trees of the demo mage
pub fn fire_mage_talents() -> TalentSchema {
    TalentSchema::new(vec![
        vec![TalentSlot::new("Arcane Focus", 3)],
        vec![
            TalentSlot::new("Master of Elements", 2),
            TalentSlot::new("Improved Fire Blast", 2),
            TalentSlot::new("Improved Scorch", 2),
            TalentSlot::new("Fire Power", 3),
            TalentSlot::new("Improved Flamestrike", 2),
            TalentSlot::new("Critical Mass", 3),
            TalentSlot::new("Hot Streak", 1),
            TalentSlot::new("Molten Fury", 3),
        ],
    ])
}

pub const DEFAULT_TALENTS: &str = "3-22232313";

#[derive(Debug, Clone, Copy)]
struct MageSpells {
    fireball: SpellId,
    fire_blast: SpellId,
    scorch: SpellId,
    pyroblast: SpellId,
    living_bomb: SpellId,
    flamestrike: SpellId,
}

/// Fire mage rotation
pub struct FireMage {
    talents: Talents,
    spells: Option<MageSpells>,
    hot_streak: Option<AuraId>,
}

impl FireMage {
    pub fn new(talents: Talents) -> Self {
        FireMage {
            talents,
            spells: None,
            hot_streak: None,
        }
    }

    fn register_spells(&self, sim: &mut Simulation, unit: UnitId) -> SimResult<MageSpells> {
        let gcd = sim.constants().default_gcd;
        let direct = |label: &str, id: i32, mask: u64| SpellConfig {
            action_id: ActionId::spell(id),
            label: label.to_string(),
            school: SpellSchool::FIRE,
            proc_mask: ProcMask::SPELL_DAMAGE,
            flags: SPELL_FLAG_MAGE | SpellFlags::APL,
            class_spell_mask: mask,
            ..SpellConfig::default()
        };

        let fireball = sim.register_spell(
            unit,
            SpellConfig {
                cost: 290.0,
                cast: CastConfig {
                    gcd,
                    cast_time: SimTime::from_millis(2500),
                    ..CastConfig::default()
                },
                flags: SPELL_FLAG_MAGE | SpellFlags::APL | HOT_STREAK_SPELLS,
                ..direct("Fireball", 133, MAGE_SPELL_FIREBALL)
            }
            .with_apply_effects(|sim, spell, target| {
                sim.calc_and_deal_damage(spell, target, 1.2 * SCALING_BASE_DAMAGE, Outcome::MagicHitAndCrit)?;
                Ok(())
            }),
        )?;

        let fire_blast = sim.register_spell(
            unit,
            SpellConfig {
                cost: 210.0,
                cast: CastConfig {
                    gcd,
                    cooldown: SimTime::from_secs(8),
                    ..CastConfig::default()
                },
                flags: SPELL_FLAG_MAGE | SpellFlags::APL | HOT_STREAK_SPELLS,
                ..direct("Fire Blast", 2136, MAGE_SPELL_FIRE_BLAST)
            }
            .with_apply_effects(|sim, spell, target| {
                sim.calc_and_deal_damage(spell, target, 0.9 * SCALING_BASE_DAMAGE, Outcome::MagicHitAndCrit)?;
                Ok(())
            }),
        )?;

        let scorch = sim.register_spell(
            unit,
            SpellConfig {
                cost: 160.0,
                cast: CastConfig {
                    gcd,
                    cast_time: SimTime::from_millis(1500),
                    ..CastConfig::default()
                },
                flags: SPELL_FLAG_MAGE | SpellFlags::APL | HOT_STREAK_SPELLS,
                ..direct("Scorch", 2948, MAGE_SPELL_SCORCH)
            }
            .with_apply_effects(|sim, spell, target| {
                sim.calc_and_deal_damage(spell, target, 0.6 * SCALING_BASE_DAMAGE, Outcome::MagicHitAndCrit)?;
                Ok(())
            }),
        )?;

        let pyroblast = sim.register_spell(
            unit,
            SpellConfig {
                cost: 340.0,
                cast: CastConfig {
                    gcd,
                    cast_time: SimTime::from_millis(3500),
                    ..CastConfig::default()
                },
                dot: Some(
                    DotConfig::new("Pyroblast", 4, SimTime::from_secs(3)).on_tick(|sim, dot| {
                        let (spell, target) = (sim.dot(dot).spell(), sim.dot(dot).target());
                        sim.calc_and_deal_periodic_damage(spell, target, 0.18 * SCALING_BASE_DAMAGE, Outcome::Tick)?;
                        Ok(())
                    }),
                ),
                ..direct("Pyroblast", 11366, MAGE_SPELL_PYROBLAST)
            }
            .with_apply_effects(|sim, spell, target| {
                let result =
                    sim.calc_and_deal_damage(spell, target, 1.5 * SCALING_BASE_DAMAGE, Outcome::MagicHitAndCrit)?;
                if result.landed() {
                    if let Some(dot) = sim.spell_dot(spell, target) {
                        sim.apply_dot(dot)?;
                    }
                }
                Ok(())
            }),
        )?;

        let living_bomb = sim.register_spell(
            unit,
            SpellConfig {
                cost: 340.0,
                cast: CastConfig {
                    gcd,
                    ..CastConfig::default()
                },
                dot: Some(
                    DotConfig::new("Living Bomb", 4, SimTime::from_secs(3)).on_tick(|sim, dot| {
                        let (spell, target) = (sim.dot(dot).spell(), sim.dot(dot).target());
                        sim.calc_and_deal_periodic_damage(spell, target, 0.25 * SCALING_BASE_DAMAGE, Outcome::Tick)?;
                        // The bomb goes off on its last tick, hitting every target
                        if sim.dot_ticks_remaining(dot) == 0 {
                            for aoe_target in sim.targets().to_vec() {
                                sim.calc_and_deal_damage(
                                    spell,
                                    aoe_target,
                                    0.5 * SCALING_BASE_DAMAGE,
                                    Outcome::MagicHitAndCrit,
                                )?;
                            }
                        }
                        Ok(())
                    }),
                ),
                ..direct("Living Bomb", 44457, MAGE_SPELL_LIVING_BOMB)
            }
            .with_apply_effects(|sim, spell, target| {
                if let Some(dot) = sim.spell_dot(spell, target) {
                    sim.apply_dot(dot)?;
                }
                Ok(())
            }),
        )?;

        let flamestrike = sim.register_spell(
            unit,
            SpellConfig {
                cost: 600.0,
                cast: CastConfig {
                    gcd,
                    cast_time: SimTime::from_secs(2),
                    ..CastConfig::default()
                },
                dot: Some(
                    DotConfig::new("Flamestrike", 4, SimTime::from_secs(2))
                        .aoe()
                        .on_tick(|sim, dot| {
                            let spell = sim.dot(dot).spell();
                            for aoe_target in sim.targets().to_vec() {
                                sim.calc_and_deal_periodic_damage(
                                    spell,
                                    aoe_target,
                                    0.1 * SCALING_BASE_DAMAGE,
                                    Outcome::Tick,
                                )?;
                            }
                            Ok(())
                        }),
                ),
                ..direct("Flamestrike", 2120, MAGE_SPELL_FLAMESTRIKE)
            }
            .with_apply_effects(|sim, spell, _| {
                for aoe_target in sim.targets().to_vec() {
                    sim.calc_and_deal_damage(spell, aoe_target, 0.66 * SCALING_BASE_DAMAGE, Outcome::MagicHitAndCrit)?;
                }
                if let Some(dot) = sim.spell_aoe_dot(spell) {
                    sim.apply_dot(dot)?;
                }
                Ok(())
            }),
        )?;

        Ok(MageSpells {
            fireball,
            fire_blast,
            scorch,
            pyroblast,
            living_bomb,
            flamestrike,
        })
    }

    fn apply_talents(&self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        let points = |name: &str| self.talents.points(name) as f64;

        if self.talents.has("Arcane Focus") {
            sim.unit_mut(unit).spell_hit_percent += points("Arcane Focus");
        }
        if self.talents.has("Improved Fire Blast") {
            let rating = sim.constants().crit_rating(4.0 * points("Improved Fire Blast"));
            sim.add_static_mod(
                unit,
                SpellModConfig::new(SpellModKind::BonusCritRating)
                    .with_class_mask(MAGE_SPELL_FIRE_BLAST)
                    .with_float_value(rating),
            )?;
        }
        if self.talents.has("Fire Power") {
            sim.add_static_mod(
                unit,
                SpellModConfig::new(SpellModKind::DamageDoneFlat)
                    .with_school(SpellSchool::FIRE)
                    .with_float_value(0.01 * points("Fire Power")),
            )?;
        }
        if self.talents.has("Improved Scorch") {
            sim.add_static_mod(
                unit,
                SpellModConfig::new(SpellModKind::PowerCostPct)
                    .with_class_mask(MAGE_SPELL_SCORCH)
                    .with_float_value(-0.5 * points("Improved Scorch")),
            )?;
        }
        if self.talents.has("Improved Flamestrike") {
            sim.add_static_mod(
                unit,
                SpellModConfig::new(SpellModKind::CastTimePct)
                    .with_class_mask(MAGE_SPELL_FLAMESTRIKE)
                    .with_float_value(-0.5 * points("Improved Flamestrike")),
            )?;
        }
        if self.talents.has("Critical Mass") {
            sim.add_static_mod(
                unit,
                SpellModConfig::new(SpellModKind::DamageDonePct)
                    .with_class_mask(MAGE_SPELL_LIVING_BOMB)
                    .with_float_value(0.05 * points("Critical Mass")),
            )?;
        }
        Ok(())
    }

    /// Refunds part of a spell's base cost on every crit
    fn register_master_of_elements(&self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        if !self.talents.has("Master of Elements") {
            return Ok(());
        }
        let refund = 0.15 * self.talents.points("Master of Elements") as f64;
        sim.register_aura(
            unit,
            AuraConfig::new("Master of Elements")
                .with_action_id(ActionId::spell(29076))
                .on_reset(|sim, aura| sim.activate_aura(aura))
                .on_spell_hit_dealt(move |sim, aura, spell, result| {
                    let state = sim.spell(spell);
                    if state.proc_mask.matches(ProcMask::MELEE_OR_RANGED) || state.default_cast.cost == 0.0 {
                        return Ok(());
                    }
                    if result.did_crit() {
                        let amount = state.default_cast.cost * refund;
                        let owner = sim.aura(aura).unit();
                        sim.add_mana(owner, amount);
                    }
                    Ok(())
                }),
        )?;
        Ok(())
    }

    /// Two crits in a row, or a lucky single crit, make the next Pyroblast
    /// instant and free
    fn register_hot_streak(&self, sim: &mut Simulation, unit: UnitId) -> SimResult<Option<AuraId>> {
        if !self.talents.has("Hot Streak") {
            return Ok(None);
        }

        let instant = sim.add_dynamic_mod(
            unit,
            SpellModConfig::new(SpellModKind::CastTimePct)
                .with_class_mask(MAGE_SPELL_PYROBLAST)
                .with_float_value(-1.0),
        )?;
        let free = sim.add_dynamic_mod(
            unit,
            SpellModConfig::new(SpellModKind::PowerCostPct)
                .with_class_mask(MAGE_SPELL_PYROBLAST)
                .with_float_value(-1.0),
        )?;
        let hot_streak = sim.get_or_register_aura(
            unit,
            AuraConfig::new("Hot Streak")
                .with_action_id(ActionId::spell(48108))
                .with_duration(SimTime::from_secs(10))
                .on_gain(move |sim, _| {
                    sim.activate_mod(instant)?;
                    sim.activate_mod(free)
                })
                .on_expire(move |sim, _| {
                    sim.deactivate_mod(instant)?;
                    sim.deactivate_mod(free)
                }),
        )?;
        let crit_counter = sim.register_aura(
            unit,
            AuraConfig::new("Hot Streak Proc Aura")
                .with_action_id(ActionId::spell(44448))
                .with_duration(SimTime::from_secs(3600))
                .with_max_stacks(2),
        )?;
        sim.register_aura(
            unit,
            AuraConfig::new("Hot Streak Trigger")
                .on_reset(|sim, aura| sim.activate_aura(aura))
                .on_spell_hit_dealt(move |sim, _, spell, result| {
                    if !sim.spell(spell).flags.matches(HOT_STREAK_SPELLS) {
                        return Ok(());
                    }
                    if !result.did_crit() {
                        return sim.set_stacks(crit_counter, 0);
                    }
                    if sim.aura_stacks(crit_counter) == 1 || sim.proc(0.25) {
                        sim.set_stacks(crit_counter, 0)?;
                        sim.activate_or_refresh_aura(hot_streak)
                    } else {
                        sim.set_stacks(crit_counter, 1)
                    }
                }),
        )?;
        Ok(Some(hot_streak))
    }

    /// Bonus damage once the fight enters its last 35%
    fn register_molten_fury(&self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        if !self.talents.has("Molten Fury") {
            return Ok(());
        }
        let bonus = sim.add_dynamic_mod(
            unit,
            SpellModConfig::new(SpellModKind::DamageDonePct)
                .with_class_mask(MAGE_SPELLS_ALL)
                .with_float_value(0.04 * self.talents.points("Molten Fury") as f64),
        )?;
        sim.register_aura(
            unit,
            AuraConfig::new("Molten Fury")
                .with_action_id(ActionId::spell(31680))
                .on_gain(move |sim, _| sim.activate_mod(bonus))
                .on_expire(move |sim, _| sim.deactivate_mod(bonus))
                .on_reset(|sim, aura| {
                    let execute_at = sim.duration().mul_f64(0.65);
                    sim.schedule_at(execute_at, move |sim| sim.activate_aura(aura))?;
                    Ok(())
                }),
        )?;
        Ok(())
    }

    /// Restores 6% of maximum mana every 5 seconds
    fn register_mage_armor(&self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        let regen: Rc<Cell<Option<ActionHandle>>> = Rc::new(Cell::new(None));
        let on_gain = Rc::clone(&regen);
        let armor = sim.register_aura(
            unit,
            AuraConfig::new("Mage Armor")
                .with_action_id(ActionId::spell(6117))
                .on_gain(move |sim, aura| {
                    let owner = sim.aura(aura).unit();
                    let handle = sim.schedule_periodic(PeriodicOptions::every(SimTime::from_secs(5)), move |sim| {
                        let amount = 0.06 * sim.unit(owner).max_mana;
                        sim.add_mana(owner, amount);
                        Ok(())
                    })?;
                    on_gain.set(Some(handle));
                    Ok(())
                })
                .on_expire(move |sim, _| {
                    if let Some(handle) = regen.take() {
                        sim.cancel(handle);
                    }
                    Ok(())
                }),
        )?;
        sim.make_permanent(armor);
        Ok(())
    }
}

impl Agent for FireMage {
    fn initialize(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        let mage = sim.unit_mut(unit);
        mage.max_mana = BASE_MANA;
        mage.spell_crit_percent = 15.0;
        mage.spell_hit_percent = 14.0;

        self.apply_talents(sim, unit)?;
        self.spells = Some(self.register_spells(sim, unit)?);
        self.register_master_of_elements(sim, unit)?;
        self.hot_streak = self.register_hot_streak(sim, unit)?;
        self.register_molten_fury(sim, unit)?;
        self.register_mage_armor(sim, unit)
    }

    fn on_gcd_ready(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        let Some(spells) = self.spells else {
            return Ok(());
        };
        let target = sim.primary_target();

        if let Some(hot_streak) = self.hot_streak {
            if sim.is_aura_active(hot_streak) && sim.cast(spells.pyroblast, target)? {
                return sim.deactivate_aura(hot_streak);
            }
        }
        if sim.targets().len() >= 3 {
            let burning = sim
                .spell_aoe_dot(spells.flamestrike)
                .is_some_and(|dot| sim.dot_is_active(dot));
            if !burning && sim.cast(spells.flamestrike, target)? {
                return Ok(());
            }
        }
        let bomb_ticking = sim
            .spell_dot(spells.living_bomb, target)
            .is_some_and(|dot| sim.dot_is_active(dot));
        if !bomb_ticking && sim.cast(spells.living_bomb, target)? {
            return Ok(());
        }
        for spell in [spells.fire_blast, spells.fireball, spells.scorch] {
            if sim.cast(spell, target)? {
                return Ok(());
            }
        }

        // Out of mana: wait for regeneration
        let retry = sim.now() + SimTime::from_secs(1);
        sim.wait_until(unit, retry)
    }
}

/// Install the demo mage with the given talent string on the player
pub fn install(sim: &mut Simulation, talents: &Talents) -> SimResult<()> {
    let player = sim.player();
    sim.set_agent(player, Box::new(FireMage::new(talents.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation(targets: usize) -> Simulation {
        let talents = fire_mage_talents().parse(DEFAULT_TALENTS).unwrap();
        let mut sim = Simulation::new(&EncounterConfig {
            duration: SimTime::from_secs(120),
            target_count: targets,
            ..EncounterConfig::default()
        });
        install(&mut sim, &talents).unwrap();
        sim
    }

    #[test]
    fn test_default_talents_parse() {
        let talents = fire_mage_talents().parse(DEFAULT_TALENTS).unwrap();
        assert_eq!(talents.points("Arcane Focus"), 3);
        assert_eq!(talents.points("Critical Mass"), 3);
        assert!(talents.has("Hot Streak"));
        assert_eq!(talents.points("Molten Fury"), 3);
    }

    #[test]
    fn test_talent_modifiers_applied() {
        let sim = simulation(1);
        let player = sim.player();
        let scorch = sim.spell_by_label(player, "Scorch").unwrap();
        let living_bomb = sim.spell_by_label(player, "Living Bomb").unwrap();
        let flamestrike = sim.spell_by_label(player, "Flamestrike").unwrap();

        assert!(sim.current_cost(scorch).abs() < 1e-9);
        assert!((sim.spell(living_bomb).damage_multiplier - 1.15).abs() < 1e-9);
        assert!((sim.spell(living_bomb).damage_multiplier_additive - 1.03).abs() < 1e-9);
        assert_eq!(sim.effective_cast_time(flamestrike), SimTime::ZERO);
    }

    #[test]
    fn test_rotation_uses_living_bomb_and_fireball() {
        let mut sim = simulation(1);
        let result = sim.run_iteration(0).unwrap();
        let casts = |label: &str| {
            result
                .spells
                .iter()
                .find(|s| s.label == label)
                .map(|s| s.metrics.casts)
                .unwrap_or(0)
        };

        assert!(result.dps > 0.0);
        assert!(casts("Living Bomb") > 0);
        assert!(casts("Fireball") > 0);
        assert_eq!(casts("Flamestrike"), 0);
    }

    #[test]
    fn test_flamestrike_on_many_targets() {
        let mut sim = simulation(4);
        let result = sim.run_iteration(0).unwrap();
        let flamestrike = result.spells.iter().find(|s| s.label == "Flamestrike").unwrap();
        assert!(flamestrike.metrics.casts > 0);
        assert!(flamestrike.metrics.ticks > flamestrike.metrics.casts);
    }

    #[test]
    fn test_permanent_auras_active_after_reset() {
        let mut sim = simulation(1);
        sim.begin_iteration(0).unwrap();
        let player = sim.player();
        for label in ["Mage Armor", "Master of Elements", "Hot Streak Trigger"] {
            let aura = sim.aura_by_label(player, label).unwrap();
            assert!(sim.is_aura_active(aura), "{} should be active", label);
        }
        let molten_fury = sim.aura_by_label(player, "Molten Fury").unwrap();
        assert!(!sim.is_aura_active(molten_fury));
        sim.run_until(SimTime::from_secs(78)).unwrap();
        assert!(sim.is_aura_active(molten_fury));
    }
}
