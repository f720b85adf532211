//! Modifier kinds and their apply/remove functions

use crate::dot::Dot;
use crate::error::{SimError, SimResult};
use crate::spell::Spell;
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a modifier changes on the spells it matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum SpellModKind {
    /// Multiplies the damage multiplier by `1 + value`
    #[default]
    DamageDonePct = 1 << 0,
    /// Adds to the additive damage multiplier
    DamageDoneFlat = 1 << 1,
    /// Adds to the cost multiplier
    PowerCostPct = 1 << 2,
    /// Adds to the base cost
    PowerCostFlat = 1 << 3,
    /// Adds to the cooldown duration
    CooldownFlat = 1 << 4,
    /// Scales the bonus part of the crit multiplier by `1 + value`
    CritMultiplierPct = 1 << 5,
    /// Adds to the cast time multiplier
    CastTimePct = 1 << 6,
    BonusCritRating = 1 << 7,
    BonusHitRating = 1 << 8,
    /// Adds ticks to every dot of the spell
    DotNumberOfTicksFlat = 1 << 9,
    /// Adds to the GCD
    GlobalCooldownFlat = 1 << 10,
}

/// Which value a modifier kind reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueChannel {
    Int,
    Time,
    Float,
}

impl SpellModKind {
    pub const ALL: [SpellModKind; 11] = [
        SpellModKind::DamageDonePct,
        SpellModKind::DamageDoneFlat,
        SpellModKind::PowerCostPct,
        SpellModKind::PowerCostFlat,
        SpellModKind::CooldownFlat,
        SpellModKind::CritMultiplierPct,
        SpellModKind::CastTimePct,
        SpellModKind::BonusCritRating,
        SpellModKind::BonusHitRating,
        SpellModKind::DotNumberOfTicksFlat,
        SpellModKind::GlobalCooldownFlat,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Look up a kind by its bit; bits with no implementation are an error
    pub fn from_bits(bits: u32) -> SimResult<SpellModKind> {
        SpellModKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.bits() == bits)
            .ok_or(SimError::UnimplementedSpellMod(bits))
    }

    pub fn channel(self) -> ValueChannel {
        match self {
            SpellModKind::DotNumberOfTicksFlat => ValueChannel::Int,
            SpellModKind::CooldownFlat | SpellModKind::GlobalCooldownFlat => ValueChannel::Time,
            _ => ValueChannel::Float,
        }
    }
}

impl fmt::Display for SpellModKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The three value channels of a modifier; each kind reads exactly one
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellModValue {
    #[serde(default)]
    pub int_value: i64,
    #[serde(default)]
    pub time_value: SimTime,
    #[serde(default)]
    pub float_value: f64,
}

pub(crate) type SpellModFn = fn(&SpellModValue, &mut Spell, &mut [Dot]);

pub(crate) struct SpellModFunctions {
    pub apply: SpellModFn,
    pub remove: SpellModFn,
}

/// Apply/remove pair for every implemented kind
static SPELL_MOD_TABLE: [(SpellModKind, SpellModFunctions); 11] = [
    (
        SpellModKind::DamageDonePct,
        SpellModFunctions {
            apply: |v, spell, _| spell.damage_multiplier *= 1.0 + v.float_value,
            remove: |v, spell, _| spell.damage_multiplier /= 1.0 + v.float_value,
        },
    ),
    (
        SpellModKind::DamageDoneFlat,
        SpellModFunctions {
            apply: |v, spell, _| spell.damage_multiplier_additive += v.float_value,
            remove: |v, spell, _| spell.damage_multiplier_additive -= v.float_value,
        },
    ),
    (
        SpellModKind::PowerCostPct,
        SpellModFunctions {
            apply: |v, spell, _| spell.cost_multiplier += v.float_value,
            remove: |v, spell, _| spell.cost_multiplier -= v.float_value,
        },
    ),
    (
        SpellModKind::PowerCostFlat,
        SpellModFunctions {
            apply: |v, spell, _| spell.default_cast.cost += v.float_value,
            remove: |v, spell, _| spell.default_cast.cost -= v.float_value,
        },
    ),
    (
        SpellModKind::CooldownFlat,
        SpellModFunctions {
            apply: |v, spell, _| spell.cd.duration += v.time_value,
            remove: |v, spell, _| spell.cd.duration -= v.time_value,
        },
    ),
    (
        SpellModKind::CritMultiplierPct,
        SpellModFunctions {
            apply: |v, spell, _| {
                spell.crit_multiplier = 1.0 + (spell.crit_multiplier - 1.0) * (1.0 + v.float_value)
            },
            remove: |v, spell, _| {
                spell.crit_multiplier = 1.0 + (spell.crit_multiplier - 1.0) / (1.0 + v.float_value)
            },
        },
    ),
    (
        SpellModKind::CastTimePct,
        SpellModFunctions {
            apply: |v, spell, _| spell.cast_time_multiplier += v.float_value,
            remove: |v, spell, _| spell.cast_time_multiplier -= v.float_value,
        },
    ),
    (
        SpellModKind::BonusCritRating,
        SpellModFunctions {
            apply: |v, spell, _| spell.bonus_crit_rating += v.float_value,
            remove: |v, spell, _| spell.bonus_crit_rating -= v.float_value,
        },
    ),
    (
        SpellModKind::BonusHitRating,
        SpellModFunctions {
            apply: |v, spell, _| spell.bonus_hit_rating += v.float_value,
            remove: |v, spell, _| spell.bonus_hit_rating -= v.float_value,
        },
    ),
    (
        SpellModKind::DotNumberOfTicksFlat,
        SpellModFunctions {
            apply: |v, spell, dots| adjust_dot_ticks(spell, dots, v.int_value as i32),
            remove: |v, spell, dots| adjust_dot_ticks(spell, dots, -(v.int_value as i32)),
        },
    ),
    (
        SpellModKind::GlobalCooldownFlat,
        SpellModFunctions {
            apply: |v, spell, _| spell.default_cast.gcd += v.time_value,
            remove: |v, spell, _| spell.default_cast.gcd -= v.time_value,
        },
    ),
];

fn adjust_dot_ticks(spell: &Spell, dots: &mut [Dot], delta: i32) {
    for dot in spell.dots.iter().flatten().chain(spell.aoe_dot.iter()) {
        dots[dot.0].number_of_ticks += delta;
    }
}

pub(crate) fn spell_mod_functions(kind: SpellModKind) -> Option<&'static SpellModFunctions> {
    SPELL_MOD_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, functions)| functions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_functions() {
        for kind in SpellModKind::ALL {
            assert!(spell_mod_functions(kind).is_some(), "{} missing", kind);
        }
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(SpellModKind::from_bits(1 << 4).unwrap(), SpellModKind::CooldownFlat);
        assert!(matches!(
            SpellModKind::from_bits(1 << 20),
            Err(SimError::UnimplementedSpellMod(bits)) if bits == 1 << 20
        ));
    }

    #[test]
    fn test_channels() {
        assert_eq!(SpellModKind::DotNumberOfTicksFlat.channel(), ValueChannel::Int);
        assert_eq!(SpellModKind::GlobalCooldownFlat.channel(), ValueChannel::Time);
        assert_eq!(SpellModKind::CritMultiplierPct.channel(), ValueChannel::Float);
    }

    #[test]
    fn test_kind_deserializes_snake_case() {
        let kind: SpellModKind = serde_json::from_str("\"damage_done_pct\"").unwrap();
        assert_eq!(kind, SpellModKind::DamageDonePct);
    }
}
