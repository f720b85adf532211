//! Core types shared by every simulation module

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, BitOr, Mul, Neg, Sub, SubAssign};

/// Signed span of simulated time with nanosecond resolution
///
/// Used both for durations (cooldowns, cast times, aura lengths) and for
/// absolute timestamps measured from the start of the encounter. Arithmetic
/// saturates, so `NEVER_EXPIRES` survives additions.
///
/// Serialized as floating-point seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(i64);

/// Sentinel duration for auras that never expire on their own
pub const NEVER_EXPIRES: SimTime = SimTime(i64::MAX);

const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SEC: i64 = 1_000_000_000;

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        SimTime(nanos)
    }

    pub const fn from_millis(millis: i64) -> Self {
        SimTime(millis * NANOS_PER_MILLI)
    }

    pub const fn from_secs(secs: i64) -> Self {
        SimTime(secs * NANOS_PER_SEC)
    }

    /// Convert from floating-point seconds, rounding to the nearest nanosecond
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs >= i64::MAX as f64 / NANOS_PER_SEC as f64 {
            return NEVER_EXPIRES;
        }
        SimTime((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    pub const fn is_never(self) -> bool {
        self.0 == i64::MAX
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Clamp negative spans to zero (e.g. a cast time pushed below zero by modifiers)
    pub fn max_zero(self) -> Self {
        if self.0 < 0 {
            SimTime::ZERO
        } else {
            self
        }
    }

    /// Scale by a multiplier, rounding to the nearest nanosecond
    pub fn mul_f64(self, factor: f64) -> Self {
        if self.is_never() {
            return self;
        }
        SimTime((self.0 as f64 * factor).round() as i64)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for SimTime {
    fn sub_assign(&mut self, rhs: SimTime) {
        *self = *self - rhs;
    }
}

impl Neg for SimTime {
    type Output = SimTime;

    fn neg(self) -> SimTime {
        SimTime(self.0.saturating_neg())
    }
}

impl Mul<i64> for SimTime {
    type Output = SimTime;

    fn mul(self, rhs: i64) -> SimTime {
        SimTime(self.0.saturating_mul(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "never")
        } else {
            write!(f, "{:.3}s", self.as_secs_f64())
        }
    }
}

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(SimTime::from_secs_f64(secs))
    }
}

/// Identifies the game action a spell or aura represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId {
    #[serde(default)]
    pub spell_id: i32,
    #[serde(default)]
    pub item_id: i32,
    /// Distinguishes multiple spells sharing an id (e.g. a cast and its overload)
    #[serde(default)]
    pub tag: i32,
}

impl ActionId {
    pub const fn spell(spell_id: i32) -> Self {
        ActionId {
            spell_id,
            item_id: 0,
            tag: 0,
        }
    }

    pub const fn with_tag(self, tag: i32) -> Self {
        ActionId { tag, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.spell_id == 0 && self.item_id == 0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spell_id != 0 {
            write!(f, "SpellID({})", self.spell_id)?;
        } else {
            write!(f, "ItemID({})", self.item_id)?;
        }
        if self.tag != 0 {
            write!(f, "[{}]", self.tag)?;
        }
        Ok(())
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position in the owning arena (registration order)
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

handle!(
    /// Handle to a unit (the player character or an encounter target)
    UnitId
);
handle!(
    /// Handle to a registered spell
    SpellId
);
handle!(
    /// Handle to a registered aura
    AuraId
);
handle!(
    /// Handle to a spell modifier
    ModId
);
handle!(
    /// Handle to a damage-over-time instance
    DotId
);

macro_rules! mask {
    ($(#[$meta:meta])* $name:ident($repr:ty) { $($(#[$cmeta:meta])* $konst:ident = $value:expr;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl $name {
            pub const NONE: $name = $name(0);
            $($(#[$cmeta])* pub const $konst: $name = $name($value);)*

            /// True if the two masks share any bit
            pub fn matches(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

mask!(
    /// Magic school of a spell, combinable for multi-school spells
    SpellSchool(u8) {
        PHYSICAL = 1 << 0;
        ARCANE = 1 << 1;
        FIRE = 1 << 2;
        FROST = 1 << 3;
        HOLY = 1 << 4;
        NATURE = 1 << 5;
        SHADOW = 1 << 6;
    }
);

mask!(
    /// How a spell's hits are classified for proc purposes
    ProcMask(u32) {
        MELEE_MH_AUTO = 1 << 0;
        MELEE_OH_AUTO = 1 << 1;
        MELEE_MH_SPECIAL = 1 << 2;
        MELEE_OH_SPECIAL = 1 << 3;
        RANGED_AUTO = 1 << 4;
        RANGED_SPECIAL = 1 << 5;
        SPELL_DAMAGE = 1 << 6;
        SPELL_HEALING = 1 << 7;
        PERIODIC_DAMAGE = 1 << 8;
        MELEE_OR_RANGED = 0b11_1111;
    }
);

mask!(
    /// Behavioural flags on a spell
    SpellFlags(u64) {
        /// Exempt from every spell modifier
        NO_SPELL_MODS = 1 << 0;
        /// Selectable by rotation logic
        APL = 1 << 1;
        /// Does not trigger the on-cast-complete observers
        NO_ON_CAST_COMPLETE = 1 << 2;
        /// Does not record metrics
        NO_METRICS = 1 << 3;
        AGENT_RESERVED_1 = 1 << 32;
        AGENT_RESERVED_2 = 1 << 33;
        AGENT_RESERVED_3 = 1 << 34;
        AGENT_RESERVED_4 = 1 << 35;
    }
);
