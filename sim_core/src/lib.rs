//! sim_core - Deterministic discrete-event combat simulation
//!
//! This library provides:
//! - Simulation: clock, time-ordered action queue and seeded RNG
//! - Auras: named, timed, stackable effects with lifecycle callbacks
//! - Spell modifiers: reversible deltas matched to spells by mask
//! - Spells and dots: casting, outcome rolls and periodic damage
//! - Runner: many iterations reduced into DPS statistics

pub mod aura;
pub mod config;
pub mod dot;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod sim;
pub mod spell;
pub mod spell_mod;
pub mod talents;
pub mod types;
pub mod unit;

// Re-export core types for convenience
pub use aura::{Aura, AuraConfig};
pub use config::{CombatConstants, ConfigError, EncounterConfig};
pub use dot::{Dot, DotConfig};
pub use error::{SimError, SimResult};
pub use metrics::{BatchResult, DistributionMetrics, IterationResult, SpellMetrics, SpellReport};
pub use sim::{run_batch, seed_for_iteration, ActionHandle, PeriodicOptions, Simulation};
pub use spell::{CastConfig, HitOutcome, Outcome, Spell, SpellConfig, SpellResult};
pub use spell_mod::{SpellMod, SpellModConfig, SpellModKind, SpellModValue};
pub use talents::{TalentSchema, TalentSlot, Talents};
pub use types::{
    ActionId, AuraId, DotId, ModId, ProcMask, SimTime, SpellFlags, SpellId, SpellSchool, UnitId, NEVER_EXPIRES,
};
pub use unit::{Agent, Unit, UnitKind};
