//! Prelude module for convenient imports
//!
//! ```rust
//! use sim_core::prelude::*;
//! ```

// Core types
pub use crate::types::{ActionId, AuraId, DotId, ModId, ProcMask, SimTime, SpellFlags, SpellId, SpellSchool, UnitId, NEVER_EXPIRES};
pub use crate::error::{SimError, SimResult};

// Simulation
pub use crate::sim::{ActionHandle, PeriodicOptions, Simulation};
pub use crate::unit::Agent;

// Content building blocks
pub use crate::aura::AuraConfig;
pub use crate::dot::DotConfig;
pub use crate::spell::{CastConfig, Outcome, SpellConfig, SpellResult};
pub use crate::spell_mod::{SpellModConfig, SpellModKind};

// Config
pub use crate::config::{CombatConstants, EncounterConfig};
