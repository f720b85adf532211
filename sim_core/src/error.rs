//! Fatal configuration errors
//!
//! Everything here is a content-author mistake. None of these are retried:
//! an error raised during setup or inside the timed loop aborts the batch.

use crate::config::ConfigError;
use crate::types::SimTime;
use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("SpellMod kind {0:#x} not implemented")]
    UnimplementedSpellMod(u32),
    #[error("invalid SpellMod {kind}: {reason}")]
    InvalidSpellMod { kind: String, reason: String },
    #[error("aura '{label}' is already registered on unit '{unit}'")]
    DuplicateAura { unit: String, label: String },
    #[error("invalid aura '{label}': {reason}")]
    InvalidAura { label: String, reason: String },
    #[error("invalid spell '{label}': {reason}")]
    InvalidSpell { label: String, reason: String },
    #[error("cannot schedule an action at {at} before the current time {now}")]
    ScheduledInPast { at: SimTime, now: SimTime },
    #[error("periodic action period must be positive, got {0}")]
    InvalidPeriod(SimTime),
    #[error("static SpellMod {0} cannot be deactivated")]
    StaticModDeactivated(String),
    #[error("simulation worker setup failed: {0}")]
    WorkerSetup(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
