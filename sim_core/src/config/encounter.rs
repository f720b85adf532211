//! Encounter configuration loading

use super::{CombatConstants, ConfigError};
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one simulated encounter batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Nominal fight length
    #[serde(default = "default_duration")]
    pub duration: SimTime,
    /// Each iteration's length is drawn uniformly from `duration ± duration_variation`
    #[serde(default)]
    pub duration_variation: SimTime,
    /// Number of independent iterations to average over
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Base seed; iteration `i` derives its own seed from this
    #[serde(default)]
    pub seed: u64,
    /// Number of enemy targets
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    /// Run iterations on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub constants: CombatConstants,
}

fn default_duration() -> SimTime {
    SimTime::from_secs(180)
}

fn default_iterations() -> u32 {
    1000
}

fn default_target_count() -> usize {
    1
}

fn default_parallel() -> bool {
    true
}

impl Default for EncounterConfig {
    fn default() -> Self {
        EncounterConfig {
            duration: default_duration(),
            duration_variation: SimTime::ZERO,
            iterations: default_iterations(),
            seed: 0,
            target_count: default_target_count(),
            parallel: default_parallel(),
            constants: CombatConstants::default(),
        }
    }
}

impl EncounterConfig {
    /// Check the settings for values no encounter can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration <= SimTime::ZERO || self.duration.is_never() {
            return Err(ConfigError::ValidationError(format!(
                "encounter duration must be positive and finite, got {}",
                self.duration
            )));
        }
        if self.duration_variation.is_negative() || self.duration_variation >= self.duration {
            return Err(ConfigError::ValidationError(format!(
                "duration variation {} must be in [0, {})",
                self.duration_variation, self.duration
            )));
        }
        if self.iterations == 0 {
            return Err(ConfigError::ValidationError(
                "iterations must be at least 1".to_string(),
            ));
        }
        if self.target_count == 0 {
            return Err(ConfigError::ValidationError(
                "an encounter needs at least one target".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.constants.base_spell_miss) {
            return Err(ConfigError::ValidationError(format!(
                "base spell miss {} must be within [0, 1]",
                self.constants.base_spell_miss
            )));
        }
        Ok(())
    }
}

/// Load an encounter configuration from a TOML file
pub fn load_encounter_config(path: &Path) -> Result<EncounterConfig, ConfigError> {
    let config: EncounterConfig = super::load_toml(path)?;
    config.validate()?;
    Ok(config)
}

/// Load an encounter configuration from a TOML string
pub fn parse_encounter_config(content: &str) -> Result<EncounterConfig, ConfigError> {
    let config: EncounterConfig = super::parse_toml(content)?;
    config.validate()?;
    Ok(config)
}
