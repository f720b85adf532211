//! Combat constants configuration

use crate::types::SimTime;
use serde::{Deserialize, Serialize};

/// Tunable combat constants read by the outcome roll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConstants {
    /// Rating needed for one percent of crit chance
    #[serde(default = "default_crit_rating_per_percent")]
    pub crit_rating_per_percent: f64,
    /// Rating needed for one percent of hit chance
    #[serde(default = "default_hit_rating_per_percent")]
    pub hit_rating_per_percent: f64,
    /// Chance (0.0 to 1.0) for a spell to miss before any hit bonus
    #[serde(default = "default_base_spell_miss")]
    pub base_spell_miss: f64,
    /// GCD used by spells that ask for the default
    #[serde(default = "default_gcd")]
    pub default_gcd: SimTime,
    /// Floor for a GCD reduced by modifiers
    #[serde(default = "default_min_gcd")]
    pub min_gcd: SimTime,
    /// Crit damage multiplier of a spell with no crit talents (1.5 = 150%)
    #[serde(default = "default_spell_crit_multiplier")]
    pub default_spell_crit_multiplier: f64,
}

impl Default for CombatConstants {
    fn default() -> Self {
        CombatConstants {
            crit_rating_per_percent: default_crit_rating_per_percent(),
            hit_rating_per_percent: default_hit_rating_per_percent(),
            base_spell_miss: default_base_spell_miss(),
            default_gcd: default_gcd(),
            min_gcd: default_min_gcd(),
            default_spell_crit_multiplier: default_spell_crit_multiplier(),
        }
    }
}

impl CombatConstants {
    /// Convert a crit chance in percent into rating
    pub fn crit_rating(&self, percent: f64) -> f64 {
        percent * self.crit_rating_per_percent
    }
}

fn default_crit_rating_per_percent() -> f64 {
    179.28
}
fn default_hit_rating_per_percent() -> f64 {
    102.45
}
fn default_base_spell_miss() -> f64 {
    0.17
}
fn default_gcd() -> SimTime {
    SimTime::from_millis(1500)
}
fn default_min_gcd() -> SimTime {
    SimTime::from_secs(1)
}
fn default_spell_crit_multiplier() -> f64 {
    1.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let constants = CombatConstants::default();
        assert!((constants.base_spell_miss - 0.17).abs() < f64::EPSILON);
        assert_eq!(constants.default_gcd, SimTime::from_millis(1500));
        assert!((constants.crit_rating(5.0) - 896.4).abs() < 1e-9);
    }

    #[test]
    fn test_parse_partial_constants() {
        let toml = r#"
base_spell_miss = 0.04
default_gcd = 1
"#;

        let constants: CombatConstants = toml::from_str(toml).unwrap();
        assert!((constants.base_spell_miss - 0.04).abs() < f64::EPSILON);
        assert_eq!(constants.default_gcd, SimTime::from_secs(1));
        assert!((constants.default_spell_crit_multiplier - 1.5).abs() < f64::EPSILON);
    }
}
