//! Talent strings decoded through an explicit per-class schema
//!
//! A talent string holds one digit per talent slot, tree by tree, with trees
//! separated by `-`. Trailing zeros of a tree may be omitted, and so may
//! trailing trees: `"-0322"` spends nothing in tree one and puts 0, 3, 2, 2
//! into the first four slots of tree two.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One talent position in a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentSlot {
    pub name: String,
    pub max_points: u8,
}

impl TalentSlot {
    pub fn new(name: impl Into<String>, max_points: u8) -> Self {
        TalentSlot {
            name: name.into(),
            max_points,
        }
    }
}

/// Slot layout of each talent tree of a class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentSchema {
    pub trees: Vec<Vec<TalentSlot>>,
}

impl TalentSchema {
    pub fn new(trees: Vec<Vec<TalentSlot>>) -> Self {
        TalentSchema { trees }
    }

    /// Decode a talent string into points per talent name
    pub fn parse(&self, input: &str) -> Result<Talents, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTalents {
            input: input.to_string(),
            reason,
        };

        let mut points = BTreeMap::new();
        if input.is_empty() {
            return Ok(Talents { points });
        }

        let trees: Vec<&str> = input.split('-').collect();
        if trees.len() > self.trees.len() {
            return Err(invalid(format!(
                "{} trees given, class has {}",
                trees.len(),
                self.trees.len()
            )));
        }

        for (tree_index, (digits, slots)) in trees.iter().zip(&self.trees).enumerate() {
            if digits.len() > slots.len() {
                return Err(invalid(format!(
                    "tree {} has {} talents, got {} digits",
                    tree_index + 1,
                    slots.len(),
                    digits.len()
                )));
            }
            for (ch, slot) in digits.chars().zip(slots) {
                let value = ch
                    .to_digit(10)
                    .ok_or_else(|| invalid(format!("'{}' is not a digit", ch)))? as u8;
                if value > slot.max_points {
                    return Err(invalid(format!(
                        "{} has {} ranks, got {}",
                        slot.name, slot.max_points, value
                    )));
                }
                if value > 0 {
                    points.insert(slot.name.clone(), value);
                }
            }
        }
        Ok(Talents { points })
    }
}

/// Points spent per talent; talents without points are absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Talents {
    points: BTreeMap<String, u8>,
}

impl Talents {
    pub fn points(&self, name: &str) -> u8 {
        self.points.get(name).copied().unwrap_or(0)
    }

    pub fn has(&self, name: &str) -> bool {
        self.points(name) > 0
    }

    pub fn total_points(&self) -> u32 {
        self.points.values().map(|&p| p as u32).sum()
    }
}
