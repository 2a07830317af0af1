//! Seeded dice rolling for `NdM±K` formulas and d20 checks
//!
//! The roller owns its RNG and the seed is explicit, so any sequence of
//! rolls can be reproduced exactly for replay and debugging.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};

/// Advantage state for a d20 roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

/// A dice formula of the form `NdM`, `NdM+K`, `NdM-K`, or a flat `K`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceFormula {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceFormula {
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// A formula with no dice, just a flat value
    pub fn flat(value: i32) -> Self {
        Self {
            count: 0,
            sides: 0,
            modifier: value,
        }
    }

    /// Average result, rounded down (used for placeholder stat blocks)
    pub fn average(&self) -> i32 {
        let dice = (self.count as i32) * (self.sides as i32 + 1) / 2;
        dice + self.modifier
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.modifier);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier.cmp(&0) {
            std::cmp::Ordering::Greater => write!(f, "+{}", self.modifier),
            std::cmp::Ordering::Less => write!(f, "{}", self.modifier),
            std::cmp::Ordering::Equal => Ok(()),
        }
    }
}

impl FromStr for DiceFormula {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidFormula(s.into()));
        }

        // Flat value with no dice component
        if let Ok(value) = text.parse::<i32>() {
            return Ok(Self::flat(value));
        }

        let (count_part, rest) = text
            .split_once(['d', 'D'])
            .ok_or_else(|| EngineError::InvalidFormula(s.into()))?;

        let count: u32 = if count_part.is_empty() {
            1
        } else {
            count_part
                .parse()
                .map_err(|_| EngineError::InvalidFormula(s.into()))?
        };

        let (sides_part, modifier) = if let Some((sides, bonus)) = rest.split_once('+') {
            let bonus: i32 = bonus
                .trim()
                .parse()
                .map_err(|_| EngineError::InvalidFormula(s.into()))?;
            (sides, bonus)
        } else if let Some((sides, penalty)) = rest.split_once('-') {
            let penalty: i32 = penalty
                .trim()
                .parse()
                .map_err(|_| EngineError::InvalidFormula(s.into()))?;
            (sides, -penalty)
        } else {
            (rest, 0)
        };

        let sides: u32 = sides_part
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidFormula(s.into()))?;
        if count == 0 || sides == 0 {
            return Err(EngineError::InvalidFormula(s.into()));
        }

        Ok(Self {
            count,
            sides,
            modifier,
        })
    }
}

/// Result of rolling a formula, with the dice kept separate from the
/// flat modifier so criticals can double only the rolled part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollBreakdown {
    pub rolls: Vec<u32>,
    pub dice_total: i32,
    pub modifier: i32,
    pub total: i32,
}

/// Result of a d20 roll
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct D20Roll {
    /// The die face that counts after advantage/disadvantage selection
    pub natural: u32,
    /// The discarded second roll, when one was made
    pub discarded: Option<u32>,
}

impl D20Roll {
    pub fn is_natural_20(&self) -> bool {
        self.natural == 20
    }
}

/// Dice roller with an explicit, injectable seed
#[derive(Debug, Clone)]
pub struct DiceRoller {
    rng: ChaCha8Rng,
}

impl DiceRoller {
    /// Deterministic roller for replays and tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Roller seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Roll a formula once
    pub fn roll(&mut self, formula: &DiceFormula) -> RollBreakdown {
        let mut rolls = Vec::with_capacity(formula.count as usize);
        let mut dice_total = 0i32;
        for _ in 0..formula.count {
            let face = self.rng.gen_range(1..=formula.sides);
            dice_total += face as i32;
            rolls.push(face);
        }
        RollBreakdown {
            rolls,
            dice_total,
            modifier: formula.modifier,
            total: dice_total + formula.modifier,
        }
    }

    /// Roll a d20, taking the max of two rolls on advantage and the min
    /// on disadvantage
    pub fn d20(&mut self, advantage: Advantage) -> D20Roll {
        let first = self.rng.gen_range(1..=20u32);
        match advantage {
            Advantage::Normal => D20Roll {
                natural: first,
                discarded: None,
            },
            Advantage::Advantage => {
                let second = self.rng.gen_range(1..=20u32);
                D20Roll {
                    natural: first.max(second),
                    discarded: Some(first.min(second)),
                }
            }
            Advantage::Disadvantage => {
                let second = self.rng.gen_range(1..=20u32);
                D20Roll {
                    natural: first.min(second),
                    discarded: Some(first.max(second)),
                }
            }
        }
    }

    /// Pick one element of a non-empty slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.gen_range(0..items.len())]
    }

    /// True with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }
}
