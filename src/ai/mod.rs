//! Combat AI: intent selection driven by a creature's intelligence
//!
//! All current tiers share nearest-target selection; the tier enum is
//! the extension point for weak-target and caster-priority strategies.
//! The AI only picks intents; movement paths and attack rolls are
//! resolved by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::core::types::CombatantId;
use crate::encounter::state::CombatState;
use crate::engine::combatant::Combatant;

/// How cleverly a creature fights, derived from its INT score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntelligenceTier {
    Feral,
    Beast,
    Cunning,
    Tactical,
    Strategic,
}

impl IntelligenceTier {
    /// Tier thresholds are inclusive upper bounds
    pub fn from_int(score: i32) -> Self {
        match score {
            i32::MIN..=2 => IntelligenceTier::Feral,
            3..=6 => IntelligenceTier::Beast,
            7..=12 => IntelligenceTier::Cunning,
            13..=15 => IntelligenceTier::Tactical,
            _ => IntelligenceTier::Strategic,
        }
    }
}

/// What a creature intends to do with its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionIntent {
    /// Strike a target already within reach
    Attack { target: CombatantId },
    /// Close distance; the orchestrator computes the path
    MoveToward { target: CombatantId },
    /// Fall back away from a threat
    Retreat { from: CombatantId },
    /// Nothing worth doing
    Hold,
}

/// Fraction of max HP below which smarter creatures disengage
const RETREAT_HP_FRACTION: f64 = 0.25;

/// Choose one action for the acting creature
///
/// Opponents are the living combatants on the other side: enemies
/// target non-enemies and vice versa. Target selection is nearest by
/// grid distance for every tier; distance needs no grid, so the
/// absent-grid fallback is the same nearest-by-distance choice.
pub fn decide_action(actor: &Combatant, state: &CombatState) -> ActionIntent {
    let opponents: Vec<&Combatant> = state
        .combatants
        .iter()
        .filter(|c| c.is_alive() && c.kind.is_hostile() != actor.kind.is_hostile())
        .collect();

    let Some(nearest) = opponents
        .iter()
        .min_by_key(|c| actor.position.distance(&c.position))
    else {
        return ActionIntent::Hold;
    };

    let tier = IntelligenceTier::from_int(actor.stats.intelligence);
    let hp_fraction = actor.hp.current as f64 / actor.hp.max as f64;
    if tier >= IntelligenceTier::Cunning && hp_fraction < RETREAT_HP_FRACTION {
        return ActionIntent::Retreat { from: nearest.id };
    }

    let distance = actor.position.distance(&nearest.position);
    let reach = if actor.tactical.is_ranged {
        actor.tactical.range
    } else {
        actor.tactical.reach
    };

    if distance <= reach {
        ActionIntent::Attack { target: nearest.id }
    } else {
        ActionIntent::MoveToward { target: nearest.id }
    }
}
