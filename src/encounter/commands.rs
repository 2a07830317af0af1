//! The player command surface
//!
//! Commands arrive already structured (an external intent parser owns
//! the natural-language side). Invalid commands come back as a
//! user-visible rejection without mutating state.

use serde::{Deserialize, Serialize};

use crate::core::types::CombatantId;
use crate::encounter::settlement::EncounterOutcome;
use crate::engine::resolution::ActionResult;

/// Movement mode for a MOVE command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveMode {
    #[default]
    Normal,
    /// Spend the action to double this turn's movement
    Dash,
}

/// A command issued for the current player actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerCommand {
    Attack,
    Dodge,
    Disengage,
    Hide,
    UseItem { item: String },
    Move { x: i32, y: i32, mode: MoveMode },
    Target { id: CombatantId },
    EndTurn,
}

/// What handling a command produced
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// The command resolved; an attack carries its result
    Resolved { result: Option<ActionResult> },
    /// The command was refused; state is unchanged
    Rejected { reason: String },
    /// The player ended their turn
    TurnEnded,
    /// The command ended the encounter
    CombatEnded(EncounterOutcome),
}
