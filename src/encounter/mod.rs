//! Turn orchestration: combat state, player commands, the turn state
//! machine, and post-combat settlement

pub mod commands;
pub mod orchestrator;
pub mod settlement;
pub mod state;

pub use commands::{CommandOutcome, MoveMode, PlayerCommand};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use settlement::{EncounterOutcome, LootDrop};
pub use state::CombatState;
