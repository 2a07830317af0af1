//! The authoritative state of one encounter
//!
//! Exactly one combatant is current at any time, and the orchestrator
//! is the only writer. The serialized form of this struct is the de
//! facto save-file schema.

use serde::{Deserialize, Serialize};

use crate::core::types::{CombatantId, Round};
use crate::engine::combatant::Combatant;
use crate::engine::resolution::RollDetails;
use crate::grid::map::CombatGrid;
use crate::grid::position::GridPosition;

/// Typed combat events, kept alongside the flavored log lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEventKind {
    EncounterStarted,
    TurnStarted { combatant: CombatantId },
    ActionResolved { combatant: CombatantId },
    StatusExpired { combatant: CombatantId },
    ConcentrationBroken { combatant: CombatantId },
    SummonDespawned { combatant: CombatantId },
    CombatantDowned { combatant: CombatantId },
    EncounterEnded { victory: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatEvent {
    pub round: Round,
    pub kind: CombatEventKind,
    pub description: String,
}

/// Whose turn it is, broadcast to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBanner {
    pub combatant: CombatantId,
    pub name: String,
    pub is_player: bool,
}

/// Aggregate state for one encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub round: Round,
    pub current_turn_index: usize,
    /// Sorted by initiative descending, dexterity descending on ties
    pub combatants: Vec<Combatant>,
    pub grid: Option<CombatGrid>,
    /// Flavored log lines for the narrator and the UI
    pub logs: Vec<String>,
    pub events: Vec<CombatEvent>,
    pub selected_target_id: Option<CombatantId>,
    pub last_roll: Option<RollDetails>,
    pub active_banner: Option<ActiveBanner>,
    /// Transient per-turn action log, cleared at every turn start
    pub turn_actions: Vec<String>,
}

impl CombatState {
    /// Build a state from combatants with initiative already rolled
    pub fn new(combatants: Vec<Combatant>, grid: Option<CombatGrid>) -> Self {
        let mut state = Self {
            round: 1,
            current_turn_index: 0,
            combatants,
            grid,
            logs: Vec::new(),
            events: Vec::new(),
            selected_target_id: None,
            last_roll: None,
            active_banner: None,
            turn_actions: Vec::new(),
        };
        state.sort_turn_order();
        state
    }

    /// Initiative descending, dexterity score descending on ties
    pub fn sort_turn_order(&mut self) {
        self.combatants.sort_by(|a, b| {
            b.initiative
                .cmp(&a.initiative)
                .then(b.dexterity().cmp(&a.dexterity()))
        });
    }

    pub fn current(&self) -> Option<&Combatant> {
        self.combatants.get(self.current_turn_index)
    }

    pub fn current_mut(&mut self) -> Option<&mut Combatant> {
        self.combatants.get_mut(self.current_turn_index)
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    /// Living combatants on one side
    pub fn living_count(&self, hostile: bool) -> usize {
        self.combatants
            .iter()
            .filter(|c| c.is_alive() && c.kind.is_hostile() == hostile)
            .count()
    }

    /// Some(true) when the players have won, Some(false) when they have
    /// lost, None while both sides still stand
    pub fn side_defeated(&self) -> Option<bool> {
        if self.living_count(true) == 0 {
            Some(true)
        } else if self.living_count(false) == 0 {
            Some(false)
        } else {
            None
        }
    }

    /// Cells held by living combatants, optionally excluding one
    pub fn occupied_positions(&self, exclude: Option<CombatantId>) -> Vec<GridPosition> {
        self.combatants
            .iter()
            .filter(|c| c.is_alive() && Some(c.id) != exclude)
            .map(|c| c.position)
            .collect()
    }

    /// Remove a combatant (despawned summon), keeping the turn index on
    /// the same actor
    pub fn remove_combatant(&mut self, id: CombatantId) {
        if let Some(index) = self.combatants.iter().position(|c| c.id == id) {
            self.combatants.remove(index);
            if index < self.current_turn_index {
                self.current_turn_index -= 1;
            }
            if self.current_turn_index >= self.combatants.len() {
                self.current_turn_index = 0;
            }
        }
    }

    /// Advance to the next living combatant, bumping the round when the
    /// order wraps
    pub fn advance_turn(&mut self) {
        if self.combatants.iter().filter(|c| c.is_alive()).count() == 0 {
            return;
        }
        let len = self.combatants.len();
        let mut index = self.current_turn_index;
        loop {
            index += 1;
            if index >= len {
                index = 0;
                self.round += 1;
            }
            if self.combatants[index].is_alive() {
                break;
            }
        }
        self.current_turn_index = index;
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(round = self.round, "{line}");
        self.logs.push(line);
    }

    pub fn push_event(&mut self, kind: CombatEventKind, description: impl Into<String>) {
        self.events.push(CombatEvent {
            round: self.round,
            kind,
            description: description.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combatant::CombatantKind;
    use crate::mechanics::AbilityScores;

    fn named(name: &str, kind: CombatantKind, initiative: i32, dex: i32) -> Combatant {
        let mut c = Combatant::new(
            name,
            kind,
            10,
            12,
            AbilityScores::new(10, dex, 10, 10, 10, 10),
        )
        .unwrap();
        c.initiative = initiative;
        c
    }

    #[test]
    fn test_sort_initiative_descending() {
        let state = CombatState::new(
            vec![
                named("Low", CombatantKind::Enemy, 5, 10),
                named("High", CombatantKind::Player, 18, 10),
                named("Mid", CombatantKind::Enemy, 12, 10),
            ],
            None,
        );
        let names: Vec<&str> = state.combatants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid", "Low"]);
    }

    #[test]
    fn test_sort_dexterity_breaks_ties() {
        // A and B both at initiative 18; B's DEX 14 beats A's 10
        let state = CombatState::new(
            vec![
                named("A", CombatantKind::Player, 18, 10),
                named("B", CombatantKind::Enemy, 18, 14),
            ],
            None,
        );
        assert_eq!(state.combatants[0].name, "B");
        assert_eq!(state.combatants[1].name, "A");
    }

    #[test]
    fn test_advance_skips_downed() {
        let mut state = CombatState::new(
            vec![
                named("First", CombatantKind::Player, 20, 10),
                named("Downed", CombatantKind::Enemy, 15, 10),
                named("Third", CombatantKind::Enemy, 10, 10),
            ],
            None,
        );
        state.combatants[1].hp.current = 0;
        state.advance_turn();
        assert_eq!(state.current().unwrap().name, "Third");
    }

    #[test]
    fn test_advance_wraps_and_bumps_round() {
        let mut state = CombatState::new(
            vec![
                named("A", CombatantKind::Player, 20, 10),
                named("B", CombatantKind::Enemy, 10, 10),
            ],
            None,
        );
        assert_eq!(state.round, 1);
        state.advance_turn();
        state.advance_turn();
        assert_eq!(state.current().unwrap().name, "A");
        assert_eq!(state.round, 2);
    }

    #[test]
    fn test_side_defeated() {
        let mut state = CombatState::new(
            vec![
                named("Hero", CombatantKind::Player, 20, 10),
                named("Orc", CombatantKind::Enemy, 10, 10),
            ],
            None,
        );
        assert_eq!(state.side_defeated(), None);
        state.combatants[1].hp.current = 0;
        assert_eq!(state.side_defeated(), Some(true));
        state.combatants[1].hp.current = 5;
        state.combatants[0].hp.current = 0;
        assert_eq!(state.side_defeated(), Some(false));
    }

    #[test]
    fn test_remove_before_current_keeps_actor() {
        let mut state = CombatState::new(
            vec![
                named("A", CombatantKind::Player, 20, 10),
                named("B", CombatantKind::Summon, 15, 10),
                named("C", CombatantKind::Enemy, 10, 10),
            ],
            None,
        );
        state.current_turn_index = 2;
        let summon_id = state.combatants[1].id;
        state.remove_combatant(summon_id);
        assert_eq!(state.current().unwrap().name, "C");
    }

    #[test]
    fn test_serde_roundtrip_preserves_order_and_positions() {
        let mut state = CombatState::new(
            vec![
                named("A", CombatantKind::Player, 18, 10),
                named("B", CombatantKind::Enemy, 18, 14),
            ],
            Some(crate::grid::generator::generate(
                crate::grid::generator::Biome::Ruins,
                "roundtrip",
            )),
        );
        state.combatants[0].position = GridPosition::new(3, 9);
        state.combatants[0].movement_remaining = 2;
        state.push_log("test line");

        let json = serde_json::to_string(&state).unwrap();
        let restored: CombatState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.combatants.len(), state.combatants.len());
        for (a, b) in state.combatants.iter().zip(&restored.combatants) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.name, b.name);
            assert_eq!(a.position, b.position);
            assert_eq!(a.movement_remaining, b.movement_remaining);
            assert_eq!(a.hp.current, b.hp.current);
        }
        assert_eq!(restored.logs, state.logs);
        assert_eq!(
            restored.grid.as_ref().unwrap().features.len(),
            state.grid.as_ref().unwrap().features.len()
        );
    }
}
