//! Post-combat settlement: XP, loot, and the outcome handed back to the
//! surrounding game
//!
//! The orchestrator computes everything here the moment a side is wiped
//! out; syncing survivors into persistent character records and the
//! mode transition itself belong to the caller.

use serde::{Deserialize, Serialize};

use crate::core::config::EncounterConfig;
use crate::core::types::Round;
use crate::dice::{DiceFormula, DiceRoller};
use crate::encounter::state::CombatState;
use crate::engine::combatant::Combatant;

/// One defeated monster's drop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootDrop {
    pub source: String,
    pub gold: u32,
    pub item: Option<String>,
}

/// Everything the surrounding game needs after an encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterOutcome {
    pub victory: bool,
    pub rounds: Round,
    /// World time consumed, proportional to rounds fought
    pub elapsed_seconds: u32,
    pub xp_awarded: u32,
    pub loot: Vec<LootDrop>,
    /// Living party members with their end-of-combat vitals, for the
    /// caller to sync into persistent records
    pub survivors: Vec<Combatant>,
    pub logs: Vec<String>,
}

/// XP for a single monster by challenge rating
pub fn xp_for_cr(cr: f32) -> u32 {
    const TABLE: &[(f32, u32)] = &[
        (0.0, 10),
        (0.125, 25),
        (0.25, 50),
        (0.5, 100),
        (1.0, 200),
        (2.0, 450),
        (3.0, 700),
        (4.0, 1100),
        (5.0, 1800),
    ];
    TABLE
        .iter()
        .rev()
        .find(|(threshold, _)| cr >= *threshold)
        .map(|(_, xp)| *xp)
        .unwrap_or(10)
}

const LOOT_ITEMS: &[&str] = &[
    "healing potion",
    "silvered dagger",
    "bundle of arrows",
    "worn map fragment",
    "traveler's cloak",
];

/// Chance a defeated monster drops an item on top of its coin
const ITEM_DROP_CHANCE: f64 = 0.15;

/// Roll the drop for one defeated monster
pub fn roll_loot(dice: &mut DiceRoller, source: &str, cr: f32) -> LootDrop {
    let base = dice.roll(&DiceFormula::new(2, 6, 0)).total.max(0) as u32;
    let scale = ((cr * 4.0).ceil() as u32).max(1);
    let item = if dice.chance(ITEM_DROP_CHANCE) {
        Some((*dice.pick(LOOT_ITEMS)).to_string())
    } else {
        None
    };
    LootDrop {
        source: source.into(),
        gold: base * scale,
        item,
    }
}

/// Assemble the outcome from a finished encounter's state
pub fn build_outcome(
    state: &CombatState,
    dice: &mut DiceRoller,
    config: &EncounterConfig,
    victory: bool,
) -> EncounterOutcome {
    let defeated: Vec<&Combatant> = state
        .combatants
        .iter()
        .filter(|c| c.kind.is_hostile() && !c.is_alive())
        .collect();

    let (xp_awarded, loot) = if victory {
        let raw_xp: u32 = defeated
            .iter()
            .map(|c| xp_for_cr(c.challenge_rating.unwrap_or(0.0)))
            .sum();
        let xp = (raw_xp as f32 * config.xp_difficulty_multiplier).round() as u32;
        let loot = defeated
            .iter()
            .map(|c| roll_loot(dice, &c.name, c.challenge_rating.unwrap_or(0.0)))
            .collect();
        (xp, loot)
    } else {
        (0, Vec::new())
    };

    let survivors = state
        .combatants
        .iter()
        .filter(|c| !c.kind.is_hostile() && c.is_alive())
        .cloned()
        .collect();

    EncounterOutcome {
        victory,
        rounds: state.round,
        elapsed_seconds: state.round * config.round_seconds,
        xp_awarded,
        loot,
        survivors,
        logs: state.logs.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::state::CombatState;
    use crate::engine::combatant::CombatantKind;
    use crate::mechanics::AbilityScores;

    #[test]
    fn test_xp_table() {
        assert_eq!(xp_for_cr(0.0), 10);
        assert_eq!(xp_for_cr(0.25), 50);
        assert_eq!(xp_for_cr(0.5), 100);
        assert_eq!(xp_for_cr(1.0), 200);
        assert_eq!(xp_for_cr(2.0), 450);
        assert_eq!(xp_for_cr(7.0), 1800);
    }

    #[test]
    fn test_loot_scales_with_cr() {
        let mut dice = DiceRoller::seeded(4);
        let drop = roll_loot(&mut dice, "Ogre", 2.0);
        assert_eq!(drop.source, "Ogre");
        assert!(drop.gold >= 16); // 2d6 min 2, scale 8
    }

    #[test]
    fn test_outcome_sums_defeated_xp() {
        let mut goblin = Combatant::new(
            "Goblin",
            CombatantKind::Enemy,
            7,
            15,
            AbilityScores::flat(),
        )
        .unwrap();
        goblin.challenge_rating = Some(0.25);
        goblin.hp.current = 0;
        let mut orc =
            Combatant::new("Orc", CombatantKind::Enemy, 15, 13, AbilityScores::flat()).unwrap();
        orc.challenge_rating = Some(0.5);
        orc.hp.current = 0;
        let hero =
            Combatant::new("Hero", CombatantKind::Player, 20, 16, AbilityScores::flat()).unwrap();

        let state = CombatState::new(vec![goblin, orc, hero], None);
        let mut dice = DiceRoller::seeded(1);
        let outcome = build_outcome(&state, &mut dice, &EncounterConfig::headless(), true);

        assert!(outcome.victory);
        assert_eq!(outcome.xp_awarded, 150);
        assert_eq!(outcome.loot.len(), 2);
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.elapsed_seconds, outcome.rounds * 6);
    }

    #[test]
    fn test_defeat_awards_nothing() {
        let goblin = Combatant::new(
            "Goblin",
            CombatantKind::Enemy,
            7,
            15,
            AbilityScores::flat(),
        )
        .unwrap();
        let mut hero =
            Combatant::new("Hero", CombatantKind::Player, 20, 16, AbilityScores::flat()).unwrap();
        hero.hp.current = 0;

        let state = CombatState::new(vec![goblin, hero], None);
        let mut dice = DiceRoller::seeded(1);
        let outcome = build_outcome(&state, &mut dice, &EncounterConfig::headless(), false);

        assert!(!outcome.victory);
        assert_eq!(outcome.xp_awarded, 0);
        assert!(outcome.loot.is_empty());
        assert!(outcome.survivors.is_empty());
    }

    #[test]
    fn test_difficulty_multiplier() {
        let mut goblin = Combatant::new(
            "Goblin",
            CombatantKind::Enemy,
            7,
            15,
            AbilityScores::flat(),
        )
        .unwrap();
        goblin.challenge_rating = Some(1.0);
        goblin.hp.current = 0;
        let hero =
            Combatant::new("Hero", CombatantKind::Player, 20, 16, AbilityScores::flat()).unwrap();

        let state = CombatState::new(vec![goblin, hero], None);
        let config = EncounterConfig {
            xp_difficulty_multiplier: 1.5,
            ..EncounterConfig::headless()
        };
        let mut dice = DiceRoller::seeded(1);
        let outcome = build_outcome(&state, &mut dice, &config, true);
        assert_eq!(outcome.xp_awarded, 300);
    }
}
