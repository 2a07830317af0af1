//! Shared d20 mechanics: ability modifiers, proficiency, checks and saves

use serde::{Deserialize, Serialize};

use crate::dice::{Advantage, DiceRoller};
use crate::engine::combatant::Combatant;

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

/// Skills used by checks in this core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Athletics,
    Acrobatics,
    Stealth,
    Perception,
    Insight,
    Survival,
    Intimidation,
}

impl Skill {
    /// The ability a skill check rolls with
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::Stealth => Ability::Dexterity,
            Skill::Perception | Skill::Insight | Skill::Survival => Ability::Wisdom,
            Skill::Intimidation => Ability::Charisma,
        }
    }
}

/// A full set of ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    /// All tens, the commoner baseline
    pub fn flat() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }

    pub fn score(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.score(ability))
    }
}

/// `floor((score - 10) / 2)`
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Proficiency bonus by character level (monsters pass a level derived
/// from their challenge rating)
pub fn proficiency_bonus(level: u32) -> i32 {
    match level {
        0..=4 => 2,
        5..=8 => 3,
        9..=12 => 4,
        13..=16 => 5,
        _ => 6,
    }
}

/// Outcome of a check or save
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckResult {
    pub natural: u32,
    pub modifier: i32,
    pub total: i32,
    /// Set when a DC was given
    pub success: Option<bool>,
}

/// Roll an ability or skill check
///
/// Proficiency applies only when the actor is proficient in the given
/// skill; a bare ability check never adds it.
pub fn resolve_check(
    dice: &mut DiceRoller,
    actor: &Combatant,
    ability: Ability,
    skill: Option<Skill>,
    dc: Option<i32>,
    advantage: Advantage,
) -> CheckResult {
    let mut modifier = actor.stats.modifier(ability);
    if let Some(skill) = skill {
        if actor.is_proficient(skill) {
            modifier += proficiency_bonus(actor.level);
        }
    }
    finish_roll(dice, modifier, dc, advantage)
}

/// Roll a saving throw
pub fn resolve_save(
    dice: &mut DiceRoller,
    actor: &Combatant,
    ability: Ability,
    dc: i32,
    advantage: Advantage,
) -> CheckResult {
    let mut modifier = actor.stats.modifier(ability);
    if actor.has_save_proficiency(ability) {
        modifier += proficiency_bonus(actor.level);
    }
    finish_roll(dice, modifier, Some(dc), advantage)
}

fn finish_roll(
    dice: &mut DiceRoller,
    modifier: i32,
    dc: Option<i32>,
    advantage: Advantage,
) -> CheckResult {
    let roll = dice.d20(advantage);
    let total = roll.natural as i32 + modifier;
    CheckResult {
        natural: roll.natural,
        modifier,
        total,
        success: dc.map(|dc| total >= dc),
    }
}

/// Group stealth: succeeds when at least half the individual checks pass
pub fn resolve_group_stealth(dice: &mut DiceRoller, actors: &[&Combatant], dc: i32) -> bool {
    if actors.is_empty() {
        return false;
    }
    let successes = actors
        .iter()
        .filter(|actor| {
            resolve_check(
                dice,
                actor,
                Ability::Dexterity,
                Some(Skill::Stealth),
                Some(dc),
                Advantage::Normal,
            )
            .success
            .unwrap_or(false)
        })
        .count();
    successes >= actors.len() / 2
}

/// `10 + WIS modifier + proficiency if proficient in Perception`
pub fn passive_perception(actor: &Combatant) -> i32 {
    let mut score = 10 + actor.stats.modifier(Ability::Wisdom);
    if actor.is_proficient(Skill::Perception) {
        score += proficiency_bonus(actor.level);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combatant::{Combatant, CombatantKind};

    fn actor(stats: AbilityScores) -> Combatant {
        let mut c = Combatant::new("Tester", CombatantKind::Player, 10, 12, stats).unwrap();
        c.level = 5;
        c
    }

    #[test]
    fn test_ability_modifier_table() {
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(11), 0);
        assert_eq!(ability_modifier(14), 2);
        assert_eq!(ability_modifier(20), 5);
    }

    #[test]
    fn test_proficiency_breakpoints() {
        assert_eq!(proficiency_bonus(1), 2);
        assert_eq!(proficiency_bonus(4), 2);
        assert_eq!(proficiency_bonus(5), 3);
        assert_eq!(proficiency_bonus(8), 3);
        assert_eq!(proficiency_bonus(9), 4);
        assert_eq!(proficiency_bonus(12), 4);
        assert_eq!(proficiency_bonus(13), 5);
        assert_eq!(proficiency_bonus(16), 5);
        assert_eq!(proficiency_bonus(17), 6);
        assert_eq!(proficiency_bonus(20), 6);
    }

    #[test]
    fn test_check_adds_proficiency_only_when_proficient() {
        let mut dice = DiceRoller::seeded(11);
        let mut proficient = actor(AbilityScores::new(10, 16, 10, 10, 10, 10));
        proficient.skill_proficiencies.push(Skill::Stealth);
        let plain = actor(AbilityScores::new(10, 16, 10, 10, 10, 10));

        let with = resolve_check(
            &mut dice,
            &proficient,
            Ability::Dexterity,
            Some(Skill::Stealth),
            None,
            Advantage::Normal,
        );
        let without = resolve_check(
            &mut dice,
            &plain,
            Ability::Dexterity,
            Some(Skill::Stealth),
            None,
            Advantage::Normal,
        );
        // DEX +3, proficiency +3 at level 5
        assert_eq!(with.modifier, 6);
        assert_eq!(without.modifier, 3);
    }

    #[test]
    fn test_check_success_against_dc() {
        let mut dice = DiceRoller::seeded(2);
        let subject = actor(AbilityScores::flat());
        let result = resolve_check(
            &mut dice,
            &subject,
            Ability::Strength,
            None,
            Some(10),
            Advantage::Normal,
        );
        assert_eq!(result.success, Some(result.total >= 10));
    }

    #[test]
    fn test_group_stealth_majority() {
        // Three shadows vs an impossible DC: zero successes < 3/2
        let mut dice = DiceRoller::seeded(5);
        let a = actor(AbilityScores::flat());
        let b = actor(AbilityScores::flat());
        let c = actor(AbilityScores::flat());
        assert!(!resolve_group_stealth(&mut dice, &[&a, &b, &c], 40));
        // Trivial DC: everyone passes
        assert!(resolve_group_stealth(&mut dice, &[&a, &b, &c], 1));
    }

    #[test]
    fn test_passive_perception() {
        let mut scout = actor(AbilityScores::new(10, 10, 10, 10, 16, 10));
        assert_eq!(passive_perception(&scout), 13);
        scout.skill_proficiencies.push(Skill::Perception);
        assert_eq!(passive_perception(&scout), 16);
    }
}
