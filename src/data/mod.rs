//! Static combat data: monster stat blocks and spells
//!
//! Lookups are consumed through the `CombatDataSource` trait so games
//! can swap in their own bestiary. Unknown names degrade to a
//! placeholder stat block instead of failing the encounter.

use serde::{Deserialize, Serialize};

use crate::dice::DiceFormula;
use crate::engine::combatant::{AttackProfile, Combatant, CombatantKind, TacticalProfile};
use crate::engine::spell::{SaveEffect, Spell, SpellCategory};
use crate::grid::terrain::CoverLevel;
use crate::mechanics::{Ability, AbilityScores};

/// A monster stat block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterStats {
    pub name: String,
    pub challenge_rating: f32,
    pub max_hp: i32,
    pub ac: i32,
    pub stats: AbilityScores,
    pub speed: u32,
    pub attacks: Vec<AttackProfile>,
}

/// Static combat data lookups
pub trait CombatDataSource {
    fn monster(&self, name: &str) -> Option<MonsterStats>;
    fn spell(&self, name: &str) -> Option<Spell>;
}

/// Built-in bestiary and spell list
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticData;

impl CombatDataSource for StaticData {
    fn monster(&self, name: &str) -> Option<MonsterStats> {
        let melee = |name: &str, ability, count, sides, modifier| AttackProfile {
            name: name.into(),
            ability,
            damage: DiceFormula::new(count, sides, modifier),
            is_ranged: false,
            range: 1,
        };

        match name.to_lowercase().as_str() {
            "goblin" => Some(MonsterStats {
                name: "Goblin".into(),
                challenge_rating: 0.25,
                max_hp: 7,
                ac: 15,
                stats: AbilityScores::new(8, 14, 10, 10, 8, 8),
                speed: 6,
                attacks: vec![melee("Scimitar", Ability::Dexterity, 1, 6, 0)],
            }),
            "goblin archer" => Some(MonsterStats {
                name: "Goblin Archer".into(),
                challenge_rating: 0.25,
                max_hp: 7,
                ac: 13,
                stats: AbilityScores::new(8, 14, 10, 10, 8, 8),
                speed: 6,
                attacks: vec![AttackProfile {
                    name: "Shortbow".into(),
                    ability: Ability::Dexterity,
                    damage: DiceFormula::new(1, 6, 0),
                    is_ranged: true,
                    range: 16,
                }],
            }),
            "wolf" => Some(MonsterStats {
                name: "Wolf".into(),
                challenge_rating: 0.25,
                max_hp: 11,
                ac: 13,
                stats: AbilityScores::new(12, 15, 12, 3, 12, 6),
                speed: 8,
                attacks: vec![melee("Bite", Ability::Strength, 2, 4, 0)],
            }),
            "skeleton" => Some(MonsterStats {
                name: "Skeleton".into(),
                challenge_rating: 0.25,
                max_hp: 13,
                ac: 13,
                stats: AbilityScores::new(10, 14, 15, 6, 8, 5),
                speed: 6,
                attacks: vec![melee("Shortsword", Ability::Dexterity, 1, 6, 0)],
            }),
            "orc" => Some(MonsterStats {
                name: "Orc".into(),
                challenge_rating: 0.5,
                max_hp: 15,
                ac: 13,
                stats: AbilityScores::new(16, 12, 16, 7, 11, 10),
                speed: 6,
                attacks: vec![melee("Greataxe", Ability::Strength, 1, 12, 0)],
            }),
            "ghoul" => Some(MonsterStats {
                name: "Ghoul".into(),
                challenge_rating: 1.0,
                max_hp: 22,
                ac: 12,
                stats: AbilityScores::new(13, 15, 10, 7, 10, 6),
                speed: 6,
                attacks: vec![melee("Claws", Ability::Dexterity, 2, 4, 0)],
            }),
            "ogre" => Some(MonsterStats {
                name: "Ogre".into(),
                challenge_rating: 2.0,
                max_hp: 59,
                ac: 11,
                stats: AbilityScores::new(19, 8, 16, 5, 7, 7),
                speed: 8,
                attacks: vec![melee("Greatclub", Ability::Strength, 2, 8, 0)],
            }),
            _ => None,
        }
    }

    fn spell(&self, name: &str) -> Option<Spell> {
        match name.to_lowercase().as_str() {
            "fire bolt" => Some(Spell::attack("Fire Bolt", 0, DiceFormula::new(1, 10, 0), 24)),
            "burning hands" => Some(Spell::save(
                "Burning Hands",
                1,
                DiceFormula::new(3, 6, 0),
                Ability::Dexterity,
                SaveEffect::Half,
                3,
            )),
            "cure wounds" => Some(Spell::heal("Cure Wounds", 1, DiceFormula::new(1, 8, 0), 1)),
            "hold person" => Some(Spell {
                name: "Hold Person".into(),
                level: 2,
                category: SpellCategory::Control,
                attack_roll: false,
                save_ability: Some(Ability::Wisdom),
                save_effect: SaveEffect::Negate,
                damage: None,
                healing: None,
                range: 12,
                concentration: true,
                summon_name: None,
            }),
            "bless" => Some(Spell {
                name: "Bless".into(),
                level: 1,
                category: SpellCategory::Buff,
                attack_roll: false,
                save_ability: None,
                save_effect: SaveEffect::Negate,
                damage: None,
                healing: None,
                range: 6,
                concentration: true,
                summon_name: None,
            }),
            "summon wolf" => Some(Spell {
                name: "Summon Wolf".into(),
                level: 2,
                category: SpellCategory::Summon,
                attack_roll: false,
                save_ability: None,
                save_effect: SaveEffect::Negate,
                damage: None,
                healing: None,
                range: 6,
                concentration: true,
                summon_name: Some("Wolf".into()),
            }),
            _ => None,
        }
    }
}

/// Generic stat block used when a monster name is unknown
pub fn placeholder_monster(name: &str) -> MonsterStats {
    tracing::warn!(name, "unknown monster, using placeholder stat block");
    MonsterStats {
        name: name.into(),
        challenge_rating: 0.25,
        max_hp: 9,
        ac: 12,
        stats: AbilityScores::flat(),
        speed: 6,
        attacks: vec![AttackProfile::unarmed()],
    }
}

/// Build a combatant from a stat block, falling back to the placeholder
/// for unknown names
pub fn spawn_monster(source: &dyn CombatDataSource, name: &str) -> Combatant {
    let stats = source
        .monster(name)
        .unwrap_or_else(|| placeholder_monster(name));

    let primary_ranged = stats.attacks.first().map(|a| a.is_ranged).unwrap_or(false);
    let primary_range = stats.attacks.first().map(|a| a.range).unwrap_or(1);

    // Stat blocks are validated data, so construction cannot fail
    let mut combatant = Combatant::new(
        stats.name.clone(),
        CombatantKind::Enemy,
        stats.max_hp,
        stats.ac,
        stats.stats,
    )
    .unwrap_or_else(|_| {
        let fallback = placeholder_monster(&stats.name);
        Combatant::new(
            fallback.name,
            CombatantKind::Enemy,
            fallback.max_hp,
            fallback.ac,
            fallback.stats,
        )
        .expect("placeholder stat block is valid")
    });

    combatant.challenge_rating = Some(stats.challenge_rating);
    combatant.movement_speed = stats.speed;
    combatant.movement_remaining = stats.speed;
    combatant.attacks = if stats.attacks.is_empty() {
        vec![AttackProfile::unarmed()]
    } else {
        stats.attacks
    };
    combatant.tactical = TacticalProfile {
        cover: CoverLevel::None,
        reach: 1,
        is_ranged: primary_ranged,
        range: primary_range,
    };
    combatant
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_monster_lookup() {
        let goblin = StaticData.monster("Goblin").unwrap();
        assert_eq!(goblin.ac, 15);
        assert_eq!(goblin.challenge_rating, 0.25);
    }

    #[test]
    fn test_unknown_monster_is_none() {
        assert!(StaticData.monster("tarrasque").is_none());
    }

    #[test]
    fn test_spawn_unknown_uses_placeholder() {
        let combatant = spawn_monster(&StaticData, "gibbering foo");
        assert_eq!(combatant.name, "gibbering foo");
        assert_eq!(combatant.hp.max, 9);
        assert!(combatant.is_alive());
    }

    #[test]
    fn test_spawn_ranged_monster_profile() {
        let archer = spawn_monster(&StaticData, "goblin archer");
        assert!(archer.tactical.is_ranged);
        assert_eq!(archer.tactical.range, 16);
    }

    #[test]
    fn test_spell_lookup() {
        assert!(StaticData.spell("Fire Bolt").is_some());
        assert!(StaticData.spell("wish").is_none());
        let hold = StaticData.spell("hold person").unwrap();
        assert!(hold.concentration);
        assert_eq!(hold.category, SpellCategory::Control);
    }
}
