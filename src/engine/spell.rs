//! Spell data model
//!
//! A spell either rolls a spell attack, forces a saving throw, or
//! affects its target automatically; the category says what happens
//! once the mechanism resolves.

use serde::{Deserialize, Serialize};

use crate::dice::DiceFormula;
use crate::mechanics::Ability;

/// What a spell does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellCategory {
    Damage,
    Heal,
    Buff,
    Debuff,
    Control,
    Summon,
}

/// What a successful save does to a damage spell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveEffect {
    /// No damage on a successful save
    #[default]
    Negate,
    /// Half damage on a successful save
    Half,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    pub level: u8,
    pub category: SpellCategory,
    /// True for spells resolved with a spell attack roll
    pub attack_roll: bool,
    /// Saving throw the target rolls, when the spell forces one
    pub save_ability: Option<Ability>,
    pub save_effect: SaveEffect,
    pub damage: Option<DiceFormula>,
    pub healing: Option<DiceFormula>,
    /// Range in cells
    pub range: u32,
    pub concentration: bool,
    /// Monster spawned by a Summon spell
    pub summon_name: Option<String>,
}

impl Spell {
    /// A plain attack-roll damage spell
    pub fn attack(name: impl Into<String>, level: u8, damage: DiceFormula, range: u32) -> Self {
        Self {
            name: name.into(),
            level,
            category: SpellCategory::Damage,
            attack_roll: true,
            save_ability: None,
            save_effect: SaveEffect::Negate,
            damage: Some(damage),
            healing: None,
            range,
            concentration: false,
            summon_name: None,
        }
    }

    /// A save-or-suffer damage spell
    pub fn save(
        name: impl Into<String>,
        level: u8,
        damage: DiceFormula,
        save_ability: Ability,
        save_effect: SaveEffect,
        range: u32,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            category: SpellCategory::Damage,
            attack_roll: false,
            save_ability: Some(save_ability),
            save_effect,
            damage: Some(damage),
            healing: None,
            range,
            concentration: false,
            summon_name: None,
        }
    }

    /// A healing spell
    pub fn heal(name: impl Into<String>, level: u8, healing: DiceFormula, range: u32) -> Self {
        Self {
            name: name.into(),
            level,
            category: SpellCategory::Heal,
            attack_roll: false,
            save_ability: None,
            save_effect: SaveEffect::Negate,
            damage: None,
            healing: Some(healing),
            range,
            concentration: false,
            summon_name: None,
        }
    }
}
