//! Attack and spell resolution
//!
//! Resolution never mutates a combatant; the caller applies the damage
//! or healing in the returned result via `apply_damage`/`apply_healing`.

use serde::{Deserialize, Serialize};

use crate::dice::{Advantage, DiceFormula, DiceRoller};
use crate::engine::combatant::Combatant;
use crate::engine::spell::{SaveEffect, Spell, SpellCategory};
use crate::mechanics::resolve_save;

/// What an action resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResultKind {
    Hit,
    Miss,
    Crit,
    SaveSuccess,
    SaveFail,
    Heal,
    Effect,
}

/// Numbers behind a resolution, for the UI and the combat log
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RollDetails {
    pub roll: u32,
    pub modifier: i32,
    pub total: i32,
    pub target_ac: Option<i32>,
    pub save_dc: Option<i32>,
    pub is_crit: bool,
}

/// The sole output contract of the resolution engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub kind: ActionResultKind,
    pub damage: i32,
    pub healing: i32,
    pub message: String,
    pub details: RollDetails,
}

impl ActionResult {
    pub fn is_hit(&self) -> bool {
        matches!(self.kind, ActionResultKind::Hit | ActionResultKind::Crit)
    }
}

/// Roll damage for a confirmed hit
///
/// A crit doubles the rolled dice, never the flat modifiers; a hit
/// always deals at least 1 damage.
fn roll_damage(
    dice: &mut DiceRoller,
    formula: &DiceFormula,
    stat_modifier: i32,
    is_crit: bool,
) -> i32 {
    let breakdown = dice.roll(formula);
    let dice_part = if is_crit {
        breakdown.dice_total * 2
    } else {
        breakdown.dice_total
    };
    (dice_part + breakdown.modifier + stat_modifier).max(1)
}

/// Resolve one attack roll against a target
///
/// Disadvantage is forced when the target is dodging or the caller asks
/// for it (long range, unseen target). A natural 20 always hits and
/// crits regardless of AC.
pub fn resolve_attack(
    dice: &mut DiceRoller,
    attacker: &Combatant,
    target: &Combatant,
    attack_bonus: i32,
    damage_formula: &DiceFormula,
    stat_modifier: i32,
    force_disadvantage: bool,
) -> ActionResult {
    let advantage = if target.is_dodging() || force_disadvantage {
        Advantage::Disadvantage
    } else {
        Advantage::Normal
    };

    let roll = dice.d20(advantage);
    let total = roll.natural as i32 + attack_bonus;
    let is_crit = roll.is_natural_20();
    let hits = is_crit || total >= target.ac;

    let details = RollDetails {
        roll: roll.natural,
        modifier: attack_bonus,
        total,
        target_ac: Some(target.ac),
        save_dc: None,
        is_crit,
    };

    if !hits {
        return ActionResult {
            kind: ActionResultKind::Miss,
            damage: 0,
            healing: 0,
            message: format!(
                "{} misses {} ({} vs AC {})",
                attacker.name, target.name, total, target.ac
            ),
            details,
        };
    }

    let damage = roll_damage(dice, damage_formula, stat_modifier, is_crit);

    ActionResult {
        kind: if is_crit {
            ActionResultKind::Crit
        } else {
            ActionResultKind::Hit
        },
        damage,
        healing: 0,
        message: if is_crit {
            format!(
                "{} critically hits {} for {} damage",
                attacker.name, target.name, damage
            )
        } else {
            format!(
                "{} hits {} for {} damage ({} vs AC {})",
                attacker.name, target.name, damage, total, target.ac
            )
        },
        details,
    }
}

/// Resolve one spell cast against a target
///
/// Save spells roll the target's save against the DC; a success for the
/// caster means the target failed. Attack-roll spells share the attack
/// logic, and a miss short-circuits before any category effect. Spells
/// with neither mechanism affect the target automatically.
pub fn resolve_spell(
    dice: &mut DiceRoller,
    caster: &Combatant,
    target: &Combatant,
    spell: &Spell,
    spell_attack_bonus: i32,
    spell_save_dc: i32,
) -> ActionResult {
    if let Some(save_ability) = spell.save_ability {
        let save = resolve_save(dice, target, save_ability, spell_save_dc, Advantage::Normal);
        let saved = save.success.unwrap_or(false);
        let details = RollDetails {
            roll: save.natural,
            modifier: save.modifier,
            total: save.total,
            target_ac: None,
            save_dc: Some(spell_save_dc),
            is_crit: false,
        };

        return match spell.category {
            SpellCategory::Damage => {
                let formula = spell.damage.unwrap_or(DiceFormula::flat(0));
                let full = dice.roll(&formula).total.max(1);
                let damage = if saved {
                    match spell.save_effect {
                        SaveEffect::Half => full / 2,
                        SaveEffect::Negate => 0,
                    }
                } else {
                    full
                };
                ActionResult {
                    kind: if saved {
                        ActionResultKind::SaveSuccess
                    } else {
                        ActionResultKind::SaveFail
                    },
                    damage,
                    healing: 0,
                    message: if saved {
                        format!(
                            "{} resists {} ({} vs DC {})",
                            target.name, spell.name, save.total, spell_save_dc
                        )
                    } else {
                        format!(
                            "{} is caught by {} for {} damage",
                            target.name, spell.name, damage
                        )
                    },
                    details,
                }
            }
            // Non-damage save spells land only when the save fails
            _ => ActionResult {
                kind: if saved {
                    ActionResultKind::SaveSuccess
                } else {
                    ActionResultKind::Effect
                },
                damage: 0,
                healing: 0,
                message: if saved {
                    format!("{} shakes off {}", target.name, spell.name)
                } else {
                    format!("{} succumbs to {}", target.name, spell.name)
                },
                details,
            },
        };
    }

    if spell.attack_roll {
        let formula = spell.damage.unwrap_or(DiceFormula::flat(0));
        let mut result = resolve_attack(dice, caster, target, spell_attack_bonus, &formula, 0, false);
        result.message = match result.kind {
            ActionResultKind::Miss => {
                format!("{}'s {} misses {}", caster.name, spell.name, target.name)
            }
            ActionResultKind::Crit => format!(
                "{}'s {} sears {} for {} damage (critical)",
                caster.name, spell.name, target.name, result.damage
            ),
            _ => format!(
                "{}'s {} strikes {} for {} damage",
                caster.name, spell.name, target.name, result.damage
            ),
        };
        return result;
    }

    // Auto-affecting spells
    match spell.category {
        SpellCategory::Heal => {
            let formula = spell.healing.unwrap_or(DiceFormula::flat(0));
            let breakdown = dice.roll(&formula);
            let healing = (breakdown.total + caster.spellcasting_modifier()).max(0);
            ActionResult {
                kind: ActionResultKind::Heal,
                damage: 0,
                healing,
                message: format!(
                    "{} heals {} for {} hit points",
                    caster.name, target.name, healing
                ),
                details: RollDetails::default(),
            }
        }
        SpellCategory::Summon => ActionResult {
            kind: ActionResultKind::Effect,
            damage: 0,
            healing: 0,
            message: format!(
                "{} calls {} to the field",
                caster.name,
                spell.summon_name.as_deref().unwrap_or("a creature")
            ),
            details: RollDetails::default(),
        },
        _ => ActionResult {
            kind: ActionResultKind::Effect,
            damage: 0,
            healing: 0,
            message: format!("{} casts {} on {}", caster.name, spell.name, target.name),
            details: RollDetails::default(),
        },
    }
}

/// Apply damage to a target, consuming temporary HP first and clamping
/// to `[0, max]`
pub fn apply_damage(target: &mut Combatant, amount: i32) {
    let amount = amount.max(0);
    let absorbed = amount.min(target.hp.temp);
    target.hp.temp -= absorbed;
    target.hp.current = (target.hp.current - (amount - absorbed)).clamp(0, target.hp.max);
}

/// Apply healing to a target, clamping to `[0, max]`
pub fn apply_healing(target: &mut Combatant, amount: i32) {
    let amount = amount.max(0);
    target.hp.current = (target.hp.current + amount).clamp(0, target.hp.max);
}
