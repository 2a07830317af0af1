//! Action resolution: combatants, spells, and the attack/spell engine

pub mod combatant;
pub mod resolution;
pub mod spell;

pub use combatant::{Combatant, CombatantKind};
pub use resolution::{apply_damage, apply_healing, resolve_attack, resolve_spell, ActionResult};
pub use spell::{SaveEffect, Spell, SpellCategory};
