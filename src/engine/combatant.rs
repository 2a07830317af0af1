//! The mutable unit of simulation
//!
//! Behavior differences between players, companions, enemies, and
//! summons are data-driven; the kind tag is dispatched with `match`
//! rather than subclassing.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::{CombatantId, Round};
use crate::dice::DiceFormula;
use crate::grid::position::GridPosition;
use crate::grid::terrain::CoverLevel;
use crate::mechanics::{Ability, AbilityScores, Skill};

/// What kind of combatant this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatantKind {
    Player,
    Companion,
    Enemy,
    Summon,
}

impl CombatantKind {
    /// Enemies target everyone else; everyone else targets enemies
    pub fn is_hostile(&self) -> bool {
        matches!(self, CombatantKind::Enemy)
    }

    /// Player turns wait for an external command
    pub fn awaits_external_command(&self) -> bool {
        matches!(self, CombatantKind::Player)
    }
}

/// Hit points with temporary-HP buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
    pub temp: i32,
}

impl HitPoints {
    pub fn new(max: i32) -> Self {
        Self {
            current: max,
            max,
            temp: 0,
        }
    }
}

/// Spell slots by level (index 0 = level 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpellSlots {
    pub slots: [u32; 5],
}

impl SpellSlots {
    pub fn has_slot(&self, level: u8) -> bool {
        matches!(level, 1..=5) && self.slots[(level - 1) as usize] > 0
    }

    /// Spend a slot; false when none remain at that level
    pub fn spend(&mut self, level: u8) -> bool {
        if self.has_slot(level) {
            self.slots[(level - 1) as usize] -= 1;
            true
        } else {
            false
        }
    }
}

/// Lasting conditions without a tracked duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    Prone,
    Grappled,
    Restrained,
    Stunned,
    Poisoned,
    Frightened,
}

/// Timed status effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEffectKind {
    Dodging,
    Disengaging,
    Hidden,
    Blessed,
    Shielded,
    Slowed,
    Burning,
}

impl StatusEffectKind {
    /// Lowercase label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            StatusEffectKind::Dodging => "dodging",
            StatusEffectKind::Disengaging => "disengaging",
            StatusEffectKind::Hidden => "hidden",
            StatusEffectKind::Blessed => "blessed",
            StatusEffectKind::Shielded => "shielded",
            StatusEffectKind::Slowed => "slowed",
            StatusEffectKind::Burning => "burning",
        }
    }
}

/// A status effect with an optional duration in rounds
///
/// Durations tick down at the start of the owner's turn; an effect at
/// zero expires. `None` lasts until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusEffectKind,
    pub remaining_rounds: Option<u32>,
    pub source: Option<CombatantId>,
}

impl StatusEffect {
    pub fn new(kind: StatusEffectKind, remaining_rounds: Option<u32>) -> Self {
        Self {
            kind,
            remaining_rounds,
            source: None,
        }
    }
}

/// Sustained focus on one active spell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concentration {
    pub spell_name: String,
    pub start_round: Round,
}

/// Creature size category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreatureSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Spatial combat profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacticalProfile {
    /// Cover currently credited to this combatant (refreshed by the
    /// orchestrator when it moves)
    pub cover: CoverLevel,
    /// Melee reach in cells
    pub reach: u32,
    pub is_ranged: bool,
    /// Normal range in cells for ranged attackers
    pub range: u32,
}

impl Default for TacticalProfile {
    fn default() -> Self {
        Self {
            cover: CoverLevel::None,
            reach: 1,
            is_ranged: false,
            range: 1,
        }
    }
}

/// One attack a combatant knows how to make
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    pub name: String,
    pub ability: Ability,
    pub damage: DiceFormula,
    pub is_ranged: bool,
    /// Normal range in cells (melee reach for melee attacks)
    pub range: u32,
}

impl AttackProfile {
    /// Bare-handed fallback when a stat block lists nothing
    pub fn unarmed() -> Self {
        Self {
            name: "Unarmed Strike".into(),
            ability: Ability::Strength,
            damage: DiceFormula::flat(1),
            is_ranged: false,
            range: 1,
        }
    }
}

/// A combatant in an encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    // Identity
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,

    // Vitals
    pub hp: HitPoints,
    pub ac: i32,
    pub stats: AbilityScores,
    pub level: u32,
    /// Set for monsters; drives XP on defeat
    pub challenge_rating: Option<f32>,

    // Turn order
    pub initiative: i32,

    // Action economy
    pub spell_slots: SpellSlots,
    pub action_spent: bool,
    pub bonus_action_spent: bool,
    pub reaction_spent: bool,
    pub movement_speed: u32,
    pub movement_remaining: u32,

    // Spatial
    pub position: GridPosition,
    pub size: CreatureSize,
    pub tactical: TacticalProfile,
    pub attacks: Vec<AttackProfile>,

    // Status
    pub conditions: Vec<ConditionKind>,
    pub status_effects: Vec<StatusEffect>,
    pub concentration: Option<Concentration>,

    // Proficiencies
    pub skill_proficiencies: Vec<Skill>,
    pub save_proficiencies: Vec<Ability>,

    /// The caster that summoned this combatant, if any
    pub source_id: Option<CombatantId>,
}

impl Combatant {
    /// Construct a combatant, enforcing the vitals invariants
    pub fn new(
        name: impl Into<String>,
        kind: CombatantKind,
        max_hp: i32,
        ac: i32,
        stats: AbilityScores,
    ) -> Result<Self> {
        let name = name.into();
        if max_hp <= 0 {
            return Err(EngineError::InvalidCombatant(format!(
                "{name}: max hp must be positive, got {max_hp}"
            )));
        }
        if ac < 0 {
            return Err(EngineError::InvalidCombatant(format!(
                "{name}: ac must be non-negative, got {ac}"
            )));
        }

        Ok(Self {
            id: CombatantId::new(),
            name,
            kind,
            hp: HitPoints::new(max_hp),
            ac,
            stats,
            level: 1,
            challenge_rating: None,
            initiative: 0,
            spell_slots: SpellSlots::default(),
            action_spent: false,
            bonus_action_spent: false,
            reaction_spent: false,
            movement_speed: 6,
            movement_remaining: 6,
            position: GridPosition::default(),
            size: CreatureSize::default(),
            tactical: TacticalProfile::default(),
            attacks: vec![AttackProfile::unarmed()],
            conditions: Vec::new(),
            status_effects: Vec::new(),
            concentration: None,
            skill_proficiencies: Vec::new(),
            save_proficiencies: Vec::new(),
            source_id: None,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.hp.current > 0
    }

    pub fn dexterity(&self) -> i32 {
        self.stats.dexterity
    }

    pub fn is_proficient(&self, skill: Skill) -> bool {
        self.skill_proficiencies.contains(&skill)
    }

    pub fn has_save_proficiency(&self, ability: Ability) -> bool {
        self.save_proficiencies.contains(&ability)
    }

    pub fn has_status(&self, kind: StatusEffectKind) -> bool {
        self.status_effects.iter().any(|e| e.kind == kind)
    }

    pub fn is_dodging(&self) -> bool {
        self.has_status(StatusEffectKind::Dodging)
    }

    pub fn add_status(&mut self, effect: StatusEffect) {
        // Re-applying refreshes the duration instead of stacking
        self.status_effects.retain(|e| e.kind != effect.kind);
        self.status_effects.push(effect);
    }

    pub fn remove_status(&mut self, kind: StatusEffectKind) {
        self.status_effects.retain(|e| e.kind != kind);
    }

    /// Decrement timed effects and drop the ones that expire
    pub fn tick_status_effects(&mut self) -> Vec<StatusEffectKind> {
        let mut expired = Vec::new();
        self.status_effects.retain_mut(|effect| {
            match effect.remaining_rounds {
                None => true,
                Some(0) | Some(1) => {
                    expired.push(effect.kind);
                    false
                }
                Some(rounds) => {
                    effect.remaining_rounds = Some(rounds - 1);
                    true
                }
            }
        });
        expired
    }

    /// Reset action economy at the start of this combatant's turn
    pub fn start_turn_reset(&mut self) {
        self.action_spent = false;
        self.bonus_action_spent = false;
        self.reaction_spent = false;
        self.movement_remaining = self.movement_speed;
    }

    /// Casting-ability modifier: the best of the three mental stats
    pub fn spellcasting_modifier(&self) -> i32 {
        self.stats
            .modifier(Ability::Intelligence)
            .max(self.stats.modifier(Ability::Wisdom))
            .max(self.stats.modifier(Ability::Charisma))
    }

    /// Reach of the given attack in cells
    pub fn attack_range(&self, attack: &AttackProfile) -> u32 {
        if attack.is_ranged {
            attack.range
        } else {
            self.tactical.reach.max(attack.range)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goblin() -> Combatant {
        Combatant::new(
            "Goblin",
            CombatantKind::Enemy,
            7,
            15,
            AbilityScores::new(8, 14, 10, 10, 8, 8),
        )
        .unwrap()
    }

    #[test]
    fn test_constructor_rejects_bad_vitals() {
        assert!(Combatant::new("x", CombatantKind::Enemy, 0, 10, AbilityScores::flat()).is_err());
        assert!(Combatant::new("x", CombatantKind::Enemy, 5, -1, AbilityScores::flat()).is_err());
    }

    #[test]
    fn test_new_combatant_at_full_health() {
        let g = goblin();
        assert_eq!(g.hp.current, 7);
        assert_eq!(g.hp.max, 7);
        assert!(g.is_alive());
    }

    #[test]
    fn test_hostility_by_kind() {
        assert!(CombatantKind::Enemy.is_hostile());
        assert!(!CombatantKind::Player.is_hostile());
        assert!(!CombatantKind::Companion.is_hostile());
        assert!(!CombatantKind::Summon.is_hostile());
    }

    #[test]
    fn test_status_refresh_does_not_stack() {
        let mut g = goblin();
        g.add_status(StatusEffect::new(StatusEffectKind::Blessed, Some(3)));
        g.add_status(StatusEffect::new(StatusEffectKind::Blessed, Some(5)));
        assert_eq!(g.status_effects.len(), 1);
        assert_eq!(g.status_effects[0].remaining_rounds, Some(5));
    }

    #[test]
    fn test_status_effects_expire() {
        let mut g = goblin();
        g.add_status(StatusEffect::new(StatusEffectKind::Dodging, Some(1)));
        g.add_status(StatusEffect::new(StatusEffectKind::Blessed, Some(2)));
        g.add_status(StatusEffect::new(StatusEffectKind::Burning, None));

        let expired = g.tick_status_effects();
        assert_eq!(expired, vec![StatusEffectKind::Dodging]);
        assert!(g.has_status(StatusEffectKind::Blessed));
        assert!(g.has_status(StatusEffectKind::Burning));
        assert_eq!(g.status_effects[0].remaining_rounds, Some(1));
    }

    #[test]
    fn test_start_turn_reset() {
        let mut g = goblin();
        g.action_spent = true;
        g.bonus_action_spent = true;
        g.reaction_spent = true;
        g.movement_remaining = 0;
        g.start_turn_reset();
        assert!(!g.action_spent && !g.bonus_action_spent && !g.reaction_spent);
        assert_eq!(g.movement_remaining, g.movement_speed);
    }

    #[test]
    fn test_spell_slots() {
        let mut slots = SpellSlots { slots: [2, 1, 0, 0, 0] };
        assert!(slots.spend(1));
        assert!(slots.spend(1));
        assert!(!slots.spend(1));
        assert!(!slots.spend(3));
        assert!(!slots.has_slot(9));
    }
}
