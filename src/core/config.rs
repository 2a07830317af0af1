//! Encounter configuration with documented constants
//!
//! All tunable values for the turn loop are collected here with
//! explanations of their purpose and how they interact.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};

/// Configuration for one combat encounter
///
/// Pacing delays exist purely for presentation. Headless runs
/// (tests, AI-vs-AI batches) should zero them via [`EncounterConfig::headless`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    /// Delay before a non-player actor acts (milliseconds)
    ///
    /// Gives the presentation layer time to show whose turn it is.
    /// Not a correctness requirement; zero is valid.
    pub ai_think_delay_ms: u64,

    /// Delay after a non-player actor finishes acting (milliseconds)
    pub ai_recovery_delay_ms: u64,

    /// Maximum action attempts a non-player actor makes per turn
    ///
    /// Bounds the decide/resolve loop so a creature with no valid
    /// action cannot spin forever.
    pub max_ai_actions_per_turn: u32,

    /// Default movement speed in cells for combatants that specify none
    ///
    /// Six cells corresponds to the usual 30ft walking speed at
    /// 5ft per cell.
    pub default_movement_speed: u32,

    /// World seconds that elapse per combat round
    ///
    /// Used to advance world time proportionally after a victory.
    pub round_seconds: u32,

    /// Multiplier applied to the summed per-monster XP on victory
    pub xp_difficulty_multiplier: f32,

    /// Save the combat state after every turn boundary
    pub autosave: bool,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            ai_think_delay_ms: 2000,
            ai_recovery_delay_ms: 1000,
            max_ai_actions_per_turn: 2,
            default_movement_speed: 6,
            round_seconds: 6,
            xp_difficulty_multiplier: 1.0,
            autosave: true,
        }
    }
}

impl EncounterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with all presentation delays zeroed, for tests and batch runs
    pub fn headless() -> Self {
        Self {
            ai_think_delay_ms: 0,
            ai_recovery_delay_ms: 0,
            autosave: false,
            ..Self::default()
        }
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_ai_actions_per_turn == 0 {
            return Err("max_ai_actions_per_turn must be at least 1".into());
        }

        if self.default_movement_speed == 0 {
            return Err("default_movement_speed must be positive".into());
        }

        if self.xp_difficulty_multiplier <= 0.0 {
            return Err(format!(
                "xp_difficulty_multiplier ({}) must be positive",
                self.xp_difficulty_multiplier
            ));
        }

        Ok(())
    }
}
