use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Combatant not found: {0:?}")]
    CombatantNotFound(crate::core::types::CombatantId),

    #[error("No active encounter")]
    NoActiveEncounter,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid combatant: {0}")]
    InvalidCombatant(String),

    #[error("Invalid dice formula: {0}")]
    InvalidFormula(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Narrator error: {0}")]
    NarratorError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
