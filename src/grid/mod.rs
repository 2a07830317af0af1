//! Spatial grid: positions, terrain, line-of-sight, cover, pathfinding

pub mod generator;
pub mod map;
pub mod pathfinding;
pub mod position;
pub mod terrain;

pub use generator::{generate, Biome};
pub use map::CombatGrid;
pub use pathfinding::find_path;
pub use position::GridPosition;
pub use terrain::{CoverLevel, Hazard, TerrainFeature, TerrainKind};
