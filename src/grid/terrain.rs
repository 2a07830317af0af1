//! Terrain features and their movement/vision/cover properties

use serde::{Deserialize, Serialize};

use crate::dice::DiceFormula;
use crate::grid::position::GridPosition;

/// Kinds of terrain feature that can occupy a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TerrainKind {
    #[default]
    Open,
    Wall,
    Water,
    Rubble,
    Tree,
    Lava,
    Pit,
    Difficult,
}

impl TerrainKind {
    /// Does this terrain stop a combatant from entering the cell?
    pub fn blocks_movement(&self) -> bool {
        matches!(self, TerrainKind::Wall | TerrainKind::Water | TerrainKind::Pit)
    }

    /// Does this terrain block line of sight through the cell?
    pub fn blocks_vision(&self) -> bool {
        matches!(self, TerrainKind::Wall)
    }

    /// Cover granted to a target standing behind this feature
    pub fn cover(&self) -> CoverLevel {
        match self {
            TerrainKind::Wall => CoverLevel::Full,
            TerrainKind::Tree => CoverLevel::ThreeQuarters,
            TerrainKind::Rubble => CoverLevel::Half,
            _ => CoverLevel::None,
        }
    }

    /// Can this feature be broken down?
    pub fn is_destructible(&self) -> bool {
        matches!(self, TerrainKind::Tree | TerrainKind::Rubble)
    }

    /// Hazard applied to a combatant starting its turn here
    pub fn hazard(&self) -> Option<Hazard> {
        match self {
            TerrainKind::Lava => Some(Hazard {
                damage: DiceFormula::new(2, 6, 0),
                description: "searing lava".into(),
            }),
            _ => None,
        }
    }
}

/// Cover tiers, weakest to strongest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum CoverLevel {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarters,
    Full,
}

impl CoverLevel {
    /// AC bonus granted by this cover tier
    pub fn ac_bonus(&self) -> i32 {
        match self {
            CoverLevel::None => 0,
            CoverLevel::Quarter => 1,
            CoverLevel::Half => 2,
            CoverLevel::ThreeQuarters => 5,
            CoverLevel::Full => 5,
        }
    }

    /// Full cover cannot be targeted at all
    pub fn blocks_targeting(&self) -> bool {
        matches!(self, CoverLevel::Full)
    }
}

/// Damage applied to a combatant that starts its turn on the feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hazard {
    pub damage: DiceFormula,
    pub description: String,
}

/// A placed terrain feature
///
/// The flags are filled in from the kind at construction; they stay
/// immutable for the lifetime of the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainFeature {
    pub id: u32,
    pub kind: TerrainKind,
    pub position: GridPosition,
    pub blocks_movement: bool,
    pub blocks_vision: bool,
    pub cover: CoverLevel,
    pub is_destructible: bool,
    pub hazard: Option<Hazard>,
}

impl TerrainFeature {
    pub fn new(id: u32, kind: TerrainKind, position: GridPosition) -> Self {
        Self {
            id,
            kind,
            position,
            blocks_movement: kind.blocks_movement(),
            blocks_vision: kind.blocks_vision(),
            cover: kind.cover(),
            is_destructible: kind.is_destructible(),
            hazard: kind.hazard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_blocks_everything() {
        assert!(TerrainKind::Wall.blocks_movement());
        assert!(TerrainKind::Wall.blocks_vision());
        assert_eq!(TerrainKind::Wall.cover(), CoverLevel::Full);
    }

    #[test]
    fn test_tree_covers_without_blocking_vision() {
        assert!(!TerrainKind::Tree.blocks_movement());
        assert!(!TerrainKind::Tree.blocks_vision());
        assert_eq!(TerrainKind::Tree.cover(), CoverLevel::ThreeQuarters);
    }

    #[test]
    fn test_rubble_grants_half_cover() {
        assert_eq!(TerrainKind::Rubble.cover(), CoverLevel::Half);
        assert!(!TerrainKind::Rubble.blocks_vision());
    }

    #[test]
    fn test_lava_is_a_hazard() {
        let hazard = TerrainKind::Lava.hazard().unwrap();
        assert_eq!(hazard.damage, DiceFormula::new(2, 6, 0));
        assert!(TerrainKind::Open.hazard().is_none());
    }

    #[test]
    fn test_cover_ordering() {
        assert!(CoverLevel::Full > CoverLevel::ThreeQuarters);
        assert!(CoverLevel::ThreeQuarters > CoverLevel::Half);
        assert!(CoverLevel::Half > CoverLevel::None);
    }

    #[test]
    fn test_feature_inherits_kind_flags() {
        let feature = TerrainFeature::new(1, TerrainKind::Wall, GridPosition::new(3, 3));
        assert!(feature.blocks_movement);
        assert!(feature.blocks_vision);
        assert_eq!(feature.cover, CoverLevel::Full);
        assert!(!feature.is_destructible);
    }
}
