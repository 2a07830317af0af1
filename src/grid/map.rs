//! Combat grid with bounds, walkability, line-of-sight, and cover
//!
//! The grid is a static spatial index: features never move once placed,
//! and the orchestrator owns the grid for the lifetime of one encounter.

use serde::{Deserialize, Serialize};

use crate::grid::position::GridPosition;
use crate::grid::terrain::{CoverLevel, TerrainFeature};

/// The battlefield grid for one encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatGrid {
    pub width: u32,
    pub height: u32,
    pub features: Vec<TerrainFeature>,
    pub player_start_zone: Vec<GridPosition>,
    pub enemy_start_zone: Vec<GridPosition>,
}

impl CombatGrid {
    /// Create an empty grid with no features
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            features: Vec::new(),
            player_start_zone: Vec::new(),
            enemy_start_zone: Vec::new(),
        }
    }

    pub fn is_within_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    /// The feature occupying a cell, if any (one feature per cell)
    pub fn feature_at(&self, pos: GridPosition) -> Option<&TerrainFeature> {
        self.features.iter().find(|f| f.position == pos)
    }

    /// Place a feature; ignored if the cell already holds one
    pub fn add_feature(&mut self, feature: TerrainFeature) {
        if self.is_within_bounds(feature.position) && self.feature_at(feature.position).is_none() {
            self.features.push(feature);
        }
    }

    /// Can a combatant stand on this cell?
    ///
    /// False when out of bounds, when a blocking feature occupies the
    /// cell, or when a living occupant already stands there.
    pub fn is_walkable(&self, pos: GridPosition, occupied: &[GridPosition]) -> bool {
        if !self.is_within_bounds(pos) {
            return false;
        }
        if self.feature_at(pos).is_some_and(|f| f.blocks_movement) {
            return false;
        }
        !occupied.contains(&pos)
    }

    /// Chebyshev distance between two cells
    pub fn distance(&self, a: GridPosition, b: GridPosition) -> u32 {
        a.distance(&b)
    }

    /// Line of sight between two cells
    ///
    /// Blocked when any intermediate cell on the Bresenham line
    /// (endpoints excluded) holds a vision-blocking feature.
    pub fn has_line_of_sight(&self, a: GridPosition, b: GridPosition) -> bool {
        let line = a.line_to(&b);
        for pos in line.iter().skip(1).take(line.len().saturating_sub(2)) {
            if self.feature_at(*pos).is_some_and(|f| f.blocks_vision) {
                return false;
            }
        }
        true
    }

    /// Cover the target has against the observer
    ///
    /// Walks the sight line accumulating a cover score: a full-cover
    /// feature grants Full outright, three-quarters adds 2, half adds 1.
    /// A blocked sight line is always Full.
    pub fn cover_between(&self, observer: GridPosition, target: GridPosition) -> CoverLevel {
        if !self.has_line_of_sight(observer, target) {
            return CoverLevel::Full;
        }

        let line = observer.line_to(&target);
        let mut score = 0u32;
        for pos in line.iter().skip(1).take(line.len().saturating_sub(2)) {
            match self.feature_at(*pos).map(|f| f.cover) {
                Some(CoverLevel::Full) => return CoverLevel::Full,
                Some(CoverLevel::ThreeQuarters) => score += 2,
                Some(CoverLevel::Half) => score += 1,
                _ => {}
            }
        }

        if score >= 2 {
            CoverLevel::ThreeQuarters
        } else if score >= 1 {
            CoverLevel::Half
        } else {
            CoverLevel::None
        }
    }
}
