//! Procedural battlefield generation
//!
//! Grids are generated from a `(biome, seed)` pair and must reproduce
//! identically for the same inputs, so replays and bug reports can
//! rebuild the exact battlefield.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::grid::map::CombatGrid;
use crate::grid::position::GridPosition;
use crate::grid::terrain::{TerrainFeature, TerrainKind};

/// Fixed battlefield dimensions
pub const GRID_WIDTH: u32 = 20;
pub const GRID_HEIGHT: u32 = 20;

/// Rows covered by both deployment zones
const DEPLOY_ROWS: std::ops::RangeInclusive<i32> = 8..=11;
/// Chance that a placed cluster grows a one-cell extension
const CLUSTER_EXTENSION_CHANCE: f64 = 0.35;

/// Battlefield biomes, each with its own terrain palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    Grassland,
    Forest,
    Swamp,
    Cavern,
    Ruins,
    Volcanic,
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Biome::Grassland => "grassland",
            Biome::Forest => "forest",
            Biome::Swamp => "swamp",
            Biome::Cavern => "cavern",
            Biome::Ruins => "ruins",
            Biome::Volcanic => "volcanic",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Biome {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grassland" => Ok(Biome::Grassland),
            "forest" => Ok(Biome::Forest),
            "swamp" => Ok(Biome::Swamp),
            "cavern" => Ok(Biome::Cavern),
            "ruins" => Ok(Biome::Ruins),
            "volcanic" => Ok(Biome::Volcanic),
            other => Err(EngineError::InvalidConfig(format!("unknown biome: {other}"))),
        }
    }
}

/// How many clusters of a terrain kind a biome scatters
struct ClusterSpec {
    kind: TerrainKind,
    min: u32,
    max: u32,
}

fn palette(biome: Biome) -> Vec<ClusterSpec> {
    let spec = |kind, min, max| ClusterSpec { kind, min, max };
    match biome {
        Biome::Grassland => vec![
            spec(TerrainKind::Tree, 2, 4),
            spec(TerrainKind::Rubble, 1, 2),
            spec(TerrainKind::Difficult, 2, 4),
        ],
        Biome::Forest => vec![
            spec(TerrainKind::Tree, 6, 10),
            spec(TerrainKind::Difficult, 3, 5),
            spec(TerrainKind::Water, 0, 2),
        ],
        Biome::Swamp => vec![
            spec(TerrainKind::Water, 5, 8),
            spec(TerrainKind::Difficult, 4, 7),
            spec(TerrainKind::Tree, 2, 4),
        ],
        Biome::Cavern => vec![
            spec(TerrainKind::Wall, 5, 9),
            spec(TerrainKind::Rubble, 3, 6),
            spec(TerrainKind::Pit, 1, 3),
        ],
        Biome::Ruins => vec![
            spec(TerrainKind::Wall, 4, 7),
            spec(TerrainKind::Rubble, 4, 8),
            spec(TerrainKind::Difficult, 2, 4),
        ],
        Biome::Volcanic => vec![
            spec(TerrainKind::Lava, 3, 6),
            spec(TerrainKind::Rubble, 3, 5),
            spec(TerrainKind::Wall, 1, 3),
        ],
    }
}

/// FNV-1a hash, stable across platforms and releases
fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Generate a battlefield for the given biome and seed string
///
/// Identical inputs produce an identical grid.
pub fn generate(biome: Biome, seed: &str) -> CombatGrid {
    let mut rng = ChaCha8Rng::seed_from_u64(fnv1a(&format!("{biome}:{seed}")));
    let mut grid = CombatGrid::new(GRID_WIDTH, GRID_HEIGHT);

    // Deployment zones: player on the left columns, enemy on the right,
    // both kept clear of obstacles.
    for y in DEPLOY_ROWS {
        for x in 0..3 {
            grid.player_start_zone.push(GridPosition::new(x, y));
            grid.enemy_start_zone
                .push(GridPosition::new(GRID_WIDTH as i32 - 1 - x, y));
        }
    }

    let mut next_id = 0u32;
    for spec in palette(biome) {
        let count = rng.gen_range(spec.min..=spec.max);
        for _ in 0..count {
            // A few attempts per cluster; dense maps may simply place fewer.
            for _ in 0..10 {
                let pos = GridPosition::new(
                    rng.gen_range(0..GRID_WIDTH as i32),
                    rng.gen_range(0..GRID_HEIGHT as i32),
                );
                if is_reserved(&grid, pos) || grid.feature_at(pos).is_some() {
                    continue;
                }

                grid.add_feature(TerrainFeature::new(next_id, spec.kind, pos));
                next_id += 1;

                if rng.gen_bool(CLUSTER_EXTENSION_CHANCE) {
                    let neighbors = pos.neighbors();
                    let extension = neighbors[rng.gen_range(0..neighbors.len())];
                    if grid.is_within_bounds(extension)
                        && !is_reserved(&grid, extension)
                        && grid.feature_at(extension).is_none()
                    {
                        grid.add_feature(TerrainFeature::new(next_id, spec.kind, extension));
                        next_id += 1;
                    }
                }
                break;
            }
        }
    }

    tracing::debug!(
        biome = %biome,
        seed,
        features = grid.features.len(),
        "generated battlefield"
    );
    grid
}

fn is_reserved(grid: &CombatGrid, pos: GridPosition) -> bool {
    grid.player_start_zone.contains(&pos) || grid.enemy_start_zone.contains(&pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_same_inputs() {
        let a = generate(Biome::Forest, "winter-road");
        let b = generate(Biome::Forest, "winter-road");
        assert_eq!(a.features.len(), b.features.len());
        for (fa, fb) in a.features.iter().zip(&b.features) {
            assert_eq!(fa.position, fb.position);
            assert_eq!(fa.kind, fb.kind);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate(Biome::Forest, "alpha");
        let b = generate(Biome::Forest, "beta");
        let same = a.features.len() == b.features.len()
            && a.features
                .iter()
                .zip(&b.features)
                .all(|(fa, fb)| fa.position == fb.position && fa.kind == fb.kind);
        assert!(!same);
    }

    #[test]
    fn test_deployment_zones_clear() {
        for biome in [
            Biome::Grassland,
            Biome::Forest,
            Biome::Swamp,
            Biome::Cavern,
            Biome::Ruins,
            Biome::Volcanic,
        ] {
            let grid = generate(biome, "clear-check");
            for pos in grid
                .player_start_zone
                .iter()
                .chain(&grid.enemy_start_zone)
            {
                assert!(grid.feature_at(*pos).is_none(), "feature in zone at {pos}");
            }
        }
    }

    #[test]
    fn test_zone_shapes() {
        let grid = generate(Biome::Grassland, "zones");
        assert_eq!(grid.player_start_zone.len(), 12);
        assert_eq!(grid.enemy_start_zone.len(), 12);
        assert!(grid.player_start_zone.iter().all(|p| p.x <= 2));
        assert!(grid.enemy_start_zone.iter().all(|p| p.x >= 17));
    }

    #[test]
    fn test_features_in_bounds() {
        let grid = generate(Biome::Cavern, "bounds");
        for feature in &grid.features {
            assert!(grid.is_within_bounds(feature.position));
        }
    }

    #[test]
    fn test_biome_parse() {
        assert_eq!("Forest".parse::<Biome>().unwrap(), Biome::Forest);
        assert!("ocean".parse::<Biome>().is_err());
    }
}
