//! A* pathfinding over 8-way adjacency
//!
//! Uniform step cost: a diagonal step costs the same as an orthogonal
//! one, matching Chebyshev distance. The goal cell is exempt from the
//! walkability check so a path can end adjacent to (or on) an otherwise
//! blocked destination.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};

use crate::grid::map::CombatGrid;
use crate::grid::position::GridPosition;

/// Node in the A* open set
#[derive(Debug, Clone, Copy)]
struct PathNode {
    pos: GridPosition,
    f_cost: u32,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost == other.f_cost
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.f_cost.cmp(&self.f_cost)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the shortest path from start to goal, inclusive of both
///
/// `occupied` lists cells held by living combatants (the mover's own
/// cell excluded by the caller). Returns None when no path exists.
pub fn find_path(
    grid: &CombatGrid,
    start: GridPosition,
    goal: GridPosition,
    occupied: &[GridPosition],
) -> Option<Vec<GridPosition>> {
    if !grid.is_within_bounds(start) || !grid.is_within_bounds(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let occupied: AHashSet<GridPosition> = occupied.iter().copied().collect();
    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<GridPosition, GridPosition> = AHashMap::new();
    let mut g_scores: AHashMap<GridPosition, u32> = AHashMap::new();

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        pos: start,
        f_cost: start.distance(&goal),
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            return Some(reconstruct_path(&came_from, current.pos));
        }

        let current_g = *g_scores.get(&current.pos).unwrap_or(&u32::MAX);

        for neighbor in current.pos.neighbors() {
            if !grid.is_within_bounds(neighbor) {
                continue;
            }
            // The goal cell itself is always enterable; everything else
            // must be clear of blocking features and occupants.
            if neighbor != goal {
                if grid.feature_at(neighbor).is_some_and(|f| f.blocks_movement) {
                    continue;
                }
                if occupied.contains(&neighbor) {
                    continue;
                }
            }

            let tentative_g = current_g + 1;
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.pos);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    pos: neighbor,
                    f_cost: tentative_g + neighbor.distance(&goal),
                });
            }
        }
    }

    None
}

/// Reconstruct path from the came_from map
fn reconstruct_path(
    came_from: &AHashMap<GridPosition, GridPosition>,
    mut current: GridPosition,
) -> Vec<GridPosition> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
