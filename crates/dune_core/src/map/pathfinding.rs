//! Grid pathfinding using the A* algorithm.
//!
//! Costs are integers (10 per straight step, 14 per diagonal) so results
//! are identical on every machine. Ties in the open set break on tile
//! coordinates, never on insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Map, MoveClass};
use crate::coord::Coord;

/// Upper bound on expanded nodes for one search.
pub const MAX_EXPANDED_NODES: usize = 8192;

const STRAIGHT_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: Coord,
    /// g + h
    f_score: u32,
    /// Lower coordinates first when scores tie.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest f first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Octile distance, admissible for 8-directional movement.
#[inline]
fn octile_heuristic(a: Coord, b: Coord) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    let (min, max) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * min + STRAIGHT_COST * (max - min)
}

#[inline]
fn coords_to_tie_breaker(pos: Coord) -> u64 {
    ((pos.y as u64) << 32) | (pos.x as u32 as u64)
}

/// Find a path from `start` to `goal` for a unit of `class`.
///
/// `is_blocked` reports tiles that objects make impassable; terrain is
/// checked here. The goal itself is always treated as enterable so units
/// can path onto the tile of a target. Diagonal steps may not cut corners.
///
/// Returns the tiles to walk, excluding `start`. When the goal cannot be
/// reached, the path leads to the explored tile closest to it. Returns
/// `None` when no step at all is possible.
#[must_use]
pub fn find_path(
    map: &Map,
    class: MoveClass,
    start: Coord,
    goal: Coord,
    is_blocked: impl Fn(Coord) -> bool,
) -> Option<Vec<Coord>> {
    if !map.contains(start) || !map.contains(goal) || start == goal {
        return None;
    }

    let passable = |pos: Coord| -> bool {
        map.terrain(pos).is_some_and(|t| class.allows_terrain(t)) && (pos == goal || !is_blocked(pos))
    };

    let tile_count = map.tile_count() as usize;
    let index = |pos: Coord| (pos.y * map.width() + pos.x) as usize;
    let mut g_score = vec![u32::MAX; tile_count];
    let mut came_from: Vec<Option<Coord>> = vec![None; tile_count];
    let mut closed = vec![false; tile_count];
    let mut open_set = BinaryHeap::new();

    g_score[index(start)] = 0;
    open_set.push(AStarNode {
        pos: start,
        f_score: octile_heuristic(start, goal),
        tie_breaker: coords_to_tie_breaker(start),
    });

    let mut best = (octile_heuristic(start, goal), start);
    let mut expanded = 0;

    while let Some(current) = open_set.pop() {
        let current_index = index(current.pos);
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;

        if current.pos == goal {
            return Some(reconstruct_path(&came_from, index, start, goal));
        }

        expanded += 1;
        if expanded > MAX_EXPANDED_NODES {
            break;
        }

        let h = octile_heuristic(current.pos, goal);
        if h < best.0 {
            best = (h, current.pos);
        }

        let current_g = g_score[current_index];
        for &(dx, dy) in &DIRECTIONS {
            let next = Coord::new(current.pos.x + dx, current.pos.y + dy);
            if !map.contains(next) || !passable(next) {
                continue;
            }

            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && (!passable(Coord::new(current.pos.x + dx, current.pos.y))
                    || !passable(Coord::new(current.pos.x, current.pos.y + dy)))
            {
                continue;
            }

            let step = if diagonal { DIAGONAL_COST } else { STRAIGHT_COST };
            let tentative_g = current_g.saturating_add(step);
            let next_index = index(next);
            if tentative_g < g_score[next_index] {
                came_from[next_index] = Some(current.pos);
                g_score[next_index] = tentative_g;
                open_set.push(AStarNode {
                    pos: next,
                    f_score: tentative_g + octile_heuristic(next, goal),
                    tie_breaker: coords_to_tie_breaker(next),
                });
            }
        }
    }

    if best.1 == start {
        return None;
    }
    Some(reconstruct_path(&came_from, index, start, best.1))
}

fn reconstruct_path(
    came_from: &[Option<Coord>],
    index: impl Fn(Coord) -> usize,
    start: Coord,
    end: Coord,
) -> Vec<Coord> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(prev) = came_from[index(current)] {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Rules;
    use crate::map::TerrainType;

    fn rules() -> Rules {
        Rules::standard().expect("rules")
    }

    #[test]
    fn test_straight_path() {
        let map = Map::new(10, 10);
        let path = find_path(&map, MoveClass::Vehicle, Coord::new(0, 0), Coord::new(4, 0), |_| false)
            .expect("open map");
        assert_eq!(path.len(), 4);
        assert_eq!(path.last(), Some(&Coord::new(4, 0)));
        assert!(!path.contains(&Coord::new(0, 0)));
    }

    #[test]
    fn test_path_around_mountain() {
        let rules = rules();
        let mut map = Map::new(10, 10);
        map.fill_terrain(Coord::new(5, 0), Coord::new(5, 8), TerrainType::Mountain, &rules);
        let path = find_path(&map, MoveClass::Vehicle, Coord::new(2, 2), Coord::new(8, 2), |_| false)
            .expect("gap at the bottom");
        assert_eq!(path.last(), Some(&Coord::new(8, 2)));
        assert!(path.iter().all(|p| map.terrain(*p) != Some(TerrainType::Mountain)));

        // Infantry climbs straight over.
        let direct = find_path(&map, MoveClass::Infantry, Coord::new(2, 2), Coord::new(8, 2), |_| false)
            .expect("infantry path");
        assert_eq!(direct.len(), 6);
    }

    #[test]
    fn test_unreachable_goal_gets_closest() {
        let rules = rules();
        let mut map = Map::new(10, 10);
        map.fill_terrain(Coord::new(5, 0), Coord::new(5, 9), TerrainType::Mountain, &rules);
        let path = find_path(&map, MoveClass::Vehicle, Coord::new(1, 4), Coord::new(8, 4), |_| false)
            .expect("partial path");
        assert_eq!(path.last(), Some(&Coord::new(4, 4)));
    }

    #[test]
    fn test_goal_is_always_enterable() {
        let map = Map::new(6, 6);
        let goal = Coord::new(3, 3);
        let path = find_path(&map, MoveClass::Vehicle, Coord::new(0, 3), goal, |p| p == goal)
            .expect("goal enterable");
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_no_corner_cutting() {
        let map = Map::new(3, 3);
        let blocked = [Coord::new(1, 0), Coord::new(0, 1)];
        let path = find_path(&map, MoveClass::Vehicle, Coord::new(0, 0), Coord::new(1, 1), |p| {
            blocked.contains(&p)
        });
        assert!(path.is_none());
    }

    #[test]
    fn test_determinism() {
        let map = Map::new(20, 20);
        let a = find_path(&map, MoveClass::Vehicle, Coord::new(0, 0), Coord::new(15, 9), |_| false);
        let b = find_path(&map, MoveClass::Vehicle, Coord::new(0, 0), Coord::new(15, 9), |_| false);
        assert_eq!(a, b);
    }
}
