//! Shortest-path search over the 6-connected voxel grid.
//!
//! A* with unit step cost and the Manhattan distance as heuristic. The
//! heuristic is admissible and consistent for face-adjacent moves, so the
//! first time the goal is popped its route is optimal. Ties between equal
//! f-scores are broken arbitrarily; only the route length is guaranteed.

use crate::coord::Coord;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Ordered route from start to goal inclusive. Empty means unreachable.
pub type Path = Vec<Coord>;

/// Finds a shortest route from `start` to `goal` through every passable cell.
///
/// `passable` is consulted for every cell the search wants to enter; the
/// start cell itself is never tested. Returns `[start]` when
/// `start == goal` and an empty path when the goal cannot be reached.
///
/// The grid is unbounded: with an open world and an unreachable goal the
/// search does not terminate. Callers exploring open space bound the
/// predicate themselves.
///
/// # Examples
///
/// ```
/// use minefleet_core::{Coord, pathfinder};
///
/// let start = Coord::new(0, 60, 0);
/// let goal = Coord::new(2, 60, 1);
/// let path = pathfinder::find_path(start, goal, |_| true);
/// assert_eq!(path.len(), 4);
/// assert_eq!(path.first(), Some(&start));
/// assert_eq!(path.last(), Some(&goal));
/// ```
pub fn find_path<F>(start: Coord, goal: Coord, passable: F) -> Path
where
    F: Fn(&Coord) -> bool,
{
    if start == goal {
        return vec![start];
    }

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<Coord, Coord> = HashMap::new();
    let mut g_score: HashMap<Coord, u64> = HashMap::new();

    g_score.insert(start, 0);
    open.push(Reverse((start.manhattan(&goal), 0u64, start)));

    while let Some(Reverse((_, g, current))) = open.pop() {
        if current == goal {
            return reconstruct(&came_from, goal);
        }
        // stale heap entry
        if g_score.get(&current).is_some_and(|&best| g > best) {
            continue;
        }

        for next in current.neighbors() {
            if next == current || !passable(&next) {
                continue;
            }
            let tentative = g + 1;
            if g_score.get(&next).is_none_or(|&best| tentative < best) {
                came_from.insert(next, current);
                g_score.insert(next, tentative);
                open.push(Reverse((tentative + next.manhattan(&goal), tentative, next)));
            }
        }
    }

    Vec::new()
}

/// Same as [`find_path`] with every cell passable.
pub fn find_open_path(start: Coord, goal: Coord) -> Path {
    find_path(start, goal, |_| true)
}

fn reconstruct(came_from: &HashMap<Coord, Coord>, goal: Coord) -> Path {
    let mut path = vec![goal];
    let mut cursor = goal;
    while let Some(&prev) = came_from.get(&cursor) {
        path.push(prev);
        cursor = prev;
    }
    path.reverse();
    path
}
