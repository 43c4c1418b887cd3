//! Lazy distance-ordered search over the map for one unit type.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use statecraft_protocol::UnitTypeId;

use crate::game::GameState;
use crate::rules::UnitClass;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub tile: usize,
    /// Whole turns needed to get here.
    pub turns: i32,
    /// Total move points spent.
    pub cost: i32,
}

/// Dijkstra from a start tile, yielding reachable tiles in non-decreasing
/// cost. Stops as soon as the next tile would take more than `max_turns`.
pub struct PathIter<'a> {
    state: &'a GameState,
    class: UnitClass,
    move_rate: i32,
    max_turns: i32,
    best: Vec<i32>,
    done: Vec<bool>,
    open: BinaryHeap<Reverse<(i32, usize)>>,
}

impl<'a> PathIter<'a> {
    pub fn new(state: &'a GameState, unit_type: UnitTypeId, start: usize, max_turns: i32) -> Self {
        let t = state.rules.unit_type(unit_type);
        let len = state.map.len();
        let mut best = vec![i32::MAX; len];
        let mut open = BinaryHeap::new();
        if start < len {
            best[start] = 0;
            open.push(Reverse((0, start)));
        }
        Self {
            state,
            class: t.class,
            move_rate: t.move_rate.max(1),
            max_turns,
            best,
            done: vec![false; len],
            open,
        }
    }

    fn can_enter(&self, tile: usize) -> bool {
        let ocean = self.state.map.is_ocean(tile, &self.state.rules);
        match self.class {
            UnitClass::Land => !ocean,
            UnitClass::Sea => ocean || self.state.map.tile(tile).city.is_some(),
            UnitClass::Air | UnitClass::Missile => true,
        }
    }

    fn step_cost(&self, tile: usize) -> i32 {
        match self.class {
            UnitClass::Land => self.state.rules.terrain(self.state.map.tile(tile).terrain).move_cost,
            _ => 1,
        }
    }
}

impl Iterator for PathIter<'_> {
    type Item = PathStep;

    fn next(&mut self) -> Option<PathStep> {
        while let Some(Reverse((cost, tile))) = self.open.pop() {
            if self.done[tile] || cost > self.best[tile] {
                continue;
            }
            let turns = cost / self.move_rate;
            if turns > self.max_turns {
                self.open.clear();
                return None;
            }
            self.done[tile] = true;
            let neighbors: Vec<usize> = self.state.map.neighbors_indices(tile).collect();
            for n in neighbors {
                if self.done[n] || !self.can_enter(n) {
                    continue;
                }
                let next = cost + self.step_cost(n);
                if next < self.best[n] {
                    self.best[n] = next;
                    self.open.push(Reverse((next, n)));
                }
            }
            return Some(PathStep { tile, turns, cost });
        }
        None
    }
}

/// Turns for `unit_type` to walk from `from` to `to`, if within `max_turns`.
pub fn turns_between(
    state: &GameState,
    unit_type: UnitTypeId,
    from: usize,
    to: usize,
    max_turns: i32,
) -> Option<i32> {
    PathIter::new(state, unit_type, from, max_turns)
        .find(|s| s.tile == to)
        .map(|s| s.turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;
    use statecraft_protocol::Hex;

    #[test]
    fn steps_come_out_in_cost_order() {
        let state = testkit::state(8, 8);
        let warriors = state.rules.unit_type_id("warriors").unwrap();
        let start = state.map.index_of(Hex::new(4, 4)).unwrap();
        let costs: Vec<i32> = PathIter::new(&state, warriors, start, 2).map(|s| s.cost).collect();
        assert!(costs.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(costs[0], 0);
        assert!(costs.iter().all(|&c| c <= 2));
    }

    #[test]
    fn land_units_stop_at_water() {
        let mut state = testkit::state(6, 1);
        let ocean = state.rules.terrain_id("ocean").unwrap();
        state.map.set_terrain(3, ocean);
        let warriors = state.rules.unit_type_id("warriors").unwrap();
        assert_eq!(turns_between(&state, warriors, 0, 2, 10), Some(2));
        assert_eq!(turns_between(&state, warriors, 0, 5, 10), None);
    }
}
