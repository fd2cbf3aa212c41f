use std::collections::{HashMap, HashSet};

use crate::app::{Cell, Direction8};

/// Bounded path search between two cells.
pub trait PathFinder {
    /// Cells to walk through from `start` to `goal`, excluding `start`. `None` when the goal
    /// is unreachable or `max_steps` node expansions were not enough.
    fn find_path(
        &self,
        start: Cell,
        goal: Cell,
        passable: &dyn Fn(Cell) -> bool,
        max_steps: u32,
    ) -> Option<Vec<Cell>>;
}

/// A* over the eight-neighbourhood with unit step cost and Chebyshev heuristic.
/// Ties prefer nodes closer to the goal in straight-line distance, then the lowest row and column.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridPathfinder;

impl PathFinder for GridPathfinder {
    fn find_path(
        &self,
        start: Cell,
        goal: Cell,
        passable: &dyn Fn(Cell) -> bool,
        max_steps: u32,
    ) -> Option<Vec<Cell>> {
        if start == goal {
            return Some(Vec::new());
        }
        if !passable(goal) {
            return None;
        }

        let mut closed: HashSet<Cell> = HashSet::new();
        let mut best_g: HashMap<Cell, u32> = HashMap::new();
        let mut parent: HashMap<Cell, Cell> = HashMap::new();
        let mut open = Vec::new();
        let mut next_insertion = 0u64;
        let mut expansions = 0u32;

        let start_h = start.chebyshev_distance(goal);
        open.push(OpenNode {
            cell: start,
            h_cost: start_h,
            f_cost: start_h,
            straight: squared_distance(start, goal),
            insertion_order: next_insertion,
        });
        next_insertion = next_insertion.saturating_add(1);
        best_g.insert(start, 0);

        while !open.is_empty() {
            let best_index = pick_best_open_node_index(&open);
            let current = open.swap_remove(best_index);
            if !closed.insert(current.cell) {
                continue;
            }
            if current.cell == goal {
                return reconstruct_path(&parent, start, goal);
            }
            if expansions >= max_steps {
                return None;
            }
            expansions = expansions.saturating_add(1);

            let current_g = best_g.get(&current.cell).copied().unwrap_or(u32::MAX);
            for direction in Direction8::ALL {
                let (dx, dy) = direction.offset();
                let neighbor = current.cell.offset(dx, dy);
                if closed.contains(&neighbor) || !passable(neighbor) {
                    continue;
                }
                let tentative_g = current_g.saturating_add(1);
                if tentative_g >= best_g.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    continue;
                }
                best_g.insert(neighbor, tentative_g);
                parent.insert(neighbor, current.cell);
                let h_cost = neighbor.chebyshev_distance(goal);
                open.push(OpenNode {
                    cell: neighbor,
                    h_cost,
                    f_cost: tentative_g.saturating_add(h_cost),
                    straight: squared_distance(neighbor, goal),
                    insertion_order: next_insertion,
                });
                next_insertion = next_insertion.saturating_add(1);
            }
        }

        None
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    cell: Cell,
    h_cost: u32,
    f_cost: u32,
    straight: u64,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, u64, i32, i32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.straight,
        node.cell.y,
        node.cell.x,
        node.insertion_order,
    )
}

fn squared_distance(a: Cell, b: Cell) -> u64 {
    let dx = u64::from(a.x.abs_diff(b.x));
    let dy = u64::from(a.y.abs_diff(b.y));
    dx * dx + dy * dy
}

fn reconstruct_path(parent: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
    let mut cursor = goal;
    let mut cells = vec![cursor];
    while cursor != start {
        cursor = *parent.get(&cursor)?;
        if cursor != start {
            cells.push(cursor);
        }
    }
    cells.reverse();
    Some(cells)
}
