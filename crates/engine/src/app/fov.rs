use std::collections::{HashMap, HashSet};

use super::scene::{Cell, PlaneLevel};
use crate::events::{ItemRef, RenderCell};

/// What the player sees on the active plane, plus what they remember of it.
#[derive(Debug, Clone, Default)]
pub struct FieldOfView {
    level: PlaneLevel,
    seen: HashSet<Cell>,
    remembered: HashMap<Cell, RenderCell>,
    unseen_items: HashMap<Cell, Vec<ItemRef>>,
}

impl FieldOfView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all state for `level` and marks `seen` visible.
    pub fn init(&mut self, level: PlaneLevel, seen: &[RenderCell]) {
        self.level = level;
        self.seen.clear();
        self.remembered.clear();
        self.unseen_items.clear();
        for cell in seen {
            self.see_cell(*cell);
        }
    }

    pub fn level(&self) -> PlaneLevel {
        self.level
    }

    pub fn see_cell(&mut self, cell: RenderCell) {
        self.seen.insert(cell.cell);
        self.remembered.insert(cell.cell, cell);
    }

    /// The cell stays remembered but stops being visible.
    pub fn unsee_cell(&mut self, cell: Cell) -> bool {
        self.seen.remove(&cell)
    }

    pub fn unsee_all(&mut self) {
        self.seen.clear();
    }

    pub fn is_seen(&self, cell: Cell) -> bool {
        self.seen.contains(&cell)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn remembered(&self, cell: Cell) -> Option<&RenderCell> {
        self.remembered.get(&cell)
    }

    pub fn remember_unseen_item(&mut self, cell: Cell, item: ItemRef) {
        self.unseen_items.entry(cell).or_default().push(item);
    }

    pub fn has_unseen_items(&self, cell: Cell) -> bool {
        self.unseen_items
            .get(&cell)
            .is_some_and(|items| !items.is_empty())
    }

    pub fn unseen_items(&self, cell: Cell) -> &[ItemRef] {
        self.unseen_items
            .get(&cell)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn remove_unseen_items(&mut self, cell: Cell) -> Vec<ItemRef> {
        self.unseen_items.remove(&cell).unwrap_or_default()
    }
}
