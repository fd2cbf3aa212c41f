mod manager;
mod nav;
mod walk;

use std::fmt;

use thiserror::Error;

use crate::app::{Cell, CharacterId, Direction8};

pub use manager::{TaskManager, TaskTick};
pub use nav::{GridPathfinder, PathFinder};
pub use walk::{move_to_or_attack, StepOutcome, WalkState, WalkToCell};

/// Character standing in a cell, as seen by the controlled character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub id: CharacterId,
    pub hostile: bool,
}

/// Read-only view of the simulation from the controlled character's side.
pub trait WorldView {
    fn player_cell(&self) -> Cell;
    fn can_step_on(&self, cell: Cell) -> bool;
    fn occupant(&self, cell: Cell) -> Option<Occupant>;
    /// Terrain passability only; other characters do not block.
    fn is_walkable_ignoring_characters(&self, cell: Cell) -> bool;
    fn is_under_threat(&self) -> bool;
    fn has_pending_request(&self) -> bool;
}

/// Requests the controlled character can send to the simulation.
pub trait Volition {
    fn step(&mut self, direction: Direction8);
    fn attack(&mut self, target: CharacterId);
    fn idle(&mut self);
    fn pick_up(&mut self);
}

pub struct TaskContext<'a> {
    pub world: &'a dyn WorldView,
    pub volition: &'a mut dyn Volition,
    pub pathfinder: &'a dyn PathFinder,
    pub search_budget: u32,
}

/// Multi-tick player intent, advanced one step at a time.
pub trait Task: fmt::Debug {
    fn label(&self) -> &'static str;
    fn ended(&self, world: &dyn WorldView) -> bool;
    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), TaskError>;
    fn cancel(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("no active task to tick")]
    NoActiveTask,
    #[error("step from ({}, {}) to ({}, {}) is not a unit step", from.x, from.y, to.x, to.y)]
    NonAdjacentStep { from: Cell, to: Cell },
    #[error("cell ({}, {}) is held by friendly character {}", cell.x, cell.y, occupant.0)]
    FriendlyOccupant { cell: Cell, occupant: CharacterId },
    #[error("cell ({}, {}) can be neither entered nor attacked", cell.x, cell.y)]
    BlockedStep { cell: Cell },
}
