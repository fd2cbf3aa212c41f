use tracing::debug;

use crate::app::{Cell, CharacterId, Direction8};

use super::{Task, TaskContext, TaskError, Volition, WorldView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved(Direction8),
    Attacked(CharacterId),
}

/// Steps into `target`, or attacks the hostile character standing there.
/// `target` must be one of the eight cells around the controlled character.
pub fn move_to_or_attack(
    world: &dyn WorldView,
    volition: &mut dyn Volition,
    target: Cell,
) -> Result<StepOutcome, TaskError> {
    let from = world.player_cell();
    let Some(direction) = from.direction_to(target) else {
        return Err(TaskError::NonAdjacentStep { from, to: target });
    };
    if world.can_step_on(target) {
        volition.step(direction);
        return Ok(StepOutcome::Moved(direction));
    }
    match world.occupant(target) {
        Some(occupant) if occupant.hostile => {
            volition.attack(occupant.id);
            Ok(StepOutcome::Attacked(occupant.id))
        }
        Some(occupant) => Err(TaskError::FriendlyOccupant {
            cell: target,
            occupant: occupant.id,
        }),
        None => Err(TaskError::BlockedStep { cell: target }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Planning,
    Stepping { next: Cell },
    Ended,
    Cancelled,
}

/// Walks the controlled character to a fixed cell, replanning before every step.
#[derive(Debug, Clone)]
pub struct WalkToCell {
    destination: Cell,
    state: WalkState,
    forced_end: bool,
    steps_taken: u32,
}

impl WalkToCell {
    pub fn new(destination: Cell) -> Self {
        Self {
            destination,
            state: WalkState::Planning,
            forced_end: false,
            steps_taken: 0,
        }
    }

    pub fn destination(&self) -> Cell {
        self.destination
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }
}

impl Task for WalkToCell {
    fn label(&self) -> &'static str {
        "walk_to_cell"
    }

    fn ended(&self, world: &dyn WorldView) -> bool {
        self.forced_end || world.player_cell() == self.destination
    }

    fn execute(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
        self.state = WalkState::Planning;
        let world = ctx.world;
        let start = world.player_cell();
        let passable = |cell: Cell| world.is_walkable_ignoring_characters(cell);
        let Some(path) =
            ctx.pathfinder
                .find_path(start, self.destination, &passable, ctx.search_budget)
        else {
            debug!(
                x = self.destination.x,
                y = self.destination.y,
                "walk_path_lost"
            );
            self.forced_end = true;
            self.state = WalkState::Ended;
            return Ok(());
        };
        let Some(next) = path.first().copied() else {
            self.state = WalkState::Ended;
            return Ok(());
        };

        self.state = WalkState::Stepping { next };
        move_to_or_attack(world, ctx.volition, next)?;
        self.steps_taken = self.steps_taken.saturating_add(1);
        Ok(())
    }

    fn cancel(&mut self) {
        self.forced_end = true;
        self.state = WalkState::Cancelled;
    }
}
