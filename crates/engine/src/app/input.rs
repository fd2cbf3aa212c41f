use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::tasks::{
    move_to_or_attack, PathFinder, StepOutcome, TaskError, TaskManager, Volition, WalkToCell,
    WorldView,
};

use super::{Cell, Direction8, UiPortion, UiState};

/// Player intents, already mapped from keys or pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Step(Direction8),
    GoTo(Cell),
    CancelTask,
    Idle,
    PickUp,
    ToggleAnimations,
    ToggleStatusBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    RequestPending,
    TaskActive,
    NoTask,
    AlreadyThere,
    NoPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored(IgnoreReason),
    Stepped(StepOutcome),
    TaskStarted,
    TaskCancelled,
    Idled,
    PickedUp,
    AnimationsToggled(bool),
    StatusBarToggled(bool),
}

pub struct InputContext<'a> {
    pub world: &'a dyn WorldView,
    pub volition: &'a mut dyn Volition,
    pub pathfinder: &'a dyn PathFinder,
    pub tasks: &'a mut TaskManager,
    pub config: &'a mut ClientConfig,
    pub ui: &'a mut UiState,
}

/// Applies one input action. Cancelling always goes through; everything else waits until the
/// simulation has answered the previous request.
pub fn route_input(
    action: InputAction,
    ctx: &mut InputContext<'_>,
) -> Result<InputOutcome, TaskError> {
    if action == InputAction::CancelTask {
        return Ok(match ctx.tasks.cancel() {
            Some(_) => InputOutcome::TaskCancelled,
            None => InputOutcome::Ignored(IgnoreReason::NoTask),
        });
    }
    if ctx.world.has_pending_request() {
        debug!(?action, "input_ignored_request_pending");
        return Ok(InputOutcome::Ignored(IgnoreReason::RequestPending));
    }

    match action {
        InputAction::ToggleAnimations => {
            ctx.config.toggle_animations();
            info!(enabled = ctx.config.animations_enabled, "animations_toggled");
            Ok(InputOutcome::AnimationsToggled(ctx.config.animations_enabled))
        }
        InputAction::ToggleStatusBar => {
            ctx.config.toggle_status_bar();
            ctx.ui.request_refresh(UiPortion::StatusBar);
            Ok(InputOutcome::StatusBarToggled(ctx.config.statusbar_enabled))
        }
        _ if ctx.tasks.has_task() => Ok(InputOutcome::Ignored(IgnoreReason::TaskActive)),
        InputAction::Step(direction) => {
            let (dx, dy) = direction.offset();
            let target = ctx.world.player_cell().offset(dx, dy);
            move_to_or_attack(ctx.world, ctx.volition, target).map(InputOutcome::Stepped)
        }
        InputAction::GoTo(destination) => go_to(destination, ctx),
        InputAction::Idle => {
            ctx.volition.idle();
            Ok(InputOutcome::Idled)
        }
        InputAction::PickUp => {
            ctx.volition.pick_up();
            Ok(InputOutcome::PickedUp)
        }
        InputAction::CancelTask => Ok(InputOutcome::Ignored(IgnoreReason::NoTask)),
    }
}

fn go_to(destination: Cell, ctx: &mut InputContext<'_>) -> Result<InputOutcome, TaskError> {
    let start = ctx.world.player_cell();
    if start == destination {
        return Ok(InputOutcome::Ignored(IgnoreReason::AlreadyThere));
    }
    let world = ctx.world;
    let passable = |cell: Cell| world.is_walkable_ignoring_characters(cell);
    let reachable = ctx
        .pathfinder
        .find_path(start, destination, &passable, ctx.config.path_search_budget)
        .is_some();
    if !reachable {
        debug!(x = destination.x, y = destination.y, "go_to_unreachable");
        return Ok(InputOutcome::Ignored(IgnoreReason::NoPath));
    }
    if ctx.tasks.try_set(Box::new(WalkToCell::new(destination))) {
        Ok(InputOutcome::TaskStarted)
    } else {
        Ok(InputOutcome::Ignored(IgnoreReason::TaskActive))
    }
}
