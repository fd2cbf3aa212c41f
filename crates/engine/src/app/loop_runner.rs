use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::events::{
    translate, Event, EventInbox, EventScheduler, FrameReport, PresentationContext, ProtocolError,
};
use crate::tasks::{GridPathfinder, TaskContext, TaskError, TaskManager, TaskTick, Volition, WorldView};

use super::input::{route_input, InputAction, InputContext, InputOutcome};
use super::metrics::MetricsAccumulator;
use super::{FieldOfView, MetricsHandle, Stage, UiState};

const METRICS_INTERVAL: Duration = Duration::from_secs(1);

/// What happened during one call to [`ClientLoop::frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub report: FrameReport,
    /// `None` when no task was due this frame.
    pub task: Option<Result<TaskTick, TaskError>>,
}

/// Owns the presentation state and drives it one frame at a time.
#[derive(Debug)]
pub struct ClientLoop {
    config: ClientConfig,
    stage: Stage,
    fov: FieldOfView,
    ui: UiState,
    scheduler: EventScheduler,
    tasks: TaskManager,
    inbox: EventInbox,
    pathfinder: GridPathfinder,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
}

impl ClientLoop {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_metrics(config, MetricsHandle::default())
    }

    pub fn with_metrics(config: ClientConfig, metrics_handle: MetricsHandle) -> Self {
        info!(
            animations = config.animations_enabled,
            path_search_budget = config.path_search_budget,
            stall_warning_frames = config.stall_warning_frames,
            protocol_policy = ?config.protocol_policy,
            "client_loop_config"
        );
        Self {
            stage: Stage::new(),
            fov: FieldOfView::new(),
            ui: UiState::new(config.message_log_capacity),
            scheduler: EventScheduler::new(config.stall_warning_frames),
            tasks: TaskManager::new(),
            inbox: EventInbox::new(config.protocol_policy),
            pathfinder: GridPathfinder,
            metrics: MetricsAccumulator::new(METRICS_INTERVAL),
            metrics_handle,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn fov(&self) -> &FieldOfView {
        &self.fov
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiState {
        &mut self.ui
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn metrics_handle(&self) -> &MetricsHandle {
        &self.metrics_handle
    }

    /// Queues the presentation of `event` behind everything already queued.
    pub fn push_event(&mut self, event: Event) -> u64 {
        self.scheduler.enqueue(translate(event))
    }

    /// Decodes one wire payload and queues it. `Ok(None)` when the inbox skipped it.
    pub fn receive_raw(&mut self, raw: &str) -> Result<Option<u64>, ProtocolError> {
        Ok(self.inbox.receive(raw)?.map(|event| self.push_event(event)))
    }

    pub fn handle_input(
        &mut self,
        action: InputAction,
        world: &dyn WorldView,
        volition: &mut dyn Volition,
    ) -> Result<InputOutcome, TaskError> {
        let mut ctx = InputContext {
            world,
            volition,
            pathfinder: &self.pathfinder,
            tasks: &mut self.tasks,
            config: &mut self.config,
            ui: &mut self.ui,
        };
        route_input(action, &mut ctx)
    }

    /// Advances animations by `dt` seconds, steps the active task when the presentation has
    /// caught up, then starts queued actions.
    pub fn frame(
        &mut self,
        dt: f32,
        world: &dyn WorldView,
        volition: &mut dyn Volition,
    ) -> FrameSummary {
        for signal in self.stage.act(dt, &self.fov) {
            if let Err(error) = self.scheduler.route(signal) {
                warn!(?signal, error = %error, "scheduler_signal_rejected");
            }
        }

        let task = self.tick_task(world, volition);

        let mut ctx = PresentationContext {
            stage: &mut self.stage,
            fov: &mut self.fov,
            ui: &mut self.ui,
            config: &self.config,
        };
        let report = self.scheduler.run_frame(&mut ctx);

        self.metrics
            .record_frame(Duration::from_secs_f32(dt.max(0.0)), &report);
        if let Some(snapshot) = self.metrics.maybe_snapshot() {
            debug!(
                fps = snapshot.fps,
                frame_time_ms = snapshot.frame_time_ms,
                actions_started = snapshot.actions_started,
                actions_completed = snapshot.actions_completed,
                queue_depth = snapshot.queue_depth,
                "presentation_metrics"
            );
            self.metrics_handle.publish(snapshot);
        }

        FrameSummary { report, task }
    }

    fn tick_task(
        &mut self,
        world: &dyn WorldView,
        volition: &mut dyn Volition,
    ) -> Option<Result<TaskTick, TaskError>> {
        let due = self.tasks.has_task() && self.scheduler.is_idle() && !world.has_pending_request();
        if !due {
            return None;
        }
        let mut ctx = TaskContext {
            world,
            volition,
            pathfinder: &self.pathfinder,
            search_budget: self.config.path_search_budget,
        };
        let result = self.tasks.tick(&mut ctx);
        if matches!(result, Ok(TaskTick::Stepped | TaskTick::Interrupted)) {
            self.metrics.record_task_step();
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Cell, CharacterId, Direction8};
    use crate::events::{CharacterSnapshot, MovingStyle};
    use crate::tasks::Occupant;

    struct Open {
        player: Cell,
        pending: bool,
    }

    impl WorldView for Open {
        fn player_cell(&self) -> Cell {
            self.player
        }

        fn can_step_on(&self, _cell: Cell) -> bool {
            true
        }

        fn occupant(&self, _cell: Cell) -> Option<Occupant> {
            None
        }

        fn is_walkable_ignoring_characters(&self, _cell: Cell) -> bool {
            true
        }

        fn is_under_threat(&self) -> bool {
            false
        }

        fn has_pending_request(&self) -> bool {
            self.pending
        }
    }

    #[derive(Default)]
    struct Steps(Vec<Direction8>);

    impl Volition for Steps {
        fn step(&mut self, direction: Direction8) {
            self.0.push(direction);
        }
        fn attack(&mut self, _target: CharacterId) {}
        fn idle(&mut self) {}
        fn pick_up(&mut self) {}
    }

    fn player_move(from: Cell, to: Cell) -> Event {
        Event::Move {
            character: CharacterSnapshot {
                id: CharacterId(1),
                cell: to,
                is_player: true,
                humanoid: true,
            },
            from,
            to,
            style: MovingStyle::Step,
        }
    }

    #[test]
    fn task_waits_for_presentation_to_drain() {
        let mut client = ClientLoop::new(ClientConfig::default());
        let world = Open {
            player: Cell::new(0, 0),
            pending: false,
        };
        let mut volition = Steps::default();
        client
            .handle_input(InputAction::GoTo(Cell::new(3, 0)), &world, &mut volition)
            .expect("go to");

        client.push_event(player_move(Cell::new(0, 0), Cell::new(0, 0)));
        // Task is not due while the scheduler still has work.
        let first = client.frame(0.016, &world, &mut volition);
        assert_eq!(first.task, None);
        assert_eq!(first.report.started, 1);

        let second = client.frame(0.016, &world, &mut volition);
        assert_eq!(second.task, Some(Ok(TaskTick::Stepped)));
        assert_eq!(volition.0, vec![Direction8::East]);
    }

    #[test]
    fn pending_request_holds_task() {
        let mut client = ClientLoop::new(ClientConfig::default());
        let mut world = Open {
            player: Cell::new(0, 0),
            pending: false,
        };
        let mut volition = Steps::default();
        client
            .handle_input(InputAction::GoTo(Cell::new(2, 2)), &world, &mut volition)
            .expect("go to");
        world.pending = true;
        assert_eq!(client.frame(0.016, &world, &mut volition).task, None);
        assert!(volition.0.is_empty());
    }

    #[test]
    fn animated_move_completes_after_tween_runs_out() {
        let config = ClientConfig {
            animations_enabled: true,
            ..ClientConfig::default()
        };
        let mut client = ClientLoop::new(config);
        let world = Open {
            player: Cell::new(1, 0),
            pending: false,
        };
        let mut volition = Steps::default();
        client.push_event(player_move(Cell::new(0, 0), Cell::new(1, 0)));

        let started = client.frame(0.0, &world, &mut volition);
        assert_eq!(started.report.started, 1);
        assert!(started.report.in_flight);

        let finished = client.frame(0.5, &world, &mut volition);
        assert_eq!(finished.report.completed, 1);
        assert!(!finished.report.in_flight);
        assert_eq!(
            client.stage().character_cell(CharacterId(1)),
            Some(Cell::new(1, 0))
        );
    }

    #[test]
    fn raw_payloads_are_decoded_and_queued() {
        let mut client = ClientLoop::new(ClientConfig::default());
        let raw = r#"{"kind": "explosion", "cell": {"x": 4, "y": 1}}"#;
        assert_eq!(client.receive_raw(raw).expect("decode"), Some(0));
        assert_eq!(client.scheduler().queue_depth(), 1);
    }
}
