use std::sync::Arc;

use engine::events::{
    translate, CharacterSnapshot, Event, EventScheduler, MovingStyle, PresentationContext,
    RenderCell,
};
use engine::tasks::{Occupant, Task, TaskContext, TaskError, TaskTick};
use engine::transitions::{SolidColorSource, TransitionGenerator};
use engine::{
    CardinalDirection, Cell, CharacterId, ClientConfig, Direction8, FieldOfView, FloorTypeId,
    GridPathfinder, Stage, TaskManager, TransitionConfig, UiState, Volition, WorldView,
};

fn player(cell: Cell) -> CharacterSnapshot {
    CharacterSnapshot {
        id: CharacterId(1),
        cell,
        is_player: true,
        humanoid: true,
    }
}

#[test]
fn still_move_and_fov_change_complete_in_one_frame() {
    let config = ClientConfig {
        animations_enabled: false,
        ..ClientConfig::default()
    };
    let mut stage = Stage::new();
    let mut fov = FieldOfView::new();
    let mut ui = UiState::new(8);
    let mut scheduler = EventScheduler::new(config.stall_warning_frames);

    scheduler.enqueue(translate(Event::Move {
        character: player(Cell::new(4, 3)),
        from: Cell::new(3, 3),
        to: Cell::new(4, 3),
        style: MovingStyle::Step,
    }));
    scheduler.enqueue(translate(Event::FovChange {
        seen: vec![RenderCell {
            cell: Cell::new(5, 3),
            floor: FloorTypeId(1),
            wall: None,
            object: None,
        }],
        unseen: Vec::new(),
        seen_borders: Vec::new(),
    }));

    let mut ctx = PresentationContext {
        stage: &mut stage,
        fov: &mut fov,
        ui: &mut ui,
        config: &config,
    };
    let report = scheduler.run_frame(&mut ctx);

    assert_eq!(report.started, 2);
    assert_eq!(report.completed, 2);
    assert!(!report.in_flight);
    assert!(scheduler.is_idle());
    assert_eq!(stage.active_tween_count(), 0);
    assert_eq!(stage.character_cell(CharacterId(1)), Some(Cell::new(4, 3)));
    assert!(fov.is_seen(Cell::new(5, 3)));
}

#[derive(Debug)]
struct UntilArrived {
    destination: Cell,
}

impl Task for UntilArrived {
    fn label(&self) -> &'static str {
        "until_arrived"
    }

    fn ended(&self, world: &dyn WorldView) -> bool {
        world.player_cell() == self.destination
    }

    fn execute(&mut self, _ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
        Ok(())
    }
}

struct Spot(Cell);

impl WorldView for Spot {
    fn player_cell(&self) -> Cell {
        self.0
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
        false
    }
}

struct Ignore;

impl Volition for Ignore {
    fn step(&mut self, _direction: Direction8) {}
    fn attack(&mut self, _target: CharacterId) {}
    fn idle(&mut self) {}
    fn pick_up(&mut self) {}
}

#[test]
fn second_task_is_accepted_once_the_first_ends() {
    let mut manager = TaskManager::new();
    let t1 = Box::new(UntilArrived {
        destination: Cell::new(2, 0),
    });
    let t2 = Box::new(UntilArrived {
        destination: Cell::new(5, 5),
    });

    assert!(manager.try_set(t1));
    assert!(!manager.try_set(t2.clone_box()));
    assert_eq!(manager.current_label(), Some("until_arrived"));

    let mut volition = Ignore;
    let arrived = Spot(Cell::new(2, 0));
    let mut ctx = TaskContext {
        world: &arrived,
        volition: &mut volition,
        pathfinder: &GridPathfinder,
        search_budget: 100,
    };
    assert_eq!(manager.tick(&mut ctx), Ok(TaskTick::Finished));
    assert!(!manager.has_task());
    assert!(manager.try_set(t2));
}

impl UntilArrived {
    fn clone_box(&self) -> Box<dyn Task> {
        Box::new(UntilArrived {
            destination: self.destination,
        })
    }
}

#[test]
fn create_transition_returns_the_cached_tile() {
    let grass = FloorTypeId(1);
    let config = TransitionConfig::default();
    let source = SolidColorSource::new(config.tile_size).with_floor(grass, [30, 140, 40, 255]);
    let mut generator = TransitionGenerator::new(config, Box::new(source)).expect("generator");

    let first = generator
        .create_transition(CardinalDirection::North, grass)
        .expect("first");
    let second = generator
        .create_transition(CardinalDirection::North, grass)
        .expect("second");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(generator.cache_stats().edges, 1);
}
