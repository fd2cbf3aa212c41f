use std::path::PathBuf;

use engine::transitions::{
    AtlasError, FloorTextureSource, PngDirectorySource, SharedTransitions, SolidColorSource,
    TransitionAtlas, TransitionError, TransitionGenerator,
};
use engine::{
    AppPaths, CardinalDirection, Cell, ClientConfig, ClientLoop, Direction8, FloorGrid,
    InputAction, TransitionConfig,
};
use thiserror::Error;
use tracing::{info, warn};

use super::bootstrap::{AppWiring, ClientError};
use super::sim::{LocalSimulation, RequestSlot, GRASS, SAND, WATER};

const ATLAS_FILE_NAME: &str = "transitions.png";
const UNLIMITED_FRAME_SECONDS: f32 = 1.0 / 60.0;

/// Inputs replayed against the demo world, keyed by frame number.
const SCRIPT: &[(u32, InputAction)] = &[
    (5, InputAction::GoTo(Cell::new(9, 5))),
    (60, InputAction::ToggleAnimations),
    (70, InputAction::GoTo(Cell::new(10, 3))),
    (200, InputAction::Step(Direction8::NorthEast)),
    (260, InputAction::Step(Direction8::NorthEast)),
    (330, InputAction::GoTo(Cell::new(2, 5))),
    (600, InputAction::PickUp),
    (620, InputAction::ToggleStatusBar),
    (640, InputAction::Idle),
];

#[derive(Debug, Error)]
pub(crate) enum RunError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Atlas(#[from] AtlasError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionReport {
    pub(crate) frames: u32,
    pub(crate) player_cell: Option<Cell>,
    pub(crate) log_entries: usize,
    pub(crate) task_failures: u32,
}

pub(crate) fn run(wiring: AppWiring) -> Result<(), ClientError> {
    let mut sim = LocalSimulation::demo();
    let report = run_session(&mut sim, wiring.config.clone(), wiring.options.frames);
    info!(
        frames = report.frames,
        player_x = report.player_cell.map(|cell| cell.x),
        player_y = report.player_cell.map(|cell| cell.y),
        log_entries = report.log_entries,
        task_failures = report.task_failures,
        "session_finished"
    );

    if wiring.options.export_atlas {
        let path = export_atlas(&wiring.config.transitions, &wiring.paths, sim.floors())?;
        info!(path = %path.display(), "atlas_ready");
    }
    Ok(())
}

/// Drives the client against `sim` for `frames` frames, replaying [`SCRIPT`].
pub(crate) fn run_session(
    sim: &mut LocalSimulation,
    config: ClientConfig,
    frames: u32,
) -> SessionReport {
    let dt = config
        .frame_budget_seconds()
        .unwrap_or(UNLIMITED_FRAME_SECONDS);
    let mut client = ClientLoop::new(config);
    let mut requests = RequestSlot::default();
    let mut task_failures = 0u32;

    for event in sim.initial_events() {
        client.push_event(event);
    }

    for frame in 0..frames {
        for (_, action) in SCRIPT.iter().filter(|(at, _)| *at == frame) {
            let view = sim.view(&requests);
            match client.handle_input(*action, &view, &mut requests) {
                Ok(outcome) => info!(frame, ?action, ?outcome, "input_routed"),
                Err(error) => warn!(frame, ?action, error = %error, "input_rejected"),
            }
        }

        let view = sim.view(&requests);
        let summary = client.frame(dt, &view, &mut requests);
        if let Some(Err(error)) = summary.task {
            task_failures = task_failures.saturating_add(1);
            warn!(frame, error = %error, "task_failed");
        }

        if let Some(request) = requests.take() {
            for event in sim.resolve(request) {
                client.push_event(event);
            }
        }

        for portion in client.ui_mut().take_pending_refreshes() {
            info!(frame, ?portion, "ui_refreshed");
        }
    }

    SessionReport {
        frames,
        player_cell: client.stage().character_cell(engine::CharacterId(1)),
        log_entries: client.ui().log().len(),
        task_failures,
    }
}

/// Generates the transition tile of every demo cell plus the fog edges and writes them as one
/// atlas into the cache directory.
pub(crate) fn export_atlas(
    config: &TransitionConfig,
    paths: &AppPaths,
    floors: &FloorGrid,
) -> Result<PathBuf, RunError> {
    let source: Box<dyn FloorTextureSource + Send> = if paths.floor_textures_dir.is_dir() {
        Box::new(PngDirectorySource::new(
            &paths.floor_textures_dir,
            config.tile_size,
        ))
    } else {
        warn!(
            dir = %paths.floor_textures_dir.display(),
            "floor_textures_missing_using_palette"
        );
        Box::new(demo_palette(config.tile_size))
    };
    let shared = SharedTransitions::new(TransitionGenerator::new(*config, source)?);

    let width = i32::try_from(floors.width()).unwrap_or(i32::MAX);
    let height = i32::try_from(floors.height()).unwrap_or(i32::MAX);
    for y in 0..height {
        for x in 0..width {
            shared.with(|generator| generator.transition_for_cell(floors, Cell::new(x, y)))?;
        }
    }

    let composites = shared.with(|generator| generator.composites());
    let fog: Vec<_> = CardinalDirection::ALL
        .iter()
        .map(|direction| shared.fog_edge(*direction))
        .collect();
    let capacity = u32::try_from(composites.len() + fog.len()).unwrap_or(u32::MAX);
    let mut atlas = TransitionAtlas::new(capacity, config.tile_size);
    for (_, tile) in &composites {
        atlas.insert(tile)?;
    }
    for tile in &fog {
        atlas.insert(tile)?;
    }

    let path = paths.cache_dir.join(ATLAS_FILE_NAME);
    atlas.export_png(&path)?;
    let stats = shared.cache_stats();
    info!(
        edges = stats.edges,
        composites = stats.composites,
        fog_edges = stats.fog_edges,
        "transition_cache_stats"
    );
    Ok(path)
}

fn demo_palette(tile_size: u32) -> SolidColorSource {
    SolidColorSource::new(tile_size)
        .with_floor(GRASS, [58, 128, 52, 255])
        .with_floor(SAND, [214, 192, 128, 255])
        .with_floor(WATER, [40, 90, 180, 255])
}
