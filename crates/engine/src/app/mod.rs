mod fov;
mod input;
mod loop_runner;
mod metrics;
mod scene;
mod stage;
mod tween;
mod ui;

pub use fov::FieldOfView;
pub use input::{route_input, IgnoreReason, InputAction, InputContext, InputOutcome};
pub use loop_runner::{ClientLoop, FrameSummary};
pub use metrics::{MetricsHandle, PresentationMetricsSnapshot};
pub use scene::{
    ActorId, CardinalDirection, Cell, CharacterId, Direction8, FloorGrid, FloorGridError,
    FloorTypeId, ItemId, PlaneLevel, Vec2,
};
pub use stage::{ActorKind, Stage};
pub use tween::{Ease, Pose, Tween, TweenCallback};
pub use ui::{ActiveView, LogEntry, MessageLog, UiPortion, UiState};
