mod present;
mod scheduler;
mod translate;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::app::{CardinalDirection, Cell, CharacterId, FloorTypeId, ItemId, PlaneLevel};
use crate::config::ProtocolPolicy;

pub use present::{PresentationContext, Processed};
pub use scheduler::{EventScheduler, FrameReport, SchedulerError, SchedulerSignal};
pub use translate::{
    plan_presentation, translate, Completion, Continuation, DeferredAction, PlanSettings,
    PresentationStep, TransientKind, VisualPlan, ATTACK_RETREAT_FRACTION, ATTACK_STRIKE_FRACTION,
    ATTACK_WINDUP_FRACTION, BLOOD_LIFETIME_SECONDS, ITEM_FADE_SECONDS, LEAP_DURATION_SECONDS,
    PROJECTILE_SECONDS_PER_CELL, STEP_DURATION_SECONDS,
};

/// State of a character at the moment the event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub cell: Cell,
    #[serde(default)]
    pub is_player: bool,
    #[serde(default)]
    pub humanoid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: ItemId,
    pub resource: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCell {
    pub cell: Cell,
    pub floor: FloorTypeId,
    #[serde(default)]
    pub wall: Option<u16>,
    #[serde(default)]
    pub object: Option<u16>,
}

impl RenderCell {
    pub fn is_occupied(&self) -> bool {
        self.wall.is_some() || self.object.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderBorder {
    pub cell: Cell,
    pub side: CardinalDirection,
    #[serde(default)]
    pub object: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingStyle {
    #[default]
    Step,
    Leap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStyle {
    #[default]
    Propelled,
    Cast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projectile {
    Item { item: ItemRef },
    Spell { resource: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SoundSource {
    Cell,
    Player,
    Character { id: CharacterId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Move {
        character: CharacterSnapshot,
        from: Cell,
        to: Cell,
        #[serde(default)]
        style: MovingStyle,
    },
    Attack {
        attacker: CharacterSnapshot,
        aim: Cell,
    },
    FovChange {
        #[serde(default)]
        seen: Vec<RenderCell>,
        #[serde(default)]
        unseen: Vec<Cell>,
        #[serde(default)]
        seen_borders: Vec<RenderBorder>,
    },
    InitialTerrain {
        level: PlaneLevel,
        #[serde(default)]
        seen: Vec<RenderCell>,
        #[serde(default)]
        seen_borders: Vec<RenderBorder>,
    },
    ItemAppear {
        item: ItemRef,
        cell: Cell,
    },
    ItemDisappear {
        item: ItemRef,
        cell: Cell,
    },
    PutOn {
        character: CharacterSnapshot,
        item: ItemRef,
    },
    Wield {
        character: CharacterSnapshot,
        item: ItemRef,
    },
    TakeOff {
        character: CharacterSnapshot,
        item: ItemRef,
    },
    Unwield {
        character: CharacterSnapshot,
        item: ItemRef,
    },
    ProjectileFly {
        projectile: Projectile,
        from: Cell,
        to: Cell,
        #[serde(default)]
        style: FlightStyle,
    },
    Sound {
        sound: String,
        cell: Cell,
        source: SoundSource,
    },
    Explosion {
        cell: Cell,
    },
    GetDamage {
        character: CharacterSnapshot,
        amount: u32,
        #[serde(default)]
        damage_type: String,
    },
    Die {
        character: CharacterSnapshot,
    },
    MoveToPlane {
        level: PlaneLevel,
        #[serde(default)]
        seen: Vec<RenderCell>,
    },
    Say {
        character: CharacterSnapshot,
        text: String,
    },
}

impl Event {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::FovChange { .. } => "fov_change",
            Self::InitialTerrain { .. } => "initial_terrain",
            Self::ItemAppear { .. } => "item_appear",
            Self::ItemDisappear { .. } => "item_disappear",
            Self::PutOn { .. } => "put_on",
            Self::Wield { .. } => "wield",
            Self::TakeOff { .. } => "take_off",
            Self::Unwield { .. } => "unwield",
            Self::ProjectileFly { .. } => "projectile_fly",
            Self::Sound { .. } => "sound",
            Self::Explosion { .. } => "explosion",
            Self::GetDamage { .. } => "get_damage",
            Self::Die { .. } => "die",
            Self::MoveToPlane { .. } => "move_to_plane",
            Self::Say { .. } => "say",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event payload: {0}")]
    Malformed(#[source] serde_json::Error),
}

pub fn decode_event(raw: &str) -> Result<Event, ProtocolError> {
    serde_json::from_str(raw).map_err(ProtocolError::Malformed)
}

/// Entry point for raw events arriving from the transport.
#[derive(Debug)]
pub struct EventInbox {
    policy: ProtocolPolicy,
    skipped: u64,
}

impl EventInbox {
    pub fn new(policy: ProtocolPolicy) -> Self {
        Self { policy, skipped: 0 }
    }

    /// Decodes `raw`; under `LogAndSkip` a bad payload yields `Ok(None)` and is counted.
    pub fn receive(&mut self, raw: &str) -> Result<Option<Event>, ProtocolError> {
        match decode_event(raw) {
            Ok(event) => Ok(Some(event)),
            Err(error) => match self.policy {
                ProtocolPolicy::FailFast => Err(error),
                ProtocolPolicy::LogAndSkip => {
                    self.skipped = self.skipped.saturating_add(1);
                    warn!(error = %error, skipped = self.skipped, "event_payload_skipped");
                    Ok(None)
                }
            },
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
