use tracing::{debug, warn};

use crate::app::{FieldOfView, Stage, TweenCallback, UiState};
use crate::config::ClientConfig;

use super::translate::{
    Completion, Continuation, DeferredAction, PlanSettings, PresentationStep, VisualPlan,
};

/// Everything an action may touch while it is processed.
pub struct PresentationContext<'a> {
    pub stage: &'a mut Stage,
    pub fov: &'a mut FieldOfView,
    pub ui: &'a mut UiState,
    pub config: &'a ClientConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processed {
    pub completion: Completion,
    pub continuation: Continuation,
}

impl PresentationContext<'_> {
    /// Plans `action` against the live animation flag and applies the plan.
    pub fn process(&mut self, action: &DeferredAction) -> Processed {
        let settings = PlanSettings {
            animations_enabled: self.config.animations_enabled,
        };
        self.apply(action.plan(&settings))
    }

    pub fn apply(&mut self, plan: VisualPlan) -> Processed {
        let mut completion = plan.completion;
        for step in plan.steps {
            if self.apply_step(step) && completion == Completion::Deferred {
                // The tween that would have signalled is gone; finish now.
                completion = Completion::Immediate;
            }
        }
        Processed {
            completion,
            continuation: plan.continuation,
        }
    }

    /// Returns true when a done-signalling tween could not be attached.
    fn apply_step(&mut self, step: PresentationStep) -> bool {
        match step {
            PresentationStep::SnapCharacter { character } => {
                self.stage.place_character(&character);
            }
            PresentationStep::AnimateCharacter {
                character,
                from,
                tween,
            } => {
                self.stage.animate_character(&character, from, tween);
            }
            PresentationStep::AnimateInPlace { character, tween } => {
                self.stage.animate_in_place(&character, tween);
            }
            PresentationStep::RefreshCharacterVisibility => {
                self.stage.update_character_visibility(self.fov);
            }
            PresentationStep::SwitchPlane { level } => {
                self.fov.init(level, &[]);
                self.stage.switch_plane(level);
            }
            PresentationStep::ActivateWorldView => self.ui.activate_world_view(),
            PresentationStep::RevealCells(cells) => {
                for cell in cells {
                    self.fov.see_cell(cell);
                    if self.fov.has_unseen_items(cell.cell) {
                        self.fov.remove_unseen_items(cell.cell);
                    }
                    if let Some(wall) = cell.wall {
                        self.stage.add_wall(cell.cell, wall);
                    } else if let Some(object) = cell.object {
                        self.stage.add_object(cell.cell, object);
                    }
                }
            }
            PresentationStep::ConcealCells(cells) => {
                for cell in cells {
                    self.fov.unsee_cell(cell);
                    for item in self.stage.take_items_at(cell) {
                        self.fov.remember_unseen_item(cell, item);
                    }
                }
            }
            PresentationStep::ClearMarkers => self.stage.clear_markers(),
            PresentationStep::MarkBorders(borders) => {
                for border in borders {
                    if let Some(object) = border.object {
                        self.stage.add_border_object(&border, object);
                    }
                    self.stage.add_marker(border);
                }
            }
            PresentationStep::ShowItem { item, cell, tween } => {
                self.stage.show_item(&item, cell, tween);
            }
            PresentationStep::HideItem { item, tween } => {
                let signals_done = tween
                    .as_ref()
                    .is_some_and(|tween| tween.fires(TweenCallback::EventDone));
                if !self.stage.hide_item(item.id, tween) {
                    warn!(item = item.id.0, "hide_item_without_actor");
                    return signals_done;
                }
            }
            PresentationStep::RefreshEquipment { character } => {
                if !self.stage.refresh_appearance(character) {
                    debug!(character = character.0, "equipment_refresh_without_actor");
                }
            }
            PresentationStep::RefreshUi(portion) => self.ui.request_refresh(portion),
            PresentationStep::SpawnTransient { kind, cell, tween } => {
                self.stage.spawn_transient(kind, cell, tween);
            }
            PresentationStep::RemoveCharacter { character } => {
                if !self.stage.remove_character(character) {
                    debug!(character = character.0, "remove_character_without_actor");
                }
            }
            PresentationStep::Log(entry) => self.ui.push_log(entry),
        }
        false
    }
}
