use crate::app::{
    Cell, CharacterId, Ease, LogEntry, PlaneLevel, Tween, TweenCallback, UiPortion, Vec2,
};

use super::{
    CharacterSnapshot, Event, FlightStyle, ItemRef, MovingStyle, Projectile, RenderBorder,
    RenderCell, SoundSource,
};

pub const STEP_DURATION_SECONDS: f32 = 0.1;
pub const LEAP_DURATION_SECONDS: f32 = 0.3;
pub const ITEM_FADE_SECONDS: f32 = 0.1;
pub const ATTACK_WINDUP_FRACTION: f32 = 0.2;
pub const ATTACK_STRIKE_FRACTION: f32 = 0.7;
pub const ATTACK_RETREAT_FRACTION: f32 = 0.5;
pub const BLOOD_LIFETIME_SECONDS: f32 = 0.3;
pub const PROJECTILE_SECONDS_PER_CELL: f32 = 0.05;

const ATTACK_WINDUP_SECONDS: f32 = 0.1;
const ATTACK_STRIKE_SECONDS: f32 = 0.1;
const ATTACK_RETREAT_SECONDS: f32 = 0.2;
const SOUND_SPIN_DEGREES: f32 = 90.0;
const SOUND_SPIN_SECONDS: f32 = 0.3;
const CAST_SPIN_DEGREES: f32 = 360.0;
const EXPLOSION_FADE_SECONDS: f32 = 0.3;

/// Result of processing one action, read by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Stop,
    ContinueImmediately,
}

/// How the action reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Done as soon as the plan has been applied.
    Immediate,
    /// A tween in the plan fires `TweenCallback::EventDone` on a later frame.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSettings {
    pub animations_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransientKind {
    Blood,
    Projectile(Projectile),
    Sound(String),
    Explosion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationStep {
    SnapCharacter {
        character: CharacterSnapshot,
    },
    AnimateCharacter {
        character: CharacterSnapshot,
        from: Cell,
        tween: Tween,
    },
    AnimateInPlace {
        character: CharacterSnapshot,
        tween: Tween,
    },
    RefreshCharacterVisibility,
    SwitchPlane {
        level: PlaneLevel,
    },
    ActivateWorldView,
    RevealCells(Vec<RenderCell>),
    ConcealCells(Vec<Cell>),
    ClearMarkers,
    MarkBorders(Vec<RenderBorder>),
    ShowItem {
        item: ItemRef,
        cell: Cell,
        tween: Option<Tween>,
    },
    HideItem {
        item: ItemRef,
        tween: Option<Tween>,
    },
    RefreshEquipment {
        character: CharacterId,
    },
    RefreshUi(UiPortion),
    SpawnTransient {
        kind: TransientKind,
        cell: Cell,
        tween: Tween,
    },
    RemoveCharacter {
        character: CharacterId,
    },
    Log(LogEntry),
}

/// Description of everything one event does to the presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualPlan {
    pub steps: Vec<PresentationStep>,
    pub completion: Completion,
    pub continuation: Continuation,
}

impl VisualPlan {
    fn immediate(steps: Vec<PresentationStep>) -> Self {
        Self {
            steps,
            completion: Completion::Immediate,
            continuation: Continuation::Stop,
        }
    }

    fn deferred(steps: Vec<PresentationStep>) -> Self {
        Self {
            steps,
            completion: Completion::Deferred,
            continuation: Continuation::Stop,
        }
    }

    /// Number of tweens the plan would start.
    pub fn tween_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| match step {
                PresentationStep::AnimateCharacter { .. }
                | PresentationStep::AnimateInPlace { .. }
                | PresentationStep::SpawnTransient { .. } => true,
                PresentationStep::ShowItem { tween, .. } | PresentationStep::HideItem { tween, .. } => {
                    tween.is_some()
                }
                _ => false,
            })
            .count()
    }

    /// True when some tween in the plan will fire `callback`.
    pub fn fires(&self, callback: TweenCallback) -> bool {
        self.steps.iter().any(|step| match step {
            PresentationStep::AnimateCharacter { tween, .. }
            | PresentationStep::AnimateInPlace { tween, .. }
            | PresentationStep::SpawnTransient { tween, .. } => tween.fires(callback),
            PresentationStep::ShowItem {
                tween: Some(tween), ..
            }
            | PresentationStep::HideItem {
                tween: Some(tween), ..
            } => tween.fires(callback),
            _ => false,
        })
    }
}

/// One queued event waiting for its turn on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredAction {
    event: Event,
    label: &'static str,
}

impl DeferredAction {
    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn plan(&self, settings: &PlanSettings) -> VisualPlan {
        plan_presentation(&self.event, settings)
    }
}

pub fn translate(event: Event) -> DeferredAction {
    let label = event.label();
    DeferredAction { event, label }
}

pub fn plan_presentation(event: &Event, settings: &PlanSettings) -> VisualPlan {
    let animated = settings.animations_enabled;
    match event {
        Event::Move {
            character,
            from,
            to,
            style,
        } => plan_move(character, *from, *to, *style, animated),
        Event::Attack { attacker, aim } => plan_attack(attacker, *aim, animated),
        Event::FovChange {
            seen,
            unseen,
            seen_borders,
        } => VisualPlan::immediate(vec![
            PresentationStep::ConcealCells(unseen.clone()),
            PresentationStep::ClearMarkers,
            PresentationStep::RevealCells(seen.clone()),
            PresentationStep::MarkBorders(seen_borders.clone()),
            PresentationStep::RefreshCharacterVisibility,
        ]),
        Event::InitialTerrain {
            level,
            seen,
            seen_borders,
        } => VisualPlan::immediate(vec![
            PresentationStep::SwitchPlane { level: *level },
            PresentationStep::RevealCells(seen.clone()),
            PresentationStep::MarkBorders(seen_borders.clone()),
            PresentationStep::ActivateWorldView,
            PresentationStep::RefreshCharacterVisibility,
        ]),
        Event::ItemAppear { item, cell } => {
            if animated {
                let tween = Tween::sequence(vec![
                    Tween::alpha_to(1.0, ITEM_FADE_SECONDS),
                    Tween::run(TweenCallback::EventDone),
                ]);
                VisualPlan::deferred(vec![PresentationStep::ShowItem {
                    item: item.clone(),
                    cell: *cell,
                    tween: Some(tween),
                }])
            } else {
                VisualPlan::immediate(vec![PresentationStep::ShowItem {
                    item: item.clone(),
                    cell: *cell,
                    tween: None,
                }])
            }
        }
        Event::ItemDisappear { item, .. } => {
            if animated {
                let tween = Tween::sequence(vec![
                    Tween::alpha_to(0.0, ITEM_FADE_SECONDS),
                    Tween::run(TweenCallback::RemoveSelf),
                    Tween::run(TweenCallback::EventDone),
                ]);
                VisualPlan::deferred(vec![PresentationStep::HideItem {
                    item: item.clone(),
                    tween: Some(tween),
                }])
            } else {
                VisualPlan::immediate(vec![PresentationStep::HideItem {
                    item: item.clone(),
                    tween: None,
                }])
            }
        }
        Event::PutOn { character, .. }
        | Event::Wield { character, .. }
        | Event::TakeOff { character, .. }
        | Event::Unwield { character, .. } => plan_equipment(character),
        Event::ProjectileFly {
            projectile,
            from,
            to,
            style,
        } => plan_projectile(projectile, *from, *to, *style, animated),
        Event::Sound {
            sound,
            cell,
            source,
        } => {
            let mut steps = Vec::with_capacity(2);
            if animated {
                steps.push(PresentationStep::SpawnTransient {
                    kind: TransientKind::Sound(sound.clone()),
                    cell: *cell,
                    tween: Tween::sequence(vec![
                        Tween::rotate_by(SOUND_SPIN_DEGREES, SOUND_SPIN_SECONDS),
                        Tween::run(TweenCallback::RemoveSelf),
                    ]),
                });
            }
            steps.push(PresentationStep::Log(sound_entry(sound, *cell, *source)));
            VisualPlan::immediate(steps)
        }
        Event::Explosion { cell } => {
            let mut steps = Vec::new();
            if animated {
                steps.push(PresentationStep::SpawnTransient {
                    kind: TransientKind::Explosion,
                    cell: *cell,
                    tween: Tween::sequence(vec![
                        Tween::alpha_to(0.0, EXPLOSION_FADE_SECONDS),
                        Tween::run(TweenCallback::RemoveSelf),
                    ]),
                });
            }
            VisualPlan::immediate(steps)
        }
        Event::GetDamage {
            character,
            amount,
            damage_type,
        } => VisualPlan::immediate(vec![
            PresentationStep::Log(LogEntry::Damage {
                character: character.id,
                amount: *amount,
                damage_type: damage_type.clone(),
            }),
            PresentationStep::SpawnTransient {
                kind: TransientKind::Blood,
                cell: character.cell,
                tween: Tween::sequence(vec![
                    Tween::delay(BLOOD_LIFETIME_SECONDS),
                    Tween::run(TweenCallback::RemoveSelf),
                ]),
            },
        ]),
        Event::Die { character } => VisualPlan::immediate(vec![
            PresentationStep::RemoveCharacter {
                character: character.id,
            },
            PresentationStep::Log(LogEntry::Death {
                character: character.id,
            }),
        ]),
        Event::MoveToPlane { level, seen } => VisualPlan::immediate(vec![
            PresentationStep::SwitchPlane { level: *level },
            PresentationStep::RevealCells(seen.clone()),
            PresentationStep::RefreshCharacterVisibility,
        ]),
        Event::Say { character, text } => {
            VisualPlan::immediate(vec![PresentationStep::Log(LogEntry::Speech {
                character: character.id,
                text: text.clone(),
            })])
        }
    }
}

fn plan_move(
    character: &CharacterSnapshot,
    from: Cell,
    to: Cell,
    style: MovingStyle,
    animated: bool,
) -> VisualPlan {
    let mut snapshot = *character;
    snapshot.cell = to;

    if !animated {
        let mut plan = VisualPlan::immediate(vec![
            PresentationStep::SnapCharacter {
                character: snapshot,
            },
            PresentationStep::RefreshCharacterVisibility,
        ]);
        if character.is_player {
            // The player's FovChange follows right away; draw both in one frame.
            plan.continuation = Continuation::ContinueImmediately;
        }
        return plan;
    }

    let motion = match style {
        MovingStyle::Step => Tween::move_to(to.as_vec2(), STEP_DURATION_SECONDS),
        MovingStyle::Leap => {
            let half = LEAP_DURATION_SECONDS / 2.0;
            Tween::parallel(vec![
                Tween::move_by(to.as_vec2() - from.as_vec2(), LEAP_DURATION_SECONDS),
                Tween::sequence(vec![
                    Tween::move_by_eased(Vec2::new(0.0, -1.0), half, Ease::Exp5Out),
                    Tween::move_by_eased(Vec2::new(0.0, 1.0), half, Ease::Exp5In),
                ]),
            ])
        }
    };
    let mut sequence = vec![motion, Tween::run(TweenCallback::RefreshVisibility)];
    if character.is_player {
        sequence.push(Tween::run(TweenCallback::ContinueImmediately));
    }
    sequence.push(Tween::run(TweenCallback::EventDone));

    VisualPlan::deferred(vec![PresentationStep::AnimateCharacter {
        character: snapshot,
        from,
        tween: Tween::sequence(sequence),
    }])
}

fn plan_attack(attacker: &CharacterSnapshot, aim: Cell, animated: bool) -> VisualPlan {
    if !animated {
        return VisualPlan::immediate(Vec::new());
    }
    let reach = aim.as_vec2() - attacker.cell.as_vec2();
    let tween = Tween::sequence(vec![
        Tween::move_by(reach.scaled(-ATTACK_WINDUP_FRACTION), ATTACK_WINDUP_SECONDS),
        Tween::move_by(reach.scaled(ATTACK_STRIKE_FRACTION), ATTACK_STRIKE_SECONDS),
        Tween::run(TweenCallback::EventDone),
        Tween::move_by(reach.scaled(-ATTACK_RETREAT_FRACTION), ATTACK_RETREAT_SECONDS),
    ]);
    VisualPlan::deferred(vec![PresentationStep::AnimateInPlace {
        character: *attacker,
        tween,
    }])
}

fn plan_equipment(character: &CharacterSnapshot) -> VisualPlan {
    let mut steps = Vec::with_capacity(2);
    if character.is_player {
        steps.push(PresentationStep::RefreshUi(UiPortion::Inventory));
    }
    if character.humanoid {
        steps.push(PresentationStep::RefreshEquipment {
            character: character.id,
        });
    }
    VisualPlan::immediate(steps)
}

fn plan_projectile(
    projectile: &Projectile,
    from: Cell,
    to: Cell,
    style: FlightStyle,
    animated: bool,
) -> VisualPlan {
    if !animated {
        return VisualPlan::immediate(Vec::new());
    }
    let duration = from.euclidean_distance(to) * PROJECTILE_SECONDS_PER_CELL;
    let flight = Tween::move_to(to.as_vec2(), duration);
    let spinning = style == FlightStyle::Cast && matches!(projectile, Projectile::Item { .. });
    let motion = if spinning {
        Tween::parallel(vec![flight, Tween::rotate_by(CAST_SPIN_DEGREES, duration)])
    } else {
        flight
    };
    VisualPlan::deferred(vec![PresentationStep::SpawnTransient {
        kind: TransientKind::Projectile(projectile.clone()),
        cell: from,
        tween: Tween::sequence(vec![
            motion,
            Tween::run(TweenCallback::RemoveSelf),
            Tween::run(TweenCallback::EventDone),
        ]),
    }])
}

fn sound_entry(sound: &str, cell: Cell, source: SoundSource) -> LogEntry {
    match source {
        SoundSource::Cell => LogEntry::SoundFromCell {
            sound: sound.to_string(),
            cell,
        },
        SoundSource::Player => LogEntry::SoundFromPlayer {
            sound: sound.to_string(),
        },
        SoundSource::Character { id } => LogEntry::SoundFromCharacter {
            sound: sound.to_string(),
            character: id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{FloorTypeId, ItemId};

    const ANIMATED: PlanSettings = PlanSettings {
        animations_enabled: true,
    };
    const STILL: PlanSettings = PlanSettings {
        animations_enabled: false,
    };

    fn snapshot(id: u64, x: i32, y: i32, is_player: bool) -> CharacterSnapshot {
        CharacterSnapshot {
            id: CharacterId(id),
            cell: Cell::new(x, y),
            is_player,
            humanoid: true,
        }
    }

    fn player_step() -> Event {
        Event::Move {
            character: snapshot(1, 4, 3, true),
            from: Cell::new(3, 3),
            to: Cell::new(4, 3),
            style: MovingStyle::Step,
        }
    }

    #[test]
    fn translate_keeps_event_and_label() {
        let action = translate(player_step());
        assert_eq!(action.label(), "move");
        assert_eq!(action.event(), &player_step());
    }

    #[test]
    fn still_player_move_snaps_and_continues() {
        let plan = plan_presentation(&player_step(), &STILL);
        assert_eq!(plan.completion, Completion::Immediate);
        assert_eq!(plan.continuation, Continuation::ContinueImmediately);
        assert_eq!(plan.tween_count(), 0);
        assert!(matches!(
            plan.steps[0],
            PresentationStep::SnapCharacter { character } if character.cell == Cell::new(4, 3)
        ));
    }

    #[test]
    fn still_npc_move_does_not_continue() {
        let event = Event::Move {
            character: snapshot(2, 1, 1, false),
            from: Cell::new(0, 1),
            to: Cell::new(1, 1),
            style: MovingStyle::Step,
        };
        let plan = plan_presentation(&event, &STILL);
        assert_eq!(plan.continuation, Continuation::Stop);
    }

    #[test]
    fn animated_move_defers_done_to_tween() {
        let plan = plan_presentation(&player_step(), &ANIMATED);
        assert_eq!(plan.completion, Completion::Deferred);
        assert_eq!(plan.continuation, Continuation::Stop);
        assert!(plan.fires(TweenCallback::EventDone));
        assert!(plan.fires(TweenCallback::ContinueImmediately));
        assert!(plan.fires(TweenCallback::RefreshVisibility));
    }

    #[test]
    fn leap_lasts_full_duration() {
        let event = Event::Move {
            character: snapshot(2, 5, 3, false),
            from: Cell::new(3, 3),
            to: Cell::new(5, 3),
            style: MovingStyle::Leap,
        };
        let plan = plan_presentation(&event, &ANIMATED);
        let PresentationStep::AnimateCharacter { tween, .. } = &plan.steps[0] else {
            panic!("expected animation, got {:?}", plan.steps[0]);
        };
        assert!((tween.duration() - LEAP_DURATION_SECONDS).abs() < 1e-6);
        assert!(!plan.fires(TweenCallback::ContinueImmediately));
    }

    #[test]
    fn attack_signals_done_before_follow_through() {
        let event = Event::Attack {
            attacker: snapshot(1, 0, 0, true),
            aim: Cell::new(1, 0),
        };
        let plan = plan_presentation(&event, &ANIMATED);
        let PresentationStep::AnimateInPlace { tween, .. } = &plan.steps[0] else {
            panic!("expected in-place animation");
        };
        let done_at = tween
            .callback_time(TweenCallback::EventDone)
            .expect("done fires");
        assert!(done_at < tween.duration());
        assert!((done_at - 0.2).abs() < 1e-6);
    }

    #[test]
    fn equipment_refreshes_follow_character_aspects() {
        let item = ItemRef {
            id: ItemId(3),
            resource: "helmet".to_string(),
        };
        let npc = CharacterSnapshot {
            humanoid: false,
            ..snapshot(5, 0, 0, false)
        };
        let plan = plan_presentation(
            &Event::PutOn {
                character: npc,
                item: item.clone(),
            },
            &ANIMATED,
        );
        assert!(plan.steps.is_empty());

        let plan = plan_presentation(
            &Event::Wield {
                character: snapshot(1, 0, 0, true),
                item,
            },
            &STILL,
        );
        assert_eq!(
            plan.steps,
            vec![
                PresentationStep::RefreshUi(UiPortion::Inventory),
                PresentationStep::RefreshEquipment {
                    character: CharacterId(1)
                },
            ]
        );
    }

    #[test]
    fn damage_is_fire_and_forget() {
        let plan = plan_presentation(
            &Event::GetDamage {
                character: snapshot(4, 2, 2, false),
                amount: 5,
                damage_type: "fire".to_string(),
            },
            &STILL,
        );
        assert_eq!(plan.completion, Completion::Immediate);
        assert!(plan.fires(TweenCallback::RemoveSelf));
        assert!(!plan.fires(TweenCallback::EventDone));
    }

    #[test]
    fn projectile_blocks_until_landing() {
        let event = Event::ProjectileFly {
            projectile: Projectile::Item {
                item: ItemRef {
                    id: ItemId(8),
                    resource: "axe".to_string(),
                },
            },
            from: Cell::new(0, 0),
            to: Cell::new(4, 3),
            style: FlightStyle::Cast,
        };
        let plan = plan_presentation(&event, &ANIMATED);
        assert_eq!(plan.completion, Completion::Deferred);
        let PresentationStep::SpawnTransient { tween, .. } = &plan.steps[0] else {
            panic!("expected transient");
        };
        let expected = 5.0 * PROJECTILE_SECONDS_PER_CELL;
        assert!((tween.duration() - expected).abs() < 1e-6);
        let landed = tween
            .callback_time(TweenCallback::EventDone)
            .expect("done fires");
        assert!((landed - expected).abs() < 1e-6);
    }

    #[test]
    fn sound_logs_by_source() {
        let plan = plan_presentation(
            &Event::Sound {
                sound: "roar".to_string(),
                cell: Cell::new(2, 2),
                source: SoundSource::Character { id: CharacterId(7) },
            },
            &STILL,
        );
        assert_eq!(
            plan.steps,
            vec![PresentationStep::Log(LogEntry::SoundFromCharacter {
                sound: "roar".to_string(),
                character: CharacterId(7),
            })]
        );
    }

    #[test]
    fn every_deferred_plan_fires_done() {
        let seen = vec![RenderCell {
            cell: Cell::new(1, 1),
            floor: FloorTypeId(0),
            wall: None,
            object: None,
        }];
        let item = ItemRef {
            id: ItemId(1),
            resource: "coin".to_string(),
        };
        let events = vec![
            player_step(),
            Event::Attack {
                attacker: snapshot(1, 0, 0, true),
                aim: Cell::new(1, 1),
            },
            Event::ItemAppear {
                item: item.clone(),
                cell: Cell::new(1, 1),
            },
            Event::ItemDisappear {
                item,
                cell: Cell::new(1, 1),
            },
            Event::MoveToPlane {
                level: PlaneLevel(1),
                seen,
            },
            Event::Explosion {
                cell: Cell::new(0, 0),
            },
        ];
        for settings in [ANIMATED, STILL] {
            for event in &events {
                let plan = plan_presentation(event, &settings);
                if plan.completion == Completion::Deferred {
                    assert!(plan.fires(TweenCallback::EventDone), "{}", event.label());
                } else {
                    assert!(!plan.fires(TweenCallback::EventDone), "{}", event.label());
                }
            }
        }
    }
}
