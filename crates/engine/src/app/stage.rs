use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::fov::FieldOfView;
use super::scene::{ActorId, CardinalDirection, Cell, CharacterId, ItemId, PlaneLevel};
use super::tween::{Pose, RunningTween, Tween, TweenCallback};
use crate::events::{CharacterSnapshot, ItemRef, RenderBorder, SchedulerSignal, TransientKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ActorKind {
    Character { id: CharacterId, is_player: bool },
    Item(ItemRef),
    Wall { wall: u16 },
    Object { object: u16 },
    BorderObject { side: CardinalDirection, object: u16 },
    Transient(TransientKind),
}

#[derive(Debug)]
struct Actor {
    kind: ActorKind,
    cell: Cell,
    plane: PlaneLevel,
    pose: Pose,
    visible: bool,
    tweens: Vec<RunningTween>,
    appearance_revision: u32,
}

/// Every on-screen actor of the client, indexed by the game entity it shows.
#[derive(Debug, Default)]
pub struct Stage {
    next_actor_id: u64,
    actors: BTreeMap<ActorId, Actor>,
    characters: HashMap<CharacterId, ActorId>,
    items: HashMap<ItemId, ActorId>,
    walls: HashMap<Cell, ActorId>,
    objects: HashMap<Cell, ActorId>,
    border_objects: HashMap<(Cell, CardinalDirection), ActorId>,
    markers: Vec<RenderBorder>,
    active_plane: PlaneLevel,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_plane(&self) -> PlaneLevel {
        self.active_plane
    }

    /// Drops every actor of the current plane and makes `level` active.
    pub fn switch_plane(&mut self, level: PlaneLevel) {
        let removed = self.remove_actors_of_plane(self.active_plane);
        debug!(
            from = self.active_plane.0,
            to = level.0,
            removed,
            "stage_plane_switched"
        );
        self.markers.clear();
        self.active_plane = level;
    }

    pub fn remove_actors_of_plane(&mut self, level: PlaneLevel) -> usize {
        let doomed: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.plane == level)
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            self.remove_actor(*id);
        }
        doomed.len()
    }

    /// Puts the character on `snapshot.cell` at once, creating its actor if needed.
    pub fn place_character(&mut self, snapshot: &CharacterSnapshot) -> ActorId {
        let id = self.ensure_character(snapshot, snapshot.cell);
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.cell = snapshot.cell;
            actor.pose.position = snapshot.cell.as_vec2();
        }
        id
    }

    /// Moves the character's logical cell to `snapshot.cell` and lets `tween` carry the pose.
    pub fn animate_character(
        &mut self,
        snapshot: &CharacterSnapshot,
        from: Cell,
        tween: Tween,
    ) -> ActorId {
        let id = self.ensure_character(snapshot, from);
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.cell = snapshot.cell;
            actor.tweens.push(tween.start());
        }
        id
    }

    /// Attaches `tween` without changing the logical cell.
    pub fn animate_in_place(&mut self, snapshot: &CharacterSnapshot, tween: Tween) -> ActorId {
        let id = self.ensure_character(snapshot, snapshot.cell);
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.tweens.push(tween.start());
        }
        id
    }

    fn ensure_character(&mut self, snapshot: &CharacterSnapshot, start: Cell) -> ActorId {
        if let Some(id) = self.characters.get(&snapshot.id) {
            return *id;
        }
        let id = self.insert_actor(
            ActorKind::Character {
                id: snapshot.id,
                is_player: snapshot.is_player,
            },
            start,
        );
        self.characters.insert(snapshot.id, id);
        id
    }

    pub fn remove_character(&mut self, character: CharacterId) -> bool {
        match self.characters.get(&character).copied() {
            Some(id) => self.remove_actor(id),
            None => false,
        }
    }

    pub fn character_cell(&self, character: CharacterId) -> Option<Cell> {
        self.character_actor(character).map(|actor| actor.cell)
    }

    pub fn character_pose(&self, character: CharacterId) -> Option<Pose> {
        self.character_actor(character).map(|actor| actor.pose)
    }

    pub fn is_character_visible(&self, character: CharacterId) -> Option<bool> {
        self.character_actor(character).map(|actor| actor.visible)
    }

    pub fn appearance_revision(&self, character: CharacterId) -> Option<u32> {
        self.character_actor(character)
            .map(|actor| actor.appearance_revision)
    }

    /// Marks the character's equipped-visual stale so the renderer rebuilds it.
    pub fn refresh_appearance(&mut self, character: CharacterId) -> bool {
        let Some(id) = self.characters.get(&character) else {
            return false;
        };
        match self.actors.get_mut(id) {
            Some(actor) => {
                actor.appearance_revision = actor.appearance_revision.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    fn character_actor(&self, character: CharacterId) -> Option<&Actor> {
        self.characters
            .get(&character)
            .and_then(|id| self.actors.get(id))
    }

    /// Characters are visible when the player sees their cell; the player always is.
    pub fn update_character_visibility(&mut self, fov: &FieldOfView) {
        for id in self.characters.values() {
            if let Some(actor) = self.actors.get_mut(id) {
                if let ActorKind::Character { is_player, .. } = actor.kind {
                    actor.visible = is_player || fov.is_seen(actor.cell);
                }
            }
        }
    }

    pub fn show_item(&mut self, item: &ItemRef, cell: Cell, tween: Option<Tween>) -> ActorId {
        let id = match self.items.get(&item.id).copied() {
            Some(id) => id,
            None => {
                let id = self.insert_actor(ActorKind::Item(item.clone()), cell);
                self.items.insert(item.id, id);
                id
            }
        };
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.cell = cell;
            actor.pose.position = cell.as_vec2();
            if let Some(tween) = tween {
                actor.pose.alpha = 0.0;
                actor.tweens.push(tween.start());
            }
        }
        id
    }

    /// Removes the item now, or hands removal to `tween`. False when no such item is shown.
    pub fn hide_item(&mut self, item: ItemId, tween: Option<Tween>) -> bool {
        let Some(id) = self.items.get(&item).copied() else {
            return false;
        };
        match tween {
            Some(tween) => match self.actors.get_mut(&id) {
                Some(actor) => {
                    actor.tweens.push(tween.start());
                    true
                }
                None => false,
            },
            None => self.remove_actor(id),
        }
    }

    pub fn has_item(&self, item: ItemId) -> bool {
        self.items.contains_key(&item)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Removes the item actors standing on `cell` and returns what they showed.
    pub fn take_items_at(&mut self, cell: Cell) -> Vec<ItemRef> {
        let found: Vec<(ActorId, ItemRef)> = self
            .actors
            .iter()
            .filter_map(|(id, actor)| match &actor.kind {
                ActorKind::Item(item) if actor.cell == cell => Some((*id, item.clone())),
                _ => None,
            })
            .collect();
        found
            .into_iter()
            .map(|(id, item)| {
                self.remove_actor(id);
                item
            })
            .collect()
    }

    pub fn add_wall(&mut self, cell: Cell, wall: u16) -> bool {
        if self.walls.contains_key(&cell) {
            return false;
        }
        let id = self.insert_actor(ActorKind::Wall { wall }, cell);
        self.walls.insert(cell, id);
        true
    }

    pub fn has_wall(&self, cell: Cell) -> bool {
        self.walls.contains_key(&cell)
    }

    pub fn add_object(&mut self, cell: Cell, object: u16) -> bool {
        if self.objects.contains_key(&cell) {
            return false;
        }
        let id = self.insert_actor(ActorKind::Object { object }, cell);
        self.objects.insert(cell, id);
        true
    }

    pub fn has_object(&self, cell: Cell) -> bool {
        self.objects.contains_key(&cell)
    }

    pub fn add_border_object(&mut self, border: &RenderBorder, object: u16) -> bool {
        let key = (border.cell, border.side);
        if self.border_objects.contains_key(&key) {
            return false;
        }
        let id = self.insert_actor(
            ActorKind::BorderObject {
                side: border.side,
                object,
            },
            border.cell,
        );
        self.border_objects.insert(key, id);
        true
    }

    pub fn has_border_object(&self, cell: Cell, side: CardinalDirection) -> bool {
        self.border_objects.contains_key(&(cell, side))
    }

    pub fn add_marker(&mut self, border: RenderBorder) {
        self.markers.push(border);
    }

    pub fn clear_markers(&mut self) {
        self.markers.clear();
    }

    pub fn markers(&self) -> &[RenderBorder] {
        &self.markers
    }

    pub fn spawn_transient(&mut self, kind: TransientKind, cell: Cell, tween: Tween) -> ActorId {
        let id = self.insert_actor(ActorKind::Transient(kind), cell);
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.tweens.push(tween.start());
        }
        id
    }

    pub fn transient_count(&self) -> usize {
        self.actors
            .values()
            .filter(|actor| matches!(actor.kind, ActorKind::Transient(_)))
            .count()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn active_tween_count(&self) -> usize {
        self.actors.values().map(|actor| actor.tweens.len()).sum()
    }

    pub fn actor_kind(&self, id: ActorId) -> Option<&ActorKind> {
        self.actors.get(&id).map(|actor| &actor.kind)
    }

    /// Advances every running tween by `dt` seconds and reports scheduler-facing callbacks
    /// in firing order.
    pub fn act(&mut self, dt: f32, fov: &FieldOfView) -> Vec<SchedulerSignal> {
        let mut signals = Vec::new();
        let mut removals = Vec::new();
        let mut refresh_visibility = false;
        let mut fired = Vec::new();

        for (id, actor) in self.actors.iter_mut() {
            if actor.tweens.is_empty() {
                continue;
            }
            let Actor {
                kind,
                cell,
                pose,
                tweens,
                ..
            } = actor;
            tweens.retain_mut(|tween| !tween.advance(pose, dt, &mut fired));
            if tweens.is_empty() && matches!(kind, ActorKind::Character { .. }) {
                pose.position = cell.as_vec2();
            }

            for callback in fired.drain(..) {
                match callback {
                    TweenCallback::EventDone => signals.push(SchedulerSignal::Done),
                    TweenCallback::ContinueImmediately => {
                        signals.push(SchedulerSignal::ContinueImmediately)
                    }
                    TweenCallback::RemoveSelf => removals.push(*id),
                    TweenCallback::RefreshVisibility => refresh_visibility = true,
                }
            }
        }

        for id in removals {
            self.remove_actor(id);
        }
        if refresh_visibility {
            self.update_character_visibility(fov);
        }
        signals
    }

    fn insert_actor(&mut self, kind: ActorKind, cell: Cell) -> ActorId {
        self.next_actor_id = self.next_actor_id.saturating_add(1);
        let id = ActorId(self.next_actor_id);
        self.actors.insert(
            id,
            Actor {
                kind,
                cell,
                plane: self.active_plane,
                pose: Pose::at(cell.as_vec2()),
                visible: true,
                tweens: Vec::new(),
                appearance_revision: 0,
            },
        );
        id
    }

    fn remove_actor(&mut self, id: ActorId) -> bool {
        let Some(actor) = self.actors.remove(&id) else {
            return false;
        };
        match &actor.kind {
            ActorKind::Character { id: character, .. } => {
                remove_index(&mut self.characters, character, id)
            }
            ActorKind::Item(item) => remove_index(&mut self.items, &item.id, id),
            ActorKind::Wall { .. } => remove_index(&mut self.walls, &actor.cell, id),
            ActorKind::Object { .. } => remove_index(&mut self.objects, &actor.cell, id),
            ActorKind::BorderObject { side, .. } => {
                remove_index(&mut self.border_objects, &(actor.cell, *side), id)
            }
            ActorKind::Transient(_) => {}
        }
        true
    }
}

fn remove_index<K: std::hash::Hash + Eq>(index: &mut HashMap<K, ActorId>, key: &K, id: ActorId) {
    if index.get(key) == Some(&id) {
        index.remove(key);
    }
}
