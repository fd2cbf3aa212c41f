use std::collections::{BTreeMap, BTreeSet, HashMap};

use engine::events::{CharacterSnapshot, ItemRef, MovingStyle, RenderCell, SoundSource};
use engine::tasks::Occupant;
use engine::{Cell, CharacterId, Direction8, Event, FloorGrid, FloorTypeId, ItemId, PlaneLevel};
use engine::{Volition, WorldView};
use tracing::{debug, info};

pub(crate) const GRASS: FloorTypeId = FloorTypeId(1);
pub(crate) const SAND: FloorTypeId = FloorTypeId(2);
pub(crate) const WATER: FloorTypeId = FloorTypeId(3);

const PLAYER: CharacterId = CharacterId(1);
const WALL_STONE: u16 = 1;
const VIEW_RADIUS: u32 = 4;
const THREAT_RADIUS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    Step(Direction8),
    Attack(CharacterId),
    Idle,
    PickUp,
}

/// Holds the single request the client may have outstanding.
#[derive(Debug, Default)]
pub(crate) struct RequestSlot {
    pending: Option<Request>,
}

impl RequestSlot {
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn take(&mut self) -> Option<Request> {
        self.pending.take()
    }

    fn submit(&mut self, request: Request) {
        debug_assert!(self.pending.is_none(), "request submitted while one is pending");
        debug!(?request, "request_submitted");
        self.pending = Some(request);
    }
}

impl Volition for RequestSlot {
    fn step(&mut self, direction: Direction8) {
        self.submit(Request::Step(direction));
    }

    fn attack(&mut self, target: CharacterId) {
        self.submit(Request::Attack(target));
    }

    fn idle(&mut self) {
        self.submit(Request::Idle);
    }

    fn pick_up(&mut self) {
        self.submit(Request::PickUp);
    }
}

#[derive(Debug, Clone)]
struct Creature {
    cell: Cell,
    hostile: bool,
    health: u32,
}

/// In-memory grid world standing in for the game server.
#[derive(Debug)]
pub(crate) struct LocalSimulation {
    floors: FloorGrid,
    walls: BTreeSet<Cell>,
    creatures: BTreeMap<CharacterId, Creature>,
    items: HashMap<Cell, ItemRef>,
    visible: BTreeSet<Cell>,
}

impl LocalSimulation {
    /// A 14x8 field: grass in the west, sand in the east, a pond and a wall with one gap.
    pub(crate) fn demo() -> Self {
        let mut floors = FloorGrid::filled(14, 8, GRASS);
        for y in 0..8 {
            for x in 8..14 {
                floors.set_floor(Cell::new(x, y), SAND);
            }
        }
        for cell in [Cell::new(3, 2), Cell::new(4, 2), Cell::new(3, 3)] {
            floors.set_floor(cell, WATER);
        }
        let walls = (0..8)
            .filter(|y| *y != 5)
            .map(|y| Cell::new(6, y))
            .collect();

        let mut creatures = BTreeMap::new();
        creatures.insert(
            PLAYER,
            Creature {
                cell: Cell::new(1, 1),
                hostile: false,
                health: 10,
            },
        );
        creatures.insert(
            CharacterId(2),
            Creature {
                cell: Cell::new(11, 2),
                hostile: true,
                health: 2,
            },
        );

        let mut items = HashMap::new();
        items.insert(
            Cell::new(2, 5),
            ItemRef {
                id: ItemId(100),
                resource: "dagger".to_string(),
            },
        );

        Self {
            floors,
            walls,
            creatures,
            items,
            visible: BTreeSet::new(),
        }
    }

    pub(crate) fn floors(&self) -> &FloorGrid {
        &self.floors
    }

    pub(crate) fn view<'a>(&'a self, requests: &RequestSlot) -> SimView<'a> {
        SimView {
            sim: self,
            pending: requests.is_pending(),
        }
    }

    /// Events describing the world as the player first sees it.
    pub(crate) fn initial_events(&mut self) -> Vec<Event> {
        self.visible = self.visible_from(self.player_cell());
        let mut events = vec![Event::InitialTerrain {
            level: PlaneLevel(0),
            seen: self.visible.iter().map(|cell| self.render_cell(*cell)).collect(),
            seen_borders: Vec::new(),
        }];
        for (id, creature) in &self.creatures {
            events.push(Event::Move {
                character: self.snapshot(*id, creature.cell),
                from: creature.cell,
                to: creature.cell,
                style: MovingStyle::Step,
            });
        }
        for (cell, item) in &self.items {
            if self.visible.contains(cell) {
                events.push(Event::ItemAppear {
                    item: item.clone(),
                    cell: *cell,
                });
            }
        }
        events
    }

    /// Applies `request` and returns the events it produced, in presentation order.
    pub(crate) fn resolve(&mut self, request: Request) -> Vec<Event> {
        match request {
            Request::Step(direction) => self.step_player(direction),
            Request::Attack(target) => self.attack(target),
            Request::Idle => Vec::new(),
            Request::PickUp => self.pick_up(),
        }
    }

    fn step_player(&mut self, direction: Direction8) -> Vec<Event> {
        let from = self.player_cell();
        let (dx, dy) = direction.offset();
        let to = from.offset(dx, dy);
        if !self.can_step_on(to) {
            return Vec::new();
        }
        if let Some(player) = self.creatures.get_mut(&PLAYER) {
            player.cell = to;
        }
        let mut events = vec![Event::Move {
            character: self.snapshot(PLAYER, to),
            from,
            to,
            style: MovingStyle::Step,
        }];
        let (fov_change, revealed) = self.refresh_visibility();
        events.push(fov_change);
        for cell in revealed {
            if let Some(item) = self.items.get(&cell) {
                events.push(Event::ItemAppear {
                    item: item.clone(),
                    cell,
                });
            }
        }
        events
    }

    fn attack(&mut self, target: CharacterId) -> Vec<Event> {
        let Some(victim) = self.creatures.get(&target).cloned() else {
            return Vec::new();
        };
        let mut events = vec![
            Event::Attack {
                attacker: self.snapshot(PLAYER, self.player_cell()),
                aim: victim.cell,
            },
            Event::Sound {
                sound: "hit".to_string(),
                cell: victim.cell,
                source: SoundSource::Character { id: target },
            },
            Event::GetDamage {
                character: self.snapshot(target, victim.cell),
                amount: 1,
                damage_type: "slash".to_string(),
            },
        ];
        let health = victim.health.saturating_sub(1);
        if health == 0 {
            self.creatures.remove(&target);
            info!(character = target.0, "creature_slain");
            events.push(Event::Die {
                character: self.snapshot(target, victim.cell),
            });
        } else if let Some(creature) = self.creatures.get_mut(&target) {
            creature.health = health;
        }
        events
    }

    fn pick_up(&mut self) -> Vec<Event> {
        let cell = self.player_cell();
        match self.items.remove(&cell) {
            Some(item) => vec![
                Event::ItemDisappear {
                    item: item.clone(),
                    cell,
                },
                Event::Wield {
                    character: self.snapshot(PLAYER, cell),
                    item,
                },
            ],
            None => Vec::new(),
        }
    }

    /// Recomputes the player's view; returns the change and the newly seen cells.
    fn refresh_visibility(&mut self) -> (Event, Vec<Cell>) {
        let now = self.visible_from(self.player_cell());
        let revealed: Vec<Cell> = now.difference(&self.visible).copied().collect();
        let unseen = self.visible.difference(&now).copied().collect();
        self.visible = now;
        let event = Event::FovChange {
            seen: revealed.iter().map(|cell| self.render_cell(*cell)).collect(),
            unseen,
            seen_borders: Vec::new(),
        };
        (event, revealed)
    }

    fn visible_from(&self, origin: Cell) -> BTreeSet<Cell> {
        let radius = VIEW_RADIUS as i32;
        let mut cells = BTreeSet::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let cell = origin.offset(dx, dy);
                if self.floors.contains(cell) {
                    cells.insert(cell);
                }
            }
        }
        cells
    }

    fn render_cell(&self, cell: Cell) -> RenderCell {
        RenderCell {
            cell,
            floor: self.floors.floor_at(cell).unwrap_or(GRASS),
            wall: self.walls.contains(&cell).then_some(WALL_STONE),
            object: None,
        }
    }

    fn snapshot(&self, id: CharacterId, cell: Cell) -> CharacterSnapshot {
        CharacterSnapshot {
            id,
            cell,
            is_player: id == PLAYER,
            humanoid: id == PLAYER,
        }
    }

    fn player_cell(&self) -> Cell {
        self.creatures
            .get(&PLAYER)
            .map(|player| player.cell)
            .unwrap_or(Cell::new(0, 0))
    }

    fn is_walkable_terrain(&self, cell: Cell) -> bool {
        self.floors.contains(cell)
            && !self.walls.contains(&cell)
            && self.floors.floor_at(cell) != Some(WATER)
    }

    fn creature_at(&self, cell: Cell) -> Option<(CharacterId, &Creature)> {
        self.creatures
            .iter()
            .find(|(_, creature)| creature.cell == cell)
            .map(|(id, creature)| (*id, creature))
    }

    fn can_step_on(&self, cell: Cell) -> bool {
        self.is_walkable_terrain(cell) && self.creature_at(cell).is_none()
    }
}

/// Read access to the simulation as the client sees it for one frame.
pub(crate) struct SimView<'a> {
    sim: &'a LocalSimulation,
    pending: bool,
}

impl WorldView for SimView<'_> {
    fn player_cell(&self) -> Cell {
        self.sim.player_cell()
    }

    fn can_step_on(&self, cell: Cell) -> bool {
        self.sim.can_step_on(cell)
    }

    fn occupant(&self, cell: Cell) -> Option<Occupant> {
        self.sim
            .creature_at(cell)
            .map(|(id, creature)| Occupant {
                id,
                hostile: creature.hostile,
            })
    }

    fn is_walkable_ignoring_characters(&self, cell: Cell) -> bool {
        self.sim.is_walkable_terrain(cell)
    }

    fn is_under_threat(&self) -> bool {
        let player = self.sim.player_cell();
        self.sim.creatures.values().any(|creature| {
            creature.hostile && creature.cell.chebyshev_distance(player) <= THREAT_RADIUS
        })
    }

    fn has_pending_request(&self) -> bool {
        self.pending
    }
}
