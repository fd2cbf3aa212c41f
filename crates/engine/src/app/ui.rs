use std::collections::{BTreeSet, VecDeque};

use super::scene::{Cell, CharacterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UiPortion {
    Inventory,
    Equipment,
    StatusBar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveView {
    #[default]
    Loading,
    World,
}

/// Structured message-log line; the UI layer turns it into localized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    SoundFromCell {
        sound: String,
        cell: Cell,
    },
    SoundFromPlayer {
        sound: String,
    },
    SoundFromCharacter {
        sound: String,
        character: CharacterId,
    },
    Damage {
        character: CharacterId,
        amount: u32,
        damage_type: String,
    },
    Death {
        character: CharacterId,
    },
    Speech {
        character: CharacterId,
        text: String,
    },
}

#[derive(Debug, Clone)]
pub struct MessageLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Appends `entry`, dropping the oldest line once full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UiState {
    view: ActiveView,
    pending: BTreeSet<UiPortion>,
    log: MessageLog,
}

impl UiState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            view: ActiveView::Loading,
            pending: BTreeSet::new(),
            log: MessageLog::new(log_capacity),
        }
    }

    pub fn request_refresh(&mut self, portion: UiPortion) {
        self.pending.insert(portion);
    }

    pub fn is_refresh_pending(&self, portion: UiPortion) -> bool {
        self.pending.contains(&portion)
    }

    /// Hands pending refreshes to the widget layer, in a stable order.
    pub fn take_pending_refreshes(&mut self) -> Vec<UiPortion> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn activate_world_view(&mut self) {
        self.view = ActiveView::World;
    }

    pub fn active_view(&self) -> ActiveView {
        self.view
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }
}
