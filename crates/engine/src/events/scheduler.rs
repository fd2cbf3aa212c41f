use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use super::present::PresentationContext;
use super::translate::{Completion, Continuation, DeferredAction};

/// Scheduler-facing callbacks raised by running tweens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSignal {
    Done,
    ContinueImmediately,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("completion signalled while no action is in flight")]
    NothingInFlight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub started: u32,
    pub completed: u32,
    pub queue_depth: usize,
    pub in_flight: bool,
}

#[derive(Debug)]
struct InFlight {
    label: &'static str,
    sequence: u64,
    frames_waiting: u32,
    stall_warned: bool,
}

/// FIFO of deferred actions with at most one in flight.
#[derive(Debug)]
pub struct EventScheduler {
    queue: VecDeque<(u64, DeferredAction)>,
    in_flight: Option<InFlight>,
    continuation_requests: u64,
    next_sequence: u64,
    stall_warning_frames: u32,
    completed_since_report: u32,
}

impl EventScheduler {
    pub fn new(stall_warning_frames: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: None,
            continuation_requests: 0,
            next_sequence: 0,
            stall_warning_frames,
            completed_since_report: 0,
        }
    }

    /// Appends `action`; returns its arrival sequence number.
    pub fn enqueue(&mut self, action: DeferredAction) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        debug!(label = action.label(), sequence, "event_action_enqueued");
        self.queue.push_back((sequence, action));
        sequence
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_label(&self) -> Option<&'static str> {
        self.in_flight.as_ref().map(|in_flight| in_flight.label)
    }

    /// Completes the in-flight action. Calling it with nothing in flight is a caller bug.
    pub fn signal_done(&mut self) -> Result<(), SchedulerError> {
        debug_assert!(
            self.in_flight.is_some(),
            "signal_done called with no action in flight"
        );
        match self.in_flight.take() {
            Some(in_flight) => {
                debug!(
                    label = in_flight.label,
                    sequence = in_flight.sequence,
                    frames = in_flight.frames_waiting,
                    "event_action_completed"
                );
                self.completed_since_report = self.completed_since_report.saturating_add(1);
                Ok(())
            }
            None => {
                warn!("event_done_without_action");
                Err(SchedulerError::NothingInFlight)
            }
        }
    }

    /// Records that the in-flight action wants its successor drawn in the same frame.
    /// `run_frame` drains until something is in flight, so a completion routed before
    /// it already lets the next action start this frame.
    pub fn continue_immediately(&mut self) {
        self.continuation_requests = self.continuation_requests.saturating_add(1);
        debug!(
            label = self.in_flight_label(),
            requests = self.continuation_requests,
            "event_continue_immediately"
        );
    }

    pub fn continuation_requests(&self) -> u64 {
        self.continuation_requests
    }

    pub fn route(&mut self, signal: SchedulerSignal) -> Result<(), SchedulerError> {
        match signal {
            SchedulerSignal::Done => self.signal_done(),
            SchedulerSignal::ContinueImmediately => {
                self.continue_immediately();
                Ok(())
            }
        }
    }

    /// Starts queued actions in arrival order until one stays in flight or the queue is empty.
    pub fn run_frame(&mut self, ctx: &mut PresentationContext<'_>) -> FrameReport {
        self.track_stall();

        let mut started = 0u32;
        while self.in_flight.is_none() {
            let Some((sequence, action)) = self.queue.pop_front() else {
                break;
            };
            started = started.saturating_add(1);
            self.in_flight = Some(InFlight {
                label: action.label(),
                sequence,
                frames_waiting: 0,
                stall_warned: false,
            });
            debug!(label = action.label(), sequence, "event_action_started");

            let processed = ctx.process(&action);
            if processed.continuation == Continuation::ContinueImmediately {
                self.continue_immediately();
            }
            if processed.completion == Completion::Immediate {
                self.signal_done().ok();
            }
        }

        FrameReport {
            started,
            completed: std::mem::take(&mut self.completed_since_report),
            queue_depth: self.queue.len(),
            in_flight: self.in_flight.is_some(),
        }
    }

    fn track_stall(&mut self) {
        let threshold = self.stall_warning_frames;
        let Some(in_flight) = self.in_flight.as_mut() else {
            return;
        };
        in_flight.frames_waiting = in_flight.frames_waiting.saturating_add(1);
        if threshold > 0 && in_flight.frames_waiting >= threshold && !in_flight.stall_warned {
            in_flight.stall_warned = true;
            warn!(
                label = in_flight.label,
                sequence = in_flight.sequence,
                frames = in_flight.frames_waiting,
                "event_action_stalled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Cell, CharacterId, FieldOfView, LogEntry, Stage, UiState};
    use crate::config::ClientConfig;
    use crate::events::{translate, CharacterSnapshot, Event, MovingStyle};

    struct Harness {
        scheduler: EventScheduler,
        stage: Stage,
        fov: FieldOfView,
        ui: UiState,
        config: ClientConfig,
    }

    impl Harness {
        fn new(animations_enabled: bool) -> Self {
            Self {
                scheduler: EventScheduler::new(3),
                stage: Stage::new(),
                fov: FieldOfView::new(),
                ui: UiState::new(8),
                config: ClientConfig {
                    animations_enabled,
                    ..ClientConfig::default()
                },
            }
        }

        fn frame(&mut self, dt: f32) -> FrameReport {
            for signal in self.stage.act(dt, &self.fov) {
                self.scheduler.route(signal).expect("signal");
            }
            let mut ctx = PresentationContext {
                stage: &mut self.stage,
                fov: &mut self.fov,
                ui: &mut self.ui,
                config: &self.config,
            };
            self.scheduler.run_frame(&mut ctx)
        }
    }

    fn say(id: u64) -> Event {
        Event::Say {
            character: CharacterSnapshot {
                id: CharacterId(id),
                cell: Cell::new(0, 0),
                is_player: false,
                humanoid: false,
            },
            text: format!("line {id}"),
        }
    }

    fn npc_move(id: u64) -> Event {
        Event::Move {
            character: CharacterSnapshot {
                id: CharacterId(id),
                cell: Cell::new(1, 0),
                is_player: false,
                humanoid: false,
            },
            from: Cell::new(0, 0),
            to: Cell::new(1, 0),
            style: MovingStyle::Step,
        }
    }

    #[test]
    fn synchronous_actions_drain_in_one_frame() {
        let mut harness = Harness::new(false);
        for id in 0..3 {
            harness.scheduler.enqueue(translate(say(id)));
        }
        let report = harness.frame(0.016);
        assert_eq!(report.started, 3);
        assert_eq!(report.completed, 3);
        assert_eq!(report.queue_depth, 0);
        assert!(!report.in_flight);
        assert!(harness.scheduler.is_idle());

        let texts: Vec<&str> = harness
            .ui
            .log()
            .entries()
            .filter_map(|entry| match entry {
                LogEntry::Speech { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["line 0", "line 1", "line 2"]);
    }

    #[test]
    fn animated_action_blocks_queue_until_done() {
        let mut harness = Harness::new(true);
        harness.scheduler.enqueue(translate(npc_move(2)));
        harness.scheduler.enqueue(translate(say(2)));

        let report = harness.frame(0.016);
        assert_eq!(report.started, 1);
        assert!(report.in_flight);
        assert_eq!(harness.scheduler.in_flight_label(), Some("move"));

        let report = harness.frame(0.05);
        assert_eq!(report.started, 0);
        assert_eq!(report.queue_depth, 1);

        let report = harness.frame(0.06);
        assert_eq!(report.started, 1);
        assert_eq!(report.completed, 2);
        assert!(harness.scheduler.is_idle());
    }

    #[test]
    fn mixed_actions_finish_in_arrival_order_one_at_a_time() {
        let mut harness = Harness::new(true);
        let attacker = CharacterSnapshot {
            id: CharacterId(4),
            cell: Cell::new(2, 2),
            is_player: false,
            humanoid: false,
        };
        let events = vec![
            say(1),
            npc_move(2),
            say(3),
            Event::Attack {
                attacker,
                aim: Cell::new(3, 2),
            },
            Event::Die {
                character: CharacterSnapshot {
                    id: CharacterId(5),
                    ..attacker
                },
            },
            say(6),
        ];
        let total = events.len() as u32;
        for event in events {
            harness.scheduler.enqueue(translate(event));
        }

        let mut started = 0u32;
        let mut completed = 0u32;
        let mut blocking = Vec::new();
        for _ in 0..100 {
            for signal in harness.stage.act(0.05, &harness.fov) {
                harness.scheduler.route(signal).expect("signal");
                assert!(harness.scheduler.queue_depth() <= total as usize);
            }
            let mut ctx = PresentationContext {
                stage: &mut harness.stage,
                fov: &mut harness.fov,
                ui: &mut harness.ui,
                config: &harness.config,
            };
            let report = harness.scheduler.run_frame(&mut ctx);
            assert_eq!(report.in_flight, harness.scheduler.is_processing());
            started += report.started;
            completed += report.completed;
            assert!(started - completed <= 1, "more than one action in flight");

            if let Some(label) = harness.scheduler.in_flight_label() {
                // Everything queued ahead of the blocking action has been shown, nothing after it.
                let shown = harness.ui.log().len();
                match label {
                    "move" => assert_eq!(shown, 1),
                    "attack" => assert_eq!(shown, 2),
                    other => panic!("unexpected blocking action {other}"),
                }
                if blocking.last() != Some(&label) {
                    blocking.push(label);
                }
            }
            if harness.scheduler.is_idle() {
                break;
            }
        }

        assert!(harness.scheduler.is_idle());
        assert_eq!(started, total);
        assert_eq!(completed, total);
        assert_eq!(blocking, vec!["move", "attack"]);
        let log: Vec<LogEntry> = harness.ui.log().entries().cloned().collect();
        assert_eq!(
            log,
            vec![
                LogEntry::Speech {
                    character: CharacterId(1),
                    text: "line 1".to_string(),
                },
                LogEntry::Speech {
                    character: CharacterId(3),
                    text: "line 3".to_string(),
                },
                LogEntry::Death {
                    character: CharacterId(5),
                },
                LogEntry::Speech {
                    character: CharacterId(6),
                    text: "line 6".to_string(),
                },
            ]
        );
    }

    #[test]
    fn player_continuation_does_not_pass_the_next_blocking_action() {
        let mut harness = Harness::new(true);
        harness.scheduler.enqueue(translate(Event::Move {
            character: CharacterSnapshot {
                id: CharacterId(1),
                cell: Cell::new(1, 0),
                is_player: true,
                humanoid: true,
            },
            from: Cell::new(0, 0),
            to: Cell::new(1, 0),
            style: MovingStyle::Step,
        }));
        harness.scheduler.enqueue(translate(say(7)));
        harness.scheduler.enqueue(translate(npc_move(2)));
        harness.scheduler.enqueue(translate(say(8)));

        assert_eq!(harness.frame(0.016).started, 1);
        assert_eq!(harness.scheduler.continuation_requests(), 0);

        let report = harness.frame(0.2);
        assert_eq!(harness.scheduler.continuation_requests(), 1);
        assert_eq!(report.started, 2);
        assert_eq!(report.queue_depth, 1);
        assert_eq!(harness.scheduler.in_flight_label(), Some("move"));
        assert_eq!(harness.ui.log().len(), 1);
    }

    #[test]
    fn still_player_move_counts_a_continuation() {
        let mut harness = Harness::new(false);
        harness.scheduler.enqueue(translate(Event::Move {
            character: CharacterSnapshot {
                id: CharacterId(1),
                cell: Cell::new(1, 0),
                is_player: true,
                humanoid: false,
            },
            from: Cell::new(0, 0),
            to: Cell::new(1, 0),
            style: MovingStyle::Step,
        }));
        harness.scheduler.enqueue(translate(say(1)));
        let report = harness.frame(0.016);
        assert_eq!(report.started, 2);
        assert_eq!(harness.scheduler.continuation_requests(), 1);
    }

    #[test]
    fn stalled_action_stays_in_flight() {
        let mut harness = Harness::new(false);
        harness.scheduler.enqueue(translate(say(1)));
        harness.scheduler.in_flight = Some(InFlight {
            label: "stuck",
            sequence: 99,
            frames_waiting: 0,
            stall_warned: false,
        });
        for _ in 0..5 {
            let report = harness.frame(0.016);
            assert_eq!(report.started, 0);
        }
        let in_flight = harness.scheduler.in_flight.as_ref().expect("in flight");
        assert!(in_flight.stall_warned);
        assert_eq!(in_flight.frames_waiting, 5);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "no action in flight")]
    fn double_done_panics_in_debug() {
        let mut scheduler = EventScheduler::new(0);
        let _ = scheduler.signal_done();
    }
}
