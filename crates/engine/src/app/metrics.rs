use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

use crate::events::FrameReport;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PresentationMetricsSnapshot {
    pub fps: f32,
    pub frame_time_ms: f32,
    /// Totals since start.
    pub frames: u64,
    pub actions_started: u64,
    pub actions_completed: u64,
    pub task_steps: u64,
    /// Sampled at the end of the last frame.
    pub queue_depth: usize,
    pub in_flight: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<PresentationMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> PresentationMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: PresentationMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

/// Counts frames and scheduler activity; emits a snapshot once per interval of frame time.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    elapsed: Duration,
    interval_frames: u32,
    totals: PresentationMetricsSnapshot,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            elapsed: Duration::ZERO,
            interval_frames: 0,
            totals: PresentationMetricsSnapshot::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, report: &FrameReport) {
        self.elapsed = self.elapsed.saturating_add(frame_dt);
        self.interval_frames = self.interval_frames.saturating_add(1);
        let totals = &mut self.totals;
        totals.frames = totals.frames.saturating_add(1);
        totals.actions_started = totals.actions_started.saturating_add(report.started as u64);
        totals.actions_completed = totals
            .actions_completed
            .saturating_add(report.completed as u64);
        totals.queue_depth = report.queue_depth;
        totals.in_flight = report.in_flight;
    }

    pub(crate) fn record_task_step(&mut self) {
        self.totals.task_steps = self.totals.task_steps.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self) -> Option<PresentationMetricsSnapshot> {
        if self.elapsed < self.interval {
            return None;
        }
        let seconds = self.elapsed.as_secs_f32().max(f32::EPSILON);
        let frames = self.interval_frames.max(1) as f32;
        let snapshot = PresentationMetricsSnapshot {
            fps: self.interval_frames as f32 / seconds,
            frame_time_ms: seconds / frames * 1000.0,
            ..self.totals
        };
        self.elapsed = Duration::ZERO;
        self.interval_frames = 0;
        Some(snapshot)
    }
}
