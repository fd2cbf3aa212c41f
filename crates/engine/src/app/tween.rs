use super::scene::Vec2;

const EXP_BASE: f32 = 2.0;
const EXP_POWER: f32 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ease {
    #[default]
    Linear,
    Exp5In,
    Exp5Out,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let min = EXP_BASE.powf(-EXP_POWER);
        let scale = 1.0 / (1.0 - min);
        match self {
            Self::Linear => t,
            Self::Exp5In => (EXP_BASE.powf(EXP_POWER * (t - 1.0)) - min) * scale,
            Self::Exp5Out => 1.0 - (EXP_BASE.powf(-EXP_POWER * t) - min) * scale,
        }
    }
}

/// Callbacks a tween can fire. Scheduler-facing ones are forwarded out of `Stage::act`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenCallback {
    EventDone,
    ContinueImmediately,
    RemoveSelf,
    RefreshVisibility,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec2,
    pub alpha: f32,
    pub rotation_degrees: f32,
}

impl Pose {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            alpha: 1.0,
            rotation_degrees: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tween {
    MoveTo {
        target: Vec2,
        duration: f32,
        ease: Ease,
    },
    MoveBy {
        delta: Vec2,
        duration: f32,
        ease: Ease,
    },
    AlphaTo {
        alpha: f32,
        duration: f32,
    },
    RotateBy {
        degrees: f32,
        duration: f32,
    },
    Delay {
        duration: f32,
    },
    Run(TweenCallback),
    Sequence(Vec<Tween>),
    Parallel(Vec<Tween>),
}

impl Tween {
    pub fn move_to(target: Vec2, duration: f32) -> Self {
        Self::MoveTo {
            target,
            duration,
            ease: Ease::Linear,
        }
    }

    pub fn move_by(delta: Vec2, duration: f32) -> Self {
        Self::MoveBy {
            delta,
            duration,
            ease: Ease::Linear,
        }
    }

    pub fn move_by_eased(delta: Vec2, duration: f32, ease: Ease) -> Self {
        Self::MoveBy {
            delta,
            duration,
            ease,
        }
    }

    pub fn alpha_to(alpha: f32, duration: f32) -> Self {
        Self::AlphaTo { alpha, duration }
    }

    pub fn rotate_by(degrees: f32, duration: f32) -> Self {
        Self::RotateBy { degrees, duration }
    }

    pub fn delay(duration: f32) -> Self {
        Self::Delay { duration }
    }

    pub fn run(callback: TweenCallback) -> Self {
        Self::Run(callback)
    }

    pub fn sequence(steps: Vec<Tween>) -> Self {
        Self::Sequence(steps)
    }

    pub fn parallel(steps: Vec<Tween>) -> Self {
        Self::Parallel(steps)
    }

    /// Total running time in seconds.
    pub fn duration(&self) -> f32 {
        match self {
            Self::MoveTo { duration, .. }
            | Self::MoveBy { duration, .. }
            | Self::AlphaTo { duration, .. }
            | Self::RotateBy { duration, .. }
            | Self::Delay { duration } => duration.max(0.0),
            Self::Run(_) => 0.0,
            Self::Sequence(steps) => steps.iter().map(Tween::duration).sum(),
            Self::Parallel(steps) => steps.iter().map(Tween::duration).fold(0.0, f32::max),
        }
    }

    /// Time from start until `callback` first fires, if it fires at all.
    pub fn callback_time(&self, callback: TweenCallback) -> Option<f32> {
        match self {
            Self::Run(own) if *own == callback => Some(0.0),
            Self::Sequence(steps) => {
                let mut elapsed = 0.0;
                for step in steps {
                    if let Some(offset) = step.callback_time(callback) {
                        return Some(elapsed + offset);
                    }
                    elapsed += step.duration();
                }
                None
            }
            Self::Parallel(steps) => steps
                .iter()
                .filter_map(|step| step.callback_time(callback))
                .reduce(f32::min),
            _ => None,
        }
    }

    pub fn fires(&self, callback: TweenCallback) -> bool {
        self.callback_time(callback).is_some()
    }

    pub(crate) fn start(self) -> RunningTween {
        RunningTween {
            root: Node::from_tween(self),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RunningTween {
    root: Node,
}

impl RunningTween {
    /// Advances by `dt` seconds; returns true once every step has finished.
    pub(crate) fn advance(
        &mut self,
        pose: &mut Pose,
        dt: f32,
        fired: &mut Vec<TweenCallback>,
    ) -> bool {
        self.root.advance(pose, dt.max(0.0), fired).is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Timed {
    MoveTo { target: Vec2, start: Vec2 },
    MoveBy { delta: Vec2 },
    AlphaTo { target: f32, start: f32 },
    RotateBy { degrees: f32 },
    Delay,
}

#[derive(Debug, Clone)]
enum Node {
    Timed {
        kind: Timed,
        duration: f32,
        ease: Ease,
        elapsed: f32,
        applied: f32,
        started: bool,
    },
    Run {
        callback: TweenCallback,
        fired: bool,
    },
    Sequence {
        children: Vec<Node>,
        current: usize,
    },
    Parallel {
        children: Vec<Node>,
        finished: Vec<bool>,
    },
}

impl Node {
    fn from_tween(tween: Tween) -> Self {
        match tween {
            Tween::MoveTo {
                target,
                duration,
                ease,
            } => Self::timed(
                Timed::MoveTo {
                    target,
                    start: Vec2::ZERO,
                },
                duration,
                ease,
            ),
            Tween::MoveBy {
                delta,
                duration,
                ease,
            } => Self::timed(Timed::MoveBy { delta }, duration, ease),
            Tween::AlphaTo { alpha, duration } => Self::timed(
                Timed::AlphaTo {
                    target: alpha,
                    start: 1.0,
                },
                duration,
                Ease::Linear,
            ),
            Tween::RotateBy { degrees, duration } => {
                Self::timed(Timed::RotateBy { degrees }, duration, Ease::Linear)
            }
            Tween::Delay { duration } => Self::timed(Timed::Delay, duration, Ease::Linear),
            Tween::Run(callback) => Self::Run {
                callback,
                fired: false,
            },
            Tween::Sequence(steps) => Self::Sequence {
                children: steps.into_iter().map(Node::from_tween).collect(),
                current: 0,
            },
            Tween::Parallel(steps) => {
                let children: Vec<Node> = steps.into_iter().map(Node::from_tween).collect();
                let finished = vec![false; children.len()];
                Self::Parallel { children, finished }
            }
        }
    }

    fn timed(kind: Timed, duration: f32, ease: Ease) -> Self {
        Self::Timed {
            kind,
            duration: duration.max(0.0),
            ease,
            elapsed: 0.0,
            applied: 0.0,
            started: false,
        }
    }

    /// Returns the unused part of `dt` once this node has finished.
    fn advance(&mut self, pose: &mut Pose, dt: f32, fired: &mut Vec<TweenCallback>) -> Option<f32> {
        match self {
            Self::Timed {
                kind,
                duration,
                ease,
                elapsed,
                applied,
                started,
            } => {
                if !*started {
                    *started = true;
                    match kind {
                        Timed::MoveTo { start, .. } => *start = pose.position,
                        Timed::AlphaTo { start, .. } => *start = pose.alpha,
                        _ => {}
                    }
                }
                *elapsed += dt;
                let t = if *duration <= 0.0 {
                    1.0
                } else {
                    (*elapsed / *duration).min(1.0)
                };
                let progress = ease.apply(t);
                match *kind {
                    Timed::MoveTo { target, start } => {
                        pose.position = start + (target - start).scaled(progress);
                    }
                    Timed::MoveBy { delta } => {
                        pose.position = pose.position + delta.scaled(progress - *applied);
                    }
                    Timed::AlphaTo { target, start } => {
                        pose.alpha = start + (target - start) * progress;
                    }
                    Timed::RotateBy { degrees } => {
                        pose.rotation_degrees += degrees * (progress - *applied);
                    }
                    Timed::Delay => {}
                }
                *applied = progress;
                if *elapsed >= *duration {
                    Some(*elapsed - *duration)
                } else {
                    None
                }
            }
            Self::Run { callback, fired: done } => {
                if !*done {
                    *done = true;
                    fired.push(*callback);
                }
                Some(dt)
            }
            Self::Sequence { children, current } => {
                let mut remaining = dt;
                while let Some(child) = children.get_mut(*current) {
                    let left = child.advance(pose, remaining, fired)?;
                    *current += 1;
                    remaining = left;
                }
                Some(remaining)
            }
            Self::Parallel { children, finished } => {
                let mut leftover = dt;
                for (child, done) in children.iter_mut().zip(finished.iter_mut()) {
                    if *done {
                        continue;
                    }
                    match child.advance(pose, dt, fired) {
                        Some(left) => {
                            *done = true;
                            leftover = leftover.min(left);
                        }
                        None => leftover = 0.0,
                    }
                }
                if finished.iter().all(|done| *done) {
                    Some(leftover)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn run_to_end(tween: Tween, pose: &mut Pose, dt: f32) -> Vec<TweenCallback> {
        let mut running = tween.start();
        let mut fired = Vec::new();
        for _ in 0..1000 {
            if running.advance(pose, dt, &mut fired) {
                return fired;
            }
        }
        panic!("tween never finished");
    }

    #[test]
    fn ease_endpoints_are_exact() {
        for ease in [Ease::Linear, Ease::Exp5In, Ease::Exp5Out] {
            assert!(approx_eq(ease.apply(0.0), 0.0), "{ease:?}");
            assert!(approx_eq(ease.apply(1.0), 1.0), "{ease:?}");
        }
        assert!(Ease::Exp5Out.apply(0.5) > 0.5);
        assert!(Ease::Exp5In.apply(0.5) < 0.5);
    }

    #[test]
    fn move_to_lands_on_target() {
        let mut pose = Pose::at(Vec2::new(3.0, 3.0));
        run_to_end(Tween::move_to(Vec2::new(4.0, 3.0), 0.1), &mut pose, 0.016);
        assert!(approx_eq(pose.position.x, 4.0));
        assert!(approx_eq(pose.position.y, 3.0));
    }

    #[test]
    fn parallel_move_by_steps_compose() {
        let mut pose = Pose::at(Vec2::new(0.0, 0.0));
        let leap = Tween::parallel(vec![
            Tween::move_by(Vec2::new(2.0, 0.0), 0.3),
            Tween::sequence(vec![
                Tween::move_by_eased(Vec2::new(0.0, -1.0), 0.15, Ease::Exp5Out),
                Tween::move_by_eased(Vec2::new(0.0, 1.0), 0.15, Ease::Exp5In),
            ]),
        ]);
        run_to_end(leap, &mut pose, 0.02);
        assert!(approx_eq(pose.position.x, 2.0));
        assert!(approx_eq(pose.position.y, 0.0));
    }

    #[test]
    fn run_step_fires_once_after_preceding_move() {
        let mut pose = Pose::at(Vec2::ZERO);
        let mut running = Tween::sequence(vec![
            Tween::move_by(Vec2::new(1.0, 0.0), 0.1),
            Tween::run(TweenCallback::EventDone),
        ])
        .start();
        let mut fired = Vec::new();
        assert!(!running.advance(&mut pose, 0.05, &mut fired));
        assert!(fired.is_empty());
        assert!(running.advance(&mut pose, 0.05, &mut fired));
        assert_eq!(fired, vec![TweenCallback::EventDone]);
        assert!(running.advance(&mut pose, 0.05, &mut fired));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn callback_time_reports_offset_inside_sequence() {
        let tween = Tween::sequence(vec![
            Tween::move_by(Vec2::new(-0.2, 0.0), 0.1),
            Tween::move_by(Vec2::new(0.7, 0.0), 0.1),
            Tween::run(TweenCallback::EventDone),
            Tween::move_by(Vec2::new(-0.5, 0.0), 0.2),
        ]);
        assert!(approx_eq(
            tween.callback_time(TweenCallback::EventDone).expect("done"),
            0.2
        ));
        assert!(approx_eq(tween.duration(), 0.4));
        assert!(!tween.fires(TweenCallback::RemoveSelf));
    }

    #[test]
    fn alpha_fade_reaches_zero() {
        let mut pose = Pose::at(Vec2::ZERO);
        run_to_end(Tween::alpha_to(0.0, 0.1), &mut pose, 0.03);
        assert!(approx_eq(pose.alpha, 0.0));
    }
}
