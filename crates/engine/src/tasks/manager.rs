use tracing::{debug, error, info};

use super::{Task, TaskContext, TaskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTick {
    /// The task had already ended; the slot is now empty.
    Finished,
    Stepped,
    /// Danger was perceived after the step; the task was dropped.
    Interrupted,
}

/// Single slot for the active player intent.
#[derive(Debug, Default)]
pub struct TaskManager {
    current: Option<Box<dyn Task>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `task` when the slot is empty. An occupied slot is left untouched.
    pub fn try_set(&mut self, task: Box<dyn Task>) -> bool {
        if let Some(current) = &self.current {
            debug!(
                active = current.label(),
                rejected = task.label(),
                "task_slot_occupied"
            );
            return false;
        }
        info!(task = task.label(), "task_started");
        self.current = Some(task);
        true
    }

    pub fn has_task(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_label(&self) -> Option<&'static str> {
        self.current.as_ref().map(|task| task.label())
    }

    /// Advances the active task by one step.
    pub fn tick(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskTick, TaskError> {
        let Some(task) = self.current.as_mut() else {
            return Err(TaskError::NoActiveTask);
        };

        if task.ended(ctx.world) {
            info!(task = task.label(), "task_finished");
            self.current = None;
            return Ok(TaskTick::Finished);
        }

        if let Err(err) = task.execute(ctx) {
            error!(task = task.label(), error = %err, "task_step_failed");
            self.current = None;
            return Err(err);
        }

        if ctx.world.is_under_threat() {
            info!(task = task.label(), "task_interrupted_by_threat");
            self.cancel();
            return Ok(TaskTick::Interrupted);
        }
        Ok(TaskTick::Stepped)
    }

    /// Clears the slot unconditionally, returning the dropped task.
    pub fn cancel(&mut self) -> Option<Box<dyn Task>> {
        let mut task = self.current.take()?;
        task.cancel();
        debug!(task = task.label(), "task_cancelled");
        Some(task)
    }
}
