//! Task record: metadata + envelope.

use std::time::Instant;

use tokio::sync::watch;

use super::{TaskSnapshot, TaskState};
use crate::domain::{Outcome, TaskEnvelope};

/// Single source of truth for one job's task.
///
/// Queue structures (ready/scheduled) hold `JobId`s only; all state
/// transitions happen here. Every transition is also published on a `watch`
/// channel so callers can wait for the task to become terminal.
#[derive(Debug)]
pub struct TaskRecord {
    pub envelope: TaskEnvelope,
    state: TaskState,

    /// Number of times this task has been leased (including the current one if Running).
    pub attempts: u32,

    pub max_attempts: u32,

    pub last_error: Option<String>,

    /// Set on success.
    pub outcome: Option<Outcome>,

    /// When to retry next (RetryScheduled only).
    pub next_run_at: Option<Instant>,

    pub created_at: Instant,
    pub updated_at: Instant,

    state_tx: watch::Sender<TaskState>,
}

impl TaskRecord {
    pub fn new(envelope: TaskEnvelope, max_attempts: u32) -> Self {
        let now = Instant::now();
        let (state_tx, _) = watch::channel(TaskState::Queued);
        Self {
            envelope,
            state: TaskState::Queued,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
            outcome: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
            state_tx,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_tx.subscribe()
    }

    fn transition(&mut self, state: TaskState) {
        self.state = state;
        self.updated_at = Instant::now();
        self.state_tx.send_replace(state);
    }

    /// Mark as running (increment attempts).
    pub fn start_attempt(&mut self) {
        self.attempts += 1;
        self.transition(TaskState::Running);
    }

    pub fn mark_succeeded(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        self.transition(TaskState::Succeeded);
    }

    pub fn mark_dead(&mut self, error: String) {
        self.last_error = Some(error);
        self.transition(TaskState::Dead);
    }

    pub fn schedule_retry(&mut self, next_run_at: Instant, error: String) {
        self.next_run_at = Some(next_run_at);
        self.last_error = Some(error);
        self.transition(TaskState::RetryScheduled);
    }

    /// Move from RetryScheduled back to Queued.
    pub fn requeue(&mut self) {
        self.next_run_at = None;
        self.transition(TaskState::Queued);
    }

    /// Whether another failure would exhaust the attempt budget.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            job_id: self.envelope.job_id(),
            task_type: self.envelope.task_type().clone(),
            state: self.state,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            last_error: self.last_error.clone(),
            outcome: self.outcome.clone(),
        }
    }
}
