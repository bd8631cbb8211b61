//! In-memory queue implementation.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use super::{RetryPolicy, TaskRecord, TaskSnapshot, TaskState};
use crate::app::QueueCounts;
use crate::domain::{JobId, Outcome, TaskEnvelope, TaskType};
use crate::error::ChartjobError;
use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
use crate::queue::{Queue, TaskLease};

/// Scheduled retry entry.
///
/// Ordering is reversed so `BinaryHeap` acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    next_run_at: Instant,
    job_id: JobId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .next_run_at
            .cmp(&self.next_run_at)
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

struct InMemoryQueueState {
    records: HashMap<JobId, TaskRecord>,

    /// Ready queue (ids only).
    ready: VecDeque<JobId>,

    /// Retry backoff queue.
    scheduled: BinaryHeap<ScheduledTask>,
}

impl InMemoryQueueState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
        }
    }

    /// Move tasks from scheduled to ready if their time has come.
    fn promote_scheduled_tasks(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.job_id)
                && record.state() == TaskState::RetryScheduled
            {
                record.requeue();
                self.ready.push_back(entry.job_id);
            }
        }
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state() {
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Succeeded => counts.succeeded += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
                TaskState::Dead => counts.dead += 1,
            }
        }
        counts
    }
}

/// Single-process broker.
///
/// One mutex guards all state; no lock is held while a handler runs.
/// Idle workers park on a `Notify` (or until the next scheduled retry).
pub struct InMemoryQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    retry_policy: RetryPolicy,
    max_attempts: u32,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryQueue {
    pub fn new(retry_policy: RetryPolicy, max_attempts: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryQueueState::new())),
            notify: Arc::new(Notify::new()),
            retry_policy,
            max_attempts: max_attempts.max(1),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
    ) -> Result<JobId, ChartjobError> {
        let job_id = {
            let mut state = self.state.lock().await;
            let mut job_id = self.ids.generate_job_id();
            while state.records.contains_key(&job_id) {
                job_id = self.ids.generate_job_id();
            }
            let envelope = TaskEnvelope::new(job_id, task_type, payload);
            state
                .records
                .insert(job_id, TaskRecord::new(envelope, self.max_attempts));
            state.ready.push_back(job_id);
            job_id
        };

        // Notify outside the lock.
        self.notify.notify_one();
        debug!(%job_id, "job enqueued");
        Ok(job_id)
    }

    async fn status(&self, job_id: JobId) -> Option<TaskSnapshot> {
        let state = self.state.lock().await;
        state.records.get(&job_id).map(TaskRecord::snapshot)
    }

    async fn wait(&self, job_id: JobId) -> Result<TaskSnapshot, ChartjobError> {
        let mut rx = {
            let state = self.state.lock().await;
            state
                .records
                .get(&job_id)
                .ok_or(ChartjobError::JobNotFound(job_id))?
                .subscribe()
        };

        // Err means the record was purged while we waited.
        rx.wait_for(|s| s.is_terminal())
            .await
            .map_err(|_| ChartjobError::JobNotFound(job_id))?;

        self.status(job_id)
            .await
            .ok_or(ChartjobError::JobNotFound(job_id))
    }

    async fn lease(&self) -> Option<Box<dyn TaskLease>> {
        loop {
            // Register interest before checking state so a notify between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled_tasks(Instant::now());

                while let Some(job_id) = state.ready.pop_front() {
                    let Some(record) = state.records.get_mut(&job_id) else {
                        continue;
                    };
                    if !record.state().is_runnable() {
                        continue;
                    }
                    record.start_attempt();
                    debug!(%job_id, attempt = record.attempts, "job leased");
                    return Some(Box::new(InMemoryLease {
                        envelope: record.envelope.clone(),
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                        retry_policy: self.retry_policy.clone(),
                    }));
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = &mut notified => {},
                    _ = tokio::time::sleep_until(wake_time.into()) => {},
                }
            } else {
                notified.await;
            }
        }
    }

    async fn counts_by_state(&self) -> Result<QueueCounts, ChartjobError> {
        let state = self.state.lock().await;
        Ok(state.counts_by_state())
    }

    async fn purge_finished(&self, older_than: Instant) -> usize {
        let mut state = self.state.lock().await;
        let before = state.records.len();
        state
            .records
            .retain(|_, record| !(record.state().is_terminal() && record.updated_at < older_than));
        let purged = before - state.records.len();
        if purged > 0 {
            debug!(purged, "purged finished jobs");
        }
        purged
    }
}

struct InMemoryLease {
    envelope: TaskEnvelope,
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    retry_policy: RetryPolicy,
}

#[async_trait]
impl TaskLease for InMemoryLease {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    async fn ack(self: Box<Self>, outcome: Outcome) -> Result<(), ChartjobError> {
        let job_id = self.envelope.job_id();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(&job_id)
            .ok_or(ChartjobError::JobNotFound(job_id))?;
        record.mark_succeeded(outcome);
        info!(%job_id, attempts = record.attempts, "job succeeded");
        Ok(())
    }

    async fn fail(self: Box<Self>, error: String) -> Result<(), ChartjobError> {
        let job_id = self.envelope.job_id();
        let should_notify = {
            let mut state = self.state.lock().await;
            let record = state
                .records
                .get_mut(&job_id)
                .ok_or(ChartjobError::JobNotFound(job_id))?;

            if record.attempts_exhausted() {
                warn!(
                    %job_id,
                    attempts = record.attempts,
                    max_attempts = record.max_attempts,
                    %error,
                    "job failed permanently"
                );
                record.mark_dead(error);
                false
            } else {
                let delay = self.retry_policy.next_delay(record.attempts);
                let next_run_at = Instant::now() + delay;
                warn!(
                    %job_id,
                    attempts = record.attempts,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "job failed, retry scheduled"
                );
                record.schedule_retry(next_run_at, error);
                state.scheduled.push(ScheduledTask {
                    next_run_at,
                    job_id,
                });
                true
            }
        };

        // A sleeping worker must recompute its wake time.
        if should_notify {
            self.notify.notify_one();
        }
        Ok(())
    }
}
