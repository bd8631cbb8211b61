use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::queue::{Queue, TaskLease};
use crate::runtime::Runtime;

/// Worker group handle.
/// - `request_shutdown` stops every worker from taking new leases
/// - `shutdown_and_join` also waits for in-flight jobs to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, queue: Arc<dyn Queue>, runtime: Arc<Runtime>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let rt = Arc::clone(&runtime);
            let rx = shutdown_rx.clone();

            let join = tokio::spawn(
                worker_loop(worker_id, q, rt, rx).instrument(info_span!("worker", worker_id)),
            );
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Does not cancel in-flight handler execution.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                error!(error = %e, "worker task panicked");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn Queue>,
    runtime: Arc<Runtime>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped: nobody can ask us to stop anymore, so stop now
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = queue.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        run_one(worker_id, &runtime, lease).await;
    }
    debug!(worker_id, "worker stopped");
}

async fn run_one(worker_id: usize, runtime: &Runtime, lease: Box<dyn TaskLease>) {
    let job_id = lease.job_id();
    let envelope = lease.envelope().clone();
    debug!(worker_id, %job_id, task_type = %envelope.task_type(), "executing job");

    let reported = match runtime.execute(&envelope).await {
        Ok(outcome) if outcome.is_success() => lease.ack(outcome).await,
        Ok(outcome) => {
            let reason = outcome
                .reason
                .unwrap_or_else(|| "handler reported failure".to_string());
            lease.fail(reason).await
        }
        Err(err) => {
            warn!(worker_id, %job_id, error = %err, "handler error");
            lease.fail(err.to_string()).await
        }
    };

    if let Err(e) = reported {
        error!(worker_id, %job_id, error = %e, "failed to report job result");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Outcome, TaskEnvelope, TaskType};
    use crate::error::ChartjobError;
    use crate::queue::{InMemoryQueue, RetryPolicy, TaskState};
    use crate::runtime::{HandlerRegistry, TaskHandler};

    struct Scripted;

    #[async_trait]
    impl TaskHandler for Scripted {
        fn task_type(&self) -> TaskType {
            TaskType::new("test.scripted.run.v1")
        }

        async fn handle(&self, envelope: &TaskEnvelope) -> Result<Outcome, ChartjobError> {
            match envelope.payload()["mode"].as_str() {
                Some("ok") => Ok(Outcome::success()),
                Some("outcome") => Ok(Outcome::failure("said no")),
                _ => Err(ChartjobError::Other("exploded".to_string())),
            }
        }
    }

    fn setup() -> (Arc<InMemoryQueue>, Arc<Runtime>) {
        let queue = Arc::new(InMemoryQueue::new(RetryPolicy::default(), 1));
        let mut reg = HandlerRegistry::new();
        reg.register(Arc::new(Scripted)).unwrap();
        (queue, Arc::new(Runtime::new(Arc::new(reg))))
    }

    async fn run(mode: &str) -> crate::queue::TaskSnapshot {
        let (queue, runtime) = setup();
        let workers = WorkerGroup::spawn(2, queue.clone(), runtime);

        let job_id = queue
            .enqueue(
                TaskType::new("test.scripted.run.v1"),
                serde_json::json!({ "mode": mode }),
            )
            .await
            .unwrap();
        let snap = tokio::time::timeout(Duration::from_secs(2), queue.wait(job_id))
            .await
            .unwrap()
            .unwrap();

        workers.shutdown_and_join().await;
        snap
    }

    #[tokio::test]
    async fn successful_handler_acks() {
        let snap = run("ok").await;
        assert_eq!(snap.state, TaskState::Succeeded);
    }

    #[tokio::test]
    async fn failure_outcome_fails_lease_with_reason() {
        let snap = run("outcome").await;
        assert_eq!(snap.state, TaskState::Dead);
        assert_eq!(snap.last_error.as_deref(), Some("said no"));
    }

    #[tokio::test]
    async fn handler_error_fails_lease() {
        let snap = run("error").await;
        assert_eq!(snap.state, TaskState::Dead);
        assert_eq!(snap.last_error.as_deref(), Some("exploded"));
    }

    #[tokio::test]
    async fn unknown_task_type_fails_lease() {
        let (queue, runtime) = setup();
        let workers = WorkerGroup::spawn(1, queue.clone(), runtime);

        let job_id = queue
            .enqueue(TaskType::new("test.unknown.run.v1"), serde_json::json!({}))
            .await
            .unwrap();
        let snap = tokio::time::timeout(Duration::from_secs(2), queue.wait(job_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.state, TaskState::Dead);
        assert!(snap.last_error.unwrap().contains("handler not found"));

        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn idle_workers_stop_on_shutdown() {
        let (queue, runtime) = setup();
        let workers = WorkerGroup::spawn(3, queue, runtime);
        assert_eq!(workers.len(), 3);

        tokio::time::timeout(Duration::from_secs(1), workers.shutdown_and_join())
            .await
            .unwrap();
    }
}
