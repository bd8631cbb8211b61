//! AppBuilder: wiring and startup validation.

use std::sync::Arc;

use crate::domain::TaskType;
use crate::queue::Queue;
use crate::runtime::{HandlerRegistry, RegistryError, Runtime, TaskHandler};
use crate::worker::WorkerGroup;

/// Builds an `App` from a queue and a set of handlers.
///
/// ```ignore
/// let app = AppBuilder::new()
///     .register(Arc::new(RenderChartHandler::new(store, clock, settings)))?
///     .expect_tasks(&[RenderChartTask::TYPE])
///     .workers(2)
///     .build(queue)?;
/// let workers = app.start_workers();
/// ```
///
/// `build` fails fast when an expected task type has no handler, so a
/// misconfigured process never starts accepting jobs it cannot run.
pub struct AppBuilder {
    registry: HandlerRegistry,
    expected_tasks: Option<Vec<TaskType>>,
    workers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error("worker count must be at least 1")]
    NoWorkers,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            expected_tasks: None,
            workers: 1,
        }
    }

    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Result<Self, RegistryError> {
        self.registry.register(handler)?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|&t| TaskType::new(t)).collect());
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn build(self, queue: Arc<dyn Queue>) -> Result<App, BuildError> {
        if self.workers == 0 {
            return Err(BuildError::NoWorkers);
        }
        if let Some(expected_tasks) = &self.expected_tasks {
            let missing: Vec<String> = expected_tasks
                .iter()
                .filter(|t| self.registry.get(t).is_none())
                .map(|t| t.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }
        Ok(App {
            queue,
            runtime: Arc::new(Runtime::new(Arc::new(self.registry))),
            workers: self.workers,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct App {
    queue: Arc<dyn Queue>,
    runtime: Arc<Runtime>,
    workers: usize,
}

impl App {
    pub fn queue(&self) -> Arc<dyn Queue> {
        Arc::clone(&self.queue)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn start_workers(&self) -> WorkerGroup {
        WorkerGroup::spawn(self.workers, self.queue(), Arc::clone(&self.runtime))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Outcome, TaskEnvelope};
    use crate::error::ChartjobError;
    use crate::queue::{InMemoryQueue, RetryPolicy, TaskState};

    struct Noop(&'static str);

    #[async_trait]
    impl TaskHandler for Noop {
        fn task_type(&self) -> TaskType {
            TaskType::new(self.0)
        }

        async fn handle(&self, _envelope: &TaskEnvelope) -> Result<Outcome, ChartjobError> {
            Ok(Outcome::success())
        }
    }

    fn queue() -> Arc<dyn Queue> {
        Arc::new(InMemoryQueue::new(RetryPolicy::default(), 1))
    }

    #[test]
    fn build_success() {
        let app = AppBuilder::new()
            .register(Arc::new(Noop("test.a.run.v1")))
            .unwrap()
            .expect_tasks(&["test.a.run.v1"])
            .workers(3)
            .build(queue())
            .unwrap();
        assert_eq!(app.worker_count(), 3);
        assert_eq!(app.runtime().registry().len(), 1);
    }

    #[test]
    fn build_reports_missing_task_types() {
        let app = AppBuilder::new()
            .register(Arc::new(Noop("test.a.run.v1")))
            .unwrap()
            .expect_tasks(&["test.a.run.v1", "test.b.run.v1"])
            .build(queue());
        assert!(matches!(
            app,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec!["test.b.run.v1".to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        assert!(AppBuilder::new().build(queue()).is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let app = AppBuilder::new().workers(0).build(queue());
        assert!(matches!(app, Err(BuildError::NoWorkers)));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = AppBuilder::new()
            .register(Arc::new(Noop("test.a.run.v1")))
            .unwrap()
            .register(Arc::new(Noop("test.a.run.v1")));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn started_workers_drain_the_queue() {
        let app = AppBuilder::new()
            .register(Arc::new(Noop("test.a.run.v1")))
            .unwrap()
            .build(queue())
            .unwrap();
        let workers = app.start_workers();

        let queue = app.queue();
        let job_id = queue
            .enqueue(TaskType::new("test.a.run.v1"), serde_json::json!({}))
            .await
            .unwrap();
        let snap = tokio::time::timeout(Duration::from_secs(1), queue.wait(job_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.state, TaskState::Succeeded);

        workers.shutdown_and_join().await;
    }
}
