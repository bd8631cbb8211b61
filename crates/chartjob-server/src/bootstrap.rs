//! Service wiring shared by `main` and the integration tests.

use std::sync::Arc;

use chartjob_core::app::{AppBuilder, BuildError, GcHandle, GcLoop};
use chartjob_core::chart::ChartOptions;
use chartjob_core::domain::Task;
use chartjob_core::impls::FsArtifactStore;
use chartjob_core::polling::PollPolicy;
use chartjob_core::ports::{ArtifactError, ArtifactStore, Clock, SystemClock, UlidGenerator};
use chartjob_core::queue::{InMemoryQueue, Queue, RetryPolicy};
use chartjob_core::runtime::RegistryError;
use chartjob_core::tasks::{RenderChartHandler, RenderChartTask, RenderSettings};
use chartjob_core::worker::WorkerGroup;

use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to open artifact store: {0}")]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Running background services plus the state handed to the router.
pub struct Services {
    pub state: AppState,
    workers: WorkerGroup,
    gc: GcHandle,
}

impl Services {
    /// Stop workers and the GC loop, waiting for in-flight jobs to finish.
    pub async fn shutdown(self) {
        self.workers.shutdown_and_join().await;
        self.gc.shutdown_and_join().await;
        tracing::info!("background services stopped");
    }
}

/// Open the artifact store, build the queue and handlers, start workers and GC.
pub async fn start_services(config: ServerConfig) -> Result<Services, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn ArtifactStore> = Arc::new(
        FsArtifactStore::open(config.data_dir.clone(), Arc::clone(&clock))
            .await?
            .with_tombstone_grace(config.tombstone_grace()),
    );

    let queue: Arc<dyn Queue> = Arc::new(
        InMemoryQueue::new(RetryPolicy::default(), config.max_attempts)
            .with_id_generator(Arc::new(UlidGenerator::new(Arc::clone(&clock)))),
    );

    let settings = RenderSettings {
        delay: config.render_delay(),
        chart: ChartOptions::default(),
        ttl: config.artifact_ttl(),
    };

    let app = AppBuilder::new()
        .register(Arc::new(RenderChartHandler::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            settings,
        )))?
        .expect_tasks(&[RenderChartTask::TYPE])
        .workers(config.workers)
        .build(Arc::clone(&queue))?;

    let workers = app.start_workers();
    let gc = GcLoop::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        config.gc_interval(),
        config.job_retention(),
    )
    .spawn();

    tracing::info!(
        workers = workers.len(),
        data_dir = %config.data_dir.display(),
        "background services started"
    );

    let poll_policy = PollPolicy::default().with_max_attempts(config.poll_max_attempts);

    Ok(Services {
        state: AppState {
            queue,
            store,
            config: Arc::new(config),
            poll_policy,
        },
        workers,
        gc,
    })
}
