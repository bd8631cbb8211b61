use std::sync::Arc;

use chartjob_core::polling::PollPolicy;
use chartjob_core::ports::ArtifactStore;
use chartjob_core::queue::Queue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or small.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn Queue>,
    pub store: Arc<dyn ArtifactStore>,
    pub config: Arc<ServerConfig>,
    /// Schedule the job page script follows.
    pub poll_policy: PollPolicy,
}
