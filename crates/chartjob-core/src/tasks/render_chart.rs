//! The chart job: wait, synthesize a series, render it, store the PNG.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chart::{ChartOptions, render_line_chart, synthetic_series};
use crate::domain::{Artifact, Outcome, Task, TaskEnvelope, TaskType};
use crate::error::ChartjobError;
use crate::ports::{ArtifactStore, Clock};
use crate::runtime::TaskHandler;

pub const PNG_CONTENT_TYPE: &str = "image/png";

const DEFAULT_POINTS: usize = 10;
const POINTS_RANGE: RangeInclusive<usize> = 2..=60;

fn default_points() -> usize {
    DEFAULT_POINTS
}

/// Payload of `chartjob.chart.render.v1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderChartTask {
    #[serde(default = "default_points")]
    pub points: usize,
}

impl Default for RenderChartTask {
    fn default() -> Self {
        Self {
            points: DEFAULT_POINTS,
        }
    }
}

impl Task for RenderChartTask {
    const TYPE: &'static str = "chartjob.chart.render.v1";
}

impl RenderChartTask {
    pub fn validate(&self) -> Result<(), ChartjobError> {
        if !POINTS_RANGE.contains(&self.points) {
            return Err(ChartjobError::InvalidTask(format!(
                "points must be within {}..={}, got {}",
                POINTS_RANGE.start(),
                POINTS_RANGE.end(),
                self.points
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Simulated upstream latency before rendering starts.
    pub delay: Duration,
    pub chart: ChartOptions,
    /// How long the PNG stays fetchable.
    pub ttl: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            chart: ChartOptions::default(),
            ttl: Duration::from_secs(600),
        }
    }
}

pub struct RenderChartHandler {
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    settings: RenderSettings,
}

impl RenderChartHandler {
    pub fn new(store: Arc<dyn ArtifactStore>, clock: Arc<dyn Clock>, settings: RenderSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }
}

#[async_trait]
impl TaskHandler for RenderChartHandler {
    fn task_type(&self) -> TaskType {
        RenderChartTask::task_type()
    }

    async fn handle(&self, envelope: &TaskEnvelope) -> Result<Outcome, ChartjobError> {
        let job_id = envelope.job_id();
        let task: RenderChartTask = envelope.decode()?;
        task.validate()?;

        if !self.settings.delay.is_zero() {
            debug!(%job_id, delay_ms = self.settings.delay.as_millis() as u64, "waiting for upstream");
            tokio::time::sleep(self.settings.delay).await;
        }

        let start = self.clock.now().date_naive();
        let points = {
            let mut rng = rand::thread_rng();
            synthetic_series(start, task.points, &mut rng)
        };
        let summary = serde_json::to_value(&points).map_err(|source| {
            ChartjobError::InvalidPayload {
                task_type: envelope.task_type().clone(),
                source,
            }
        })?;

        let options = self.settings.chart;
        let png = tokio::task::spawn_blocking(move || render_line_chart(&points, &options))
            .await
            .map_err(|e| ChartjobError::Other(format!("render task failed: {e}")))??;

        let handle = self
            .store
            .put(png, PNG_CONTENT_TYPE, self.settings.ttl)
            .await?;
        info!(%job_id, artifact = %handle.name, size = handle.size, "chart rendered");

        Ok(Outcome::success()
            .with_artifact(Artifact::Stored(handle))
            .with_artifact(Artifact::Json(summary)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::domain::{JobId, OutcomeKind};
    use crate::impls::FsArtifactStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    async fn handler(dir: &std::path::Path, delay: Duration) -> (RenderChartHandler, Arc<FsArtifactStore>) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 30, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(FsArtifactStore::open(dir, clock.clone()).await.unwrap());
        let settings = RenderSettings {
            delay,
            ..RenderSettings::default()
        };
        (RenderChartHandler::new(store.clone(), clock, settings), store)
    }

    fn envelope(payload: serde_json::Value) -> TaskEnvelope {
        TaskEnvelope::new(
            JobId::from_ulid(Ulid::new()),
            RenderChartTask::task_type(),
            payload,
        )
    }

    #[test]
    fn payload_defaults_to_ten_points() {
        let task: RenderChartTask = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(task, RenderChartTask::default());
        assert_eq!(task.points, 10);
    }

    #[rstest]
    #[case(1, false)]
    #[case(2, true)]
    #[case(10, true)]
    #[case(60, true)]
    #[case(61, false)]
    fn validates_point_count(#[case] points: usize, #[case] ok: bool) {
        assert_eq!(RenderChartTask { points }.validate().is_ok(), ok);
    }

    #[tokio::test]
    async fn renders_and_stores_png() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(dir.path(), Duration::ZERO).await;

        let outcome = handler.handle(&envelope(serde_json::json!({}))).await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Success);

        let handle = outcome.stored_artifact().unwrap().clone();
        assert_eq!(handle.content_type, "image/png");

        let bytes = store.take(&handle).await.unwrap();
        assert_eq!(bytes.len() as u64, handle.size);
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    #[tokio::test]
    async fn series_starts_today_per_clock() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _store) = handler(dir.path(), Duration::ZERO).await;

        let outcome = handler
            .handle(&envelope(serde_json::json!({"points": 3})))
            .await
            .unwrap();
        let summary = outcome
            .artifacts
            .iter()
            .find_map(|a| match a {
                Artifact::Json(v) => Some(v.clone()),
                Artifact::Stored(_) => None,
            })
            .unwrap();

        let days: Vec<&str> = summary
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["day"].as_str().unwrap())
            .collect();
        assert_eq!(days, ["2024-03-30", "2024-03-31", "2024-04-01"]);
    }

    #[tokio::test]
    async fn waits_for_configured_delay() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _store) = handler(dir.path(), Duration::from_millis(50)).await;

        let started = Instant::now();
        handler.handle(&envelope(serde_json::json!({}))).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn rejects_out_of_range_points() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(dir.path(), Duration::ZERO).await;

        let err = handler
            .handle(&envelope(serde_json::json!({"points": 500})))
            .await
            .unwrap_err();
        assert!(matches!(err, ChartjobError::InvalidTask(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn rejects_malformed_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _store) = handler(dir.path(), Duration::ZERO).await;

        let err = handler
            .handle(&envelope(serde_json::json!({"points": "many"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ChartjobError::InvalidPayload { .. }));
    }
}
