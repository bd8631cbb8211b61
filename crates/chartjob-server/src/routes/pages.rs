use axum::extract::State;
use axum::response::Html;
use axum::{Router, routing::get};
use chartjob_core::queue::submit;
use chartjob_core::tasks::RenderChartTask;

use crate::error::AppResult;
use crate::pages;
use crate::state::AppState;

/// GET / -- landing page.
async fn index() -> Html<String> {
    Html(pages::landing_page())
}

/// GET /image_page -- enqueue a chart job and return the page that polls it.
async fn image_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    let job_id = submit(&*state.queue, &RenderChartTask::default()).await?;
    tracing::info!(%job_id, "chart job submitted");

    Ok(Html(pages::job_page(&job_id, &state.poll_policy)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/image_page", get(image_page))
}
