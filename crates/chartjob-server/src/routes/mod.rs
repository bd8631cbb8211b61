pub mod health;
pub mod jobs;
pub mod pages;

use axum::Router;

use crate::state::AppState;

/// All application routes, mounted at the root.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(pages::router())
        .merge(jobs::router())
        .merge(health::router())
}
