#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use chartjob_server::bootstrap::{Services, start_services};
use chartjob_server::config::ServerConfig;
use chartjob_server::router::build_app_router;

/// Worker delay used by the tests; long enough to observe PROGRESS.
pub const RENDER_DELAY_MS: u64 = 300;

pub struct TestApp {
    pub router: Router,
    pub services: Services,
    _dir: TempDir,
}

/// Build a test `ServerConfig` rooted in `dir` with short timings.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        port: 0,
        data_dir: dir.path().join("artifacts"),
        render_delay_ms: RENDER_DELAY_MS,
        gc_interval_secs: 1,
        result_wait_timeout_secs: 10,
        request_timeout_secs: 30,
        ..ServerConfig::default()
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Start services and build the router, letting the caller tweak the config.
pub async fn spawn_app_with(tweak: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    tweak(&mut config);

    let services = start_services(config.clone()).await.unwrap();
    let router = build_app_router(services.state.clone(), &config);

    TestApp {
        router,
        services,
        _dir: dir,
    }
}

/// Send a GET request through the full middleware stack.
pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Pull the job id out of the `data-jobid` attribute of a job page.
pub fn extract_job_id(html: &str) -> String {
    let marker = r#"data-jobid=""#;
    let start = html.find(marker).expect("job page carries data-jobid") + marker.len();
    let len = html[start..].find('"').unwrap();
    html[start..start + len].to_string()
}

/// GET /image_page and return the job id it embeds.
pub async fn submit_job(app: &TestApp) -> String {
    let response = get(app, "/image_page").await;
    assert_eq!(response.status(), 200);
    extract_job_id(&body_text(response).await)
}

pub async fn progress(app: &TestApp, job_id: &str) -> serde_json::Value {
    body_json(get(app, &format!("/progress?jobid={job_id}")).await).await
}
