use std::fs;
use std::path::Path;

use app_config::ServerSettings;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use web_server::{AppState, create_router};

fn app(dir: &Path) -> Router {
    let settings = ServerSettings {
        runs_dir: dir.join("runs"),
        pid_file: dir.join("bot.pid"),
        ..ServerSettings::default()
    };
    create_router(AppState::new(&settings))
}

fn seed_run(dir: &Path, run_id: &str) -> std::path::PathBuf {
    let run = dir.join("runs").join(run_id);
    fs::create_dir_all(&run).unwrap();
    run
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_check() {
    let tmp = TempDir::new().unwrap();
    let response = app(tmp.path())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn runs_are_listed_in_name_order() {
    let tmp = TempDir::new().unwrap();
    let second = seed_run(tmp.path(), "paper-2");
    fs::write(second.join("performance_summary.json"), "{}").unwrap();
    seed_run(tmp.path(), "paper-1");
    seed_run(tmp.path(), "evolution");

    let (status, body) = get(app(tmp.path()), "/api/runs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "runs": [
            { "run_id": "paper-1", "has_meta": false, "has_summary": false },
            { "run_id": "paper-2", "has_meta": false, "has_summary": true },
        ]})
    );
}

#[tokio::test]
async fn missing_runs_dir_lists_nothing() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = get(app(tmp.path()), "/api/runs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "runs": [] }));
}

#[tokio::test]
async fn run_detail_has_null_for_missing_files() {
    let tmp = TempDir::new().unwrap();
    let run = seed_run(tmp.path(), "paper-1");
    fs::write(
        run.join("performance_summary.json"),
        r#"{"equity": 1012.5, "fills": 4, "sharpe_like": 1.3, "regime_ok": true}"#,
    )
    .unwrap();

    let (status, body) = get(app(tmp.path()), "/api/runs/paper-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run_id"], "paper-1");
    assert!(body["meta"].is_null());
    assert_eq!(body["summary"]["equity"], 1012.5);
    assert_eq!(body["summary"]["fills"], 4);
    assert_eq!(body["summary"]["regime_ok"], true);
}

#[tokio::test]
async fn unknown_run_is_a_json_404() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = get(app(tmp.path()), "/api/runs/paper-9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "not found" }));
}

#[tokio::test]
async fn traversal_run_id_is_a_400() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = get(app(tmp.path()), "/api/runs/..%2Fsecrets/timeseries").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn timeseries_of_empty_run_has_four_empty_series() {
    let tmp = TempDir::new().unwrap();
    seed_run(tmp.path(), "paper-1");

    let (status, body) = get(app(tmp.path()), "/api/runs/paper-1/timeseries").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "equity": [], "market_mid": [], "fills": [], "orders": [] })
    );
}

#[tokio::test]
async fn timeseries_limit_keeps_latest_rows() {
    let tmp = TempDir::new().unwrap();
    let run = seed_run(tmp.path(), "paper-1");
    fs::write(
        run.join("market_mid_timeseries.csv"),
        "ts,token_id,mid\n1,tok-a,0.40\n2,tok-a,0.41\n3,tok-a,0.43\n",
    )
    .unwrap();

    let (status, body) = get(app(tmp.path()), "/api/runs/paper-1/timeseries?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let ts: Vec<f64> = body["market_mid"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["ts"].as_f64().unwrap())
        .collect();
    assert_eq!(ts, [2.0, 3.0]);

    let (status, _) = get(app(tmp.path()), "/api/runs/paper-1/timeseries?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn control_status_without_pid_file_is_stopped() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = get(app(tmp.path()), "/api/control/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "running": false, "pid": null }));
}

#[tokio::test]
async fn stop_without_pid_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let response = app(tmp.path())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/control/stop")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "ok": false, "error": "no pid file" }));
}
