//! Drives the HTTP client against the real router.

use std::fs;

use api_client::{ApiClient, ControlTowerApi};
use app_config::{ApiSettings, ServerSettings};
use core_types::RunId;
use tempfile::TempDir;
use tokio::net::TcpListener;
use web_server::{AppState, create_router};

async fn serve(tmp: &TempDir) -> ApiClient {
    let settings = ServerSettings {
        runs_dir: tmp.path().join("runs"),
        pid_file: tmp.path().join("bot.pid"),
        ..ServerSettings::default()
    };
    let app = create_router(AppState::new(&settings));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiClient::new(&ApiSettings {
        base_url: format!("http://{addr}"),
        ..ApiSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn client_reads_what_the_server_serves() {
    let tmp = TempDir::new().unwrap();
    let run = tmp.path().join("runs").join("paper-20240501-120000");
    fs::create_dir_all(&run).unwrap();
    fs::write(
        run.join("run_meta.json"),
        r#"{"run_id":"paper-20240501-120000","created_at_ts":1714564800.0,
            "pair":{"a":"tok-a","b":"tok-b"},"config":{"paper":{"cash":1000}}}"#,
    )
    .unwrap();
    fs::write(
        run.join("paper_fills.csv"),
        "ts,token_id,side,price,size_usd,shares,reason\n1714564900,tok-a,BUY,0.42,25,59.5,trigger\n",
    )
    .unwrap();

    let api = serve(&tmp).await;

    let runs = api.list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].has_meta);
    assert!(!runs[0].has_summary);

    let run_id = RunId("paper-20240501-120000".into());
    let detail = api.run_detail(&run_id).await.unwrap();
    let meta = detail.meta.unwrap();
    assert_eq!(meta.pair.b, "tok-b");
    assert_eq!(meta.config.paper["cash"], 1000);
    assert!(detail.summary.is_none());

    let series = api.timeseries(&run_id).await.unwrap();
    assert_eq!(series.fills.len(), 1);
    assert_eq!(series.fills[0].reason, "trigger");
    assert!(series.equity.is_empty());

    let status = api.bot_status().await.unwrap();
    assert!(!status.running);
}

#[tokio::test]
async fn unknown_run_surfaces_as_http_status() {
    let tmp = TempDir::new().unwrap();
    let api = serve(&tmp).await;

    let err = api.run_detail(&RunId("missing".into())).await.unwrap_err();
    assert!(matches!(err, api_client::Error::HttpStatus { status: 404, .. }));
}
