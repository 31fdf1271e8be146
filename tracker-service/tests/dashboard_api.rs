use std::{path::Path, time::Duration};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tempfile::TempDir;
use tower::ServiceExt;
use tracker_service::{
    dashboard::{router, DashboardState},
    pipeline::{Pipeline, PipelineOptions},
    sources::{DynSource, FileSource, TableFormat},
};

fn dashboard(dir: &Path, registry: &str, events: &str) -> axum::Router {
    let reg = dir.join("registry.csv");
    let ev = dir.join("events.csv");
    std::fs::write(&reg, registry).unwrap();
    std::fs::write(&ev, events).unwrap();

    let pipeline: Pipeline<DynSource, DynSource> = Pipeline {
        registry: Box::new(FileSource::new(reg, TableFormat::Csv, None)),
        events: Box::new(FileSource::new(ev, TableFormat::Csv, None)),
        options: PipelineOptions::default(),
    };
    router(DashboardState::new(pipeline.cached(Duration::from_secs(60))))
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), headers)
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

const REGISTRY: &str = "Site ID,Latitude,Longitude,Region\nRIY0001,24.1,46.2,Riyadh\nRIY0002,,,Riyadh\nJED0001,21.5,39.2,Jeddah\n";
const EVENTS: &str = "Timestamp,Site ID,Latitude,Longitude\n2025-01-10 10:00:00,riy0001,,\n2025-01-12 09:00:00,RIY0002,25,47\n";

#[tokio::test]
async fn dashboard_view_reports_kpis_and_markers() {
    let dir = TempDir::new().unwrap();
    let app = dashboard(dir.path(), REGISTRY, EVENTS);

    let (status, body, _) = get(&app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    let v = json(&body);
    assert_eq!(v["state"], "ready");
    assert_eq!(v["kpis"]["total"], 3);
    assert_eq!(v["kpis"]["installed"], 2);
    assert_eq!(v["kpis"]["open"], 1);
    assert_eq!(v["kpis"]["daily_rate"], 2.0);
    assert_eq!(v["markers"].as_array().unwrap().len(), 3);
    assert_eq!(v["markers"][2]["color"], "red");
    assert_eq!(v["trend"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn sites_view_filters_by_region() {
    let dir = TempDir::new().unwrap();
    let app = dashboard(dir.path(), REGISTRY, EVENTS);

    let (status, body, _) = get(&app, "/api/sites?region=jeddah").await;
    assert_eq!(status, StatusCode::OK);
    let v = json(&body);
    assert_eq!(v["records"].as_array().unwrap().len(), 1);
    assert_eq!(v["records"][0]["site_id"], "JED0001");
    assert_eq!(v["records"][0]["status"], "Open");

    let (status, _, _) = get(&app, "/api/sites?from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exports_are_downloadable() {
    let dir = TempDir::new().unwrap();
    let app = dashboard(dir.path(), REGISTRY, EVENTS);

    let (status, body, headers) = get(&app, "/export/installation_report.html").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("installation_report.html"));
    assert!(headers.contains_key(header::ETAG));
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<td>RIY0001</td><td>Installed</td><td>2025-01-10 10:00:00</td>"));

    let (status, body, headers) = get(&app, "/export/installation_status.xlsx").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert!(body.starts_with(b"PK"));
}

#[tokio::test]
async fn schema_error_is_reported_to_the_user() {
    let dir = TempDir::new().unwrap();
    let app = dashboard(dir.path(), "Name,Latitude,Longitude\nOlaya,24,46\n", EVENTS);

    let (status, body, _) = get(&app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let v = json(&body);
    assert_eq!(v["state"], "schema_error");
    assert!(v["message"].as_str().unwrap().contains("Site ID"));
}

#[tokio::test]
async fn empty_result_is_a_warning_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let app = dashboard(dir.path(), "Site ID,Latitude,Longitude\nRIY0001,,\n", EVENTS);

    let (status, body, _) = get(&app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["state"], "empty");
}

#[tokio::test]
async fn refresh_picks_up_changed_sources() {
    let dir = TempDir::new().unwrap();
    let app = dashboard(dir.path(), REGISTRY, EVENTS);

    let (_, body, _) = get(&app, "/api/dashboard").await;
    assert_eq!(json(&body)["kpis"]["installed"], 2);

    std::fs::write(
        dir.path().join("events.csv"),
        format!("{EVENTS}2025-01-13 09:00:00,JED0001,,\n"),
    )
    .unwrap();

    // still served from the cache
    let (_, body, _) = get(&app, "/api/dashboard").await;
    assert_eq!(json(&body)["kpis"]["installed"], 2);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (_, body, _) = get(&app, "/api/dashboard").await;
    assert_eq!(json(&body)["kpis"]["installed"], 3);
}
