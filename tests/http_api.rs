use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tasksheet::AppConfig;
use tasksheet::app::{AppState, build_share_service, router};
use tasksheet::clock::ManualClock;
use tasksheet::options::ListOptions;
use tower::ServiceExt;

fn app(config: AppConfig) -> Router {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 30, 1, 0, 0).unwrap()));
    let share = build_share_service(&config, "http://10.0.0.7:8501", clock.clone());
    router(Arc::new(AppState::new(config, ListOptions::default(), share, clock)))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> Value {
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn edit_preview_and_export() {
    let app = app(AppConfig::default());

    let sheet = send_json(
        &app,
        json_request(
            "PUT",
            "/api/rows",
            json!([
                {"TaskName": "買い物", "Schedule": "1725", "Estimated": 15},
                {"TaskName": "", "Project": ". 重要"}
            ]),
        ),
    )
    .await;
    assert_eq!(sheet["rows"][0]["Schedule"], "17:25");
    assert_eq!(sheet["options"]["projects"][0], "");
    assert_eq!(sheet["estimated_choices"].as_array().unwrap().len(), 25);

    let defaults = send_json(
        &app,
        json_request(
            "PUT",
            "/api/defaults",
            json!({
                "DueDate": "2025-07-01",
                "Schedule": "930",
                "Section": "08:00",
                "Project": ". 家のこと",
                "Tag": "",
                "TaskName": "",
                "Estimated": 20
            }),
        ),
    )
    .await;
    assert_eq!(defaults["Schedule"], "09:30");

    let bulk = send_json(&app, json_request("POST", "/api/rows/bulk", json!({"text": "洗濯\n\n掃除"}))).await;
    assert_eq!(bulk["added"], 2);
    assert_eq!(bulk["rows"].as_array().unwrap().len(), 4);

    let preview = send_json(&app, empty_request("GET", "/api/preview")).await;
    let rows = preview["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        json!(["2025/07/01", "17:25", "08:00", ". 家のこと", "", "買い物", "15"])
    );
    assert_eq!(rows[2][5], "掃除");
    assert_eq!(rows[2][6], "20");

    let response = app.clone().oneshot(empty_request("GET", "/api/export")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"tasks.csv\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.starts_with(b"\xEF\xBB\xBFDueDate,Schedule,Section,Project,Tag,TaskName,Estimated\n"));
    println!("✓ edit, preview and export agree");
}

#[tokio::test]
async fn clearing_empties_the_sheet() {
    let app = app(AppConfig::default());
    send_json(&app, json_request("POST", "/api/rows/bulk", json!({"text": "a\nb"}))).await;
    send_json(&app, empty_request("DELETE", "/api/rows")).await;

    let sheet = send_json(&app, empty_request("GET", "/api/sheet")).await;
    assert!(sheet["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn payload_share_link_round_trip() {
    let app = app(AppConfig {
        public_url: Some("https://tasks.example.com".into()),
        ..AppConfig::default()
    });
    send_json(&app, json_request("POST", "/api/rows/bulk", json!({"text": "買い物"}))).await;

    let link = send_json(&app, empty_request("POST", "/api/share")).await;
    assert_eq!(link["strategy"], "payload");
    assert!(link["qr_svg"].as_str().unwrap().contains("<svg"));
    let url = link["url"].as_str().unwrap();
    let path = url.strip_prefix("https://tasks.example.com").unwrap();

    let (status, body) = send(&app, empty_request("GET", path)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("買い物"));
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = app(AppConfig::default());
    let text = "x".repeat(3 * 1024 * 1024);
    let body = json!({ "text": text }).to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/api/rows/bulk")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
