// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /organizations, GET /organizations
// - POST /scrape (with and without body), POST /rescrape/{id}
// - GET /scrape/status, /scrape-logs, /aum-snapshots, /usage/today

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use aum_scraper::extract::MockClient;
use aum_scraper::{build_state_with, router, ContentFetcher, FetchOutcome, MemoryStore, PipelineConfig};

const BODY_LIMIT: usize = 1024 * 1024;

struct StaticFetcher;

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        if url.contains("down") {
            return FetchOutcome::failed("HTTP 503 for ".to_string() + url);
        }
        FetchOutcome::ok(
            "<html><body><h1>Quem somos</h1><p>Mais de R$ 1,5 bi sob gestão.</p></body></html>"
                .into(),
            200,
        )
    }
}

fn test_router() -> Router {
    let mut cfg = PipelineConfig::default();
    cfg.scrape.politeness_delay_ms = 0;
    let state = build_state_with(
        &cfg,
        Arc::new(MemoryStore::new()),
        Arc::new(StaticFetcher),
        Arc::new(MockClient::new("R$ 1,5 bi", 120)),
    );
    router(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(body).expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn json_of(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();
    let (status, bytes) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn api_add_organization_then_list() {
    let app = test_router();
    let (status, bytes) = call(
        &app,
        "POST",
        "/organizations",
        Some(json!({ "name": "Gestora Alfa", "url_site": "https://alfa.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&bytes);
    assert_eq!(created["name"], "Gestora Alfa");
    assert!(created["id"].is_i64());

    let (status, bytes) = call(&app, "GET", "/organizations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes).as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn api_add_organization_rejects_blank_name() {
    let app = test_router();
    let (status, _) = call(&app, "POST", "/organizations", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_scrape_without_organizations_reports_nothing_to_do() {
    let app = test_router();
    let (status, bytes) = call(&app, "POST", "/scrape", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["message"], "No organizations found to scrape");
    assert_eq!(v["companies_processed"], 0);
}

#[tokio::test]
async fn api_scrape_runs_batch_and_updates_views() {
    let app = test_router();
    for (name, site) in [("Alfa", "https://alfa.com"), ("Beta", "https://down.example")] {
        let (status, _) = call(
            &app,
            "POST",
            "/organizations",
            Some(json!({ "name": name, "url_site": site })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, bytes) = call(&app, "POST", "/scrape", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let batch = json_of(&bytes);
    assert_eq!(batch["companies_processed"], 2);
    assert_eq!(batch["successful_scrapes"], 1);
    assert_eq!(batch["failed_scrapes"], 1);
    assert_eq!(batch["results"][0]["aum_found"], true);
    assert_eq!(batch["results"][1]["aum_found"], false);

    let (_, bytes) = call(&app, "GET", "/scrape/status", None).await;
    let s = json_of(&bytes);
    assert_eq!(s["total_companies"], 2);
    assert_eq!(s["companies_with_aum"], 1);
    assert_eq!(s["total_scrapes"], 2);
    assert_eq!(s["successful_scrapes"], 1);
    assert_eq!(s["success_rate"], 50.0);

    let (_, bytes) = call(&app, "GET", "/scrape-logs", None).await;
    assert_eq!(json_of(&bytes).as_array().map(Vec::len), Some(2));

    let (_, bytes) = call(&app, "GET", "/aum-snapshots", None).await;
    let snaps = json_of(&bytes);
    assert_eq!(snaps[0]["source_type"], "website");
    assert_eq!(snaps[0]["aum_unit"], "bi");

    let (status, bytes) = call(&app, "GET", "/usage/today", None).await;
    assert_eq!(status, StatusCode::OK);
    let usage = json_of(&bytes);
    assert_eq!(usage["total_tokens"], 120);
    assert_eq!(usage["requests_count"], 1);
}

#[tokio::test]
async fn api_rescrape_single_organization() {
    let app = test_router();
    let (_, bytes) = call(
        &app,
        "POST",
        "/organizations",
        Some(json!({ "name": "Alfa", "url_site": "https://alfa.com" })),
    )
    .await;
    let id = json_of(&bytes)["id"].as_i64().expect("id");

    let (status, bytes) = call(&app, "POST", &format!("/rescrape/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let batch = json_of(&bytes);
    assert_eq!(batch["companies_processed"], 1);
    assert_eq!(batch["results"][0]["organization_id"], id);
}

#[tokio::test]
async fn api_usage_today_is_zero_before_any_call() {
    let app = test_router();
    let (status, bytes) = call(&app, "GET", "/usage/today", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["total_tokens"], 0);
    assert_eq!(v["cost_usd"], 0.0);
}
