// src/api.rs
//! HTTP surface: batch triggers plus read-only views over attempts, snapshots and usage.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::budget::BudgetGate;
use crate::model::{
    AttemptStatus, AumSnapshot, BatchResult, NewOrganization, Organization, SourceAttempt,
    SpendLedger,
};
use crate::orchestrator::BatchOrchestrator;
use crate::store::DynSink;

const RECENT_LOGS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub sink: DynSink,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub budget: Arc<BudgetGate>,
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    error!(error = ?e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/organizations", get(list_organizations).post(add_organization))
        .route("/scrape", post(start_scraping))
        .route("/scrape/status", get(scrape_status))
        .route("/rescrape/{id}", post(rescrape_organization))
        .route("/aum-snapshots", get(aum_snapshots))
        .route("/scrape-logs", get(scrape_logs))
        .route("/usage/today", get(usage_today))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn list_organizations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    state
        .sink
        .list_organizations(None)
        .await
        .map(Json)
        .map_err(internal)
}

async fn add_organization(
    State(state): State<AppState>,
    Json(body): Json<NewOrganization>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    if body.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name must not be empty".to_string()));
    }
    let org = state
        .sink
        .add_organization(body)
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(org)))
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeReq {
    #[serde(default)]
    organization_ids: Option<Vec<i64>>,
}

async fn start_scraping(
    State(state): State<AppState>,
    body: Option<Json<ScrapeReq>>,
) -> Result<Json<BatchResult>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    state
        .orchestrator
        .run_batch(req.organization_ids)
        .await
        .map(Json)
        .map_err(internal)
}

async fn rescrape_organization(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BatchResult>, ApiError> {
    state
        .orchestrator
        .run_single(id)
        .await
        .map(Json)
        .map_err(internal)
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ScrapeStatus {
    pub total_companies: usize,
    pub companies_with_aum: usize,
    pub total_scrapes: usize,
    pub successful_scrapes: usize,
    pub success_rate: f64,
}

/// Summary over everything recorded so far. `success_rate` is a percentage, 1 decimal.
pub fn summarize(
    orgs: &[Organization],
    attempts: &[SourceAttempt],
    snapshots: &[AumSnapshot],
) -> ScrapeStatus {
    let mut with_aum: Vec<i64> = snapshots.iter().map(|s| s.organization_id).collect();
    with_aum.sort_unstable();
    with_aum.dedup();

    let total = attempts.len();
    let ok = attempts
        .iter()
        .filter(|a| a.status == AttemptStatus::Success)
        .count();
    let rate = if total > 0 {
        ((ok as f64 / total as f64) * 1000.0).round() / 10.0
    } else {
        0.0
    };

    ScrapeStatus {
        total_companies: orgs.len(),
        companies_with_aum: with_aum.len(),
        total_scrapes: total,
        successful_scrapes: ok,
        success_rate: rate,
    }
}

async fn scrape_status(State(state): State<AppState>) -> Result<Json<ScrapeStatus>, ApiError> {
    let orgs = state.sink.list_organizations(None).await.map_err(internal)?;
    let attempts = state
        .sink
        .recent_attempts(usize::MAX)
        .await
        .map_err(internal)?;
    let snapshots = state.sink.snapshots().await.map_err(internal)?;
    Ok(Json(summarize(&orgs, &attempts, &snapshots)))
}

async fn aum_snapshots(State(state): State<AppState>) -> Result<Json<Vec<AumSnapshot>>, ApiError> {
    state.sink.snapshots().await.map(Json).map_err(internal)
}

async fn scrape_logs(State(state): State<AppState>) -> Result<Json<Vec<SourceAttempt>>, ApiError> {
    state
        .sink
        .recent_attempts(RECENT_LOGS_LIMIT)
        .await
        .map(Json)
        .map_err(internal)
}

async fn usage_today(State(state): State<AppState>) -> Result<Json<SpendLedger>, ApiError> {
    state.budget.today_usage().await.map(Json).map_err(internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attempt(org: i64, status: AttemptStatus) -> SourceAttempt {
        SourceAttempt {
            organization_id: org,
            url: "https://a.com".into(),
            status,
            content_length: 0,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn success_rate_is_rounded_to_one_decimal() {
        let attempts = vec![
            attempt(1, AttemptStatus::Success),
            attempt(1, AttemptStatus::Failed),
            attempt(2, AttemptStatus::Failed),
        ];
        let s = summarize(&[], &attempts, &[]);
        assert_eq!(s.total_scrapes, 3);
        assert_eq!(s.successful_scrapes, 1);
        assert_eq!(s.success_rate, 33.3);
    }

    #[test]
    fn no_attempts_means_zero_rate() {
        assert_eq!(summarize(&[], &[], &[]).success_rate, 0.0);
    }
}
