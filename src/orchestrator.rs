// src/orchestrator.rs
//! Batch fan-out: one task per organization, at most `max_concurrency` in flight.
//! A failing or panicking organization never cancels its siblings.

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::model::{BatchResult, OrganizationResult};
use crate::processor::{panic_message, SourceProcessor};
use crate::store::DynSink;

pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scrape_attempts_total",
            "Source fetch attempts, labeled by status."
        );
        describe_counter!(
            "scrape_aum_found_total",
            "Sources that yielded an available AUM figure."
        );
        describe_counter!("extract_calls_total", "Paid model calls issued.");
        describe_counter!(
            "extract_budget_blocked_total",
            "Extractions skipped because the daily budget gate was closed."
        );
        describe_counter!("extract_errors_total", "Model call failures.");
        describe_counter!("ledger_tokens_total", "Tokens added to the spend ledger.");
        describe_counter!("batch_runs_total", "Batches executed.");
        describe_histogram!("fetch_duration_ms", "Fetch time in milliseconds.");
        describe_histogram!("batch_duration_ms", "Batch wall time in milliseconds.");
        describe_gauge!("batch_last_run_ts", "Unix ts when a batch last finished.");
    });
}

pub struct BatchOrchestrator {
    sink: DynSink,
    processor: Arc<SourceProcessor>,
    max_concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(sink: DynSink, processor: Arc<SourceProcessor>, max_concurrency: usize) -> Self {
        Self {
            sink,
            processor,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Scrape the given organizations (all when `None`).
    ///
    /// Only a failure to resolve the organization set is returned as `Err`;
    /// everything below is folded into the per-organization results.
    pub async fn run_batch(&self, organization_ids: Option<Vec<i64>>) -> Result<BatchResult> {
        ensure_metrics_described();
        let t0 = Instant::now();

        // An empty id list means "all", same as no list.
        let ids = organization_ids.filter(|v| !v.is_empty());
        let orgs = self
            .sink
            .list_organizations(ids.as_deref())
            .await
            .context("resolving organizations to scrape")?;

        if orgs.is_empty() {
            info!(target: "batch", "no organizations to scrape");
            return Ok(BatchResult::empty("No organizations found to scrape"));
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(orgs.len());
        for org in orgs.iter().cloned() {
            let (id, name) = (org.id, org.name.clone());
            let sem = semaphore.clone();
            let processor = self.processor.clone();
            let handle = tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .context("concurrency semaphore closed")?;
                Ok::<_, anyhow::Error>(processor.process_organization(&org).await)
            });
            handles.push((id, name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (id, name, handle) in handles {
            let res = match handle.await {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    warn!(target: "batch", org_id = id, error = ?e, "organization task failed");
                    OrganizationResult::failed(id, name, format!("{e:#}"))
                }
                Err(join_err) => {
                    let msg = if join_err.is_panic() {
                        format!("panic: {}", panic_message(join_err.into_panic().as_ref()))
                    } else {
                        join_err.to_string()
                    };
                    warn!(target: "batch", org_id = id, error = %msg, "organization task aborted");
                    OrganizationResult::failed(id, name, msg)
                }
            };
            results.push(res);
        }

        let processed = results.len();
        let successful = results.iter().filter(|r| r.aum_found).count();
        let failed = processed - successful;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        counter!("batch_runs_total").increment(1);
        histogram!("batch_duration_ms").record(ms);
        gauge!("batch_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        info!(
            target: "batch",
            processed,
            successful,
            failed,
            ms,
            "batch finished"
        );

        Ok(BatchResult {
            message: format!("Scraping completed for {processed} companies"),
            companies_processed: processed,
            successful_scrapes: successful,
            failed_scrapes: failed,
            results,
        })
    }

    /// Single-organization variant of [`run_batch`](Self::run_batch).
    pub async fn run_single(&self, organization_id: i64) -> Result<BatchResult> {
        self.run_batch(Some(vec![organization_id])).await
    }
}
