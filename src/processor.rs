// src/processor.rs
//! Per-source pipeline: Fetch → log attempt → Filter → (gated) Extract → persist snapshot.
//! One organization's sources run sequentially, in field order.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::FutureExt;
use metrics::counter;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::extract::ValueExtractor;
use crate::fetch::DynFetcher;
use crate::model::{
    AttemptStatus, AumSnapshot, Organization, OrganizationResult, SourceAttempt, SourceKind,
    SourceResult,
};
use crate::relevance;
use crate::store::DynSink;

pub struct SourceProcessor {
    fetcher: DynFetcher,
    extractor: Arc<ValueExtractor>,
    sink: DynSink,
    max_chars: usize,
    politeness_delay: Duration,
}

impl SourceProcessor {
    pub fn new(
        fetcher: DynFetcher,
        extractor: Arc<ValueExtractor>,
        sink: DynSink,
        max_chars: usize,
        politeness_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            sink,
            max_chars,
            politeness_delay,
        }
    }

    /// Run every source of `org` in order and collect the per-source results.
    pub async fn process_organization(&self, org: &Organization) -> OrganizationResult {
        let mut result = OrganizationResult::new(org);
        for (kind, url) in org.sources() {
            let source = self.process(org, kind, &url).await;
            if let Some(aum) = source.aum.as_ref().filter(|a| a.is_available) {
                result.aum_snapshots.push(aum.clone());
                result.aum_found = true;
            }
            result.scraped_urls.push(source);
        }
        info!(
            target: "scrape",
            org_id = org.id,
            sources = result.scraped_urls.len(),
            aum_found = result.aum_found,
            "organization done"
        );
        result
    }

    /// Never fails. Writes exactly one [`SourceAttempt`] for `(org, url)`, then waits
    /// the politeness delay whatever happened.
    pub async fn process(&self, org: &Organization, kind: SourceKind, url: &str) -> SourceResult {
        let logged = AtomicBool::new(false);
        let run = AssertUnwindSafe(self.run_steps(org, kind, url, &logged))
            .catch_unwind()
            .await;

        let result = match run {
            Ok(Ok(res)) => res,
            Ok(Err(e)) => self.fail(org, kind, url, &logged, format!("{e:#}")).await,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                self.fail(org, kind, url, &logged, format!("panic: {msg}"))
                    .await
            }
        };

        if !self.politeness_delay.is_zero() {
            tokio::time::sleep(self.politeness_delay).await;
        }
        result
    }

    async fn run_steps(
        &self,
        org: &Organization,
        kind: SourceKind,
        url: &str,
        logged: &AtomicBool,
    ) -> Result<SourceResult> {
        // 1) fetch
        let fetched = self.fetcher.fetch(url).await;
        let status = if fetched.status_code == 200 {
            AttemptStatus::Success
        } else {
            AttemptStatus::Failed
        };
        let content_length = fetched.content.len();

        // 2) one attempt row per source
        self.sink
            .append_attempt(SourceAttempt {
                organization_id: org.id,
                url: url.to_string(),
                status,
                content_length,
                error_message: fetched.error.clone(),
                created_at: Utc::now(),
            })
            .await
            .context("recording scrape attempt")?;
        logged.store(true, Ordering::SeqCst);
        counter!("scrape_attempts_total", "status" => status_label(status)).increment(1);

        let mut result = SourceResult {
            url: url.to_string(),
            source_kind: kind,
            status,
            content_length,
            error: fetched.error.clone(),
            aum: None,
        };

        // 3) nothing to work with
        if !fetched.is_success() {
            return Ok(result);
        }

        // 4) filter
        let excerpt = relevance::filter(&fetched.content, self.max_chars);
        if excerpt.is_empty() {
            return Ok(result);
        }

        // 5) extract + persist
        let outcome = self.extractor.extract(&org.name, &excerpt, url).await;
        if outcome.is_available {
            self.sink
                .append_snapshot(AumSnapshot {
                    organization_id: org.id,
                    aum_value: outcome.aum_value.clone(),
                    aum_numeric: outcome.aum_numeric,
                    aum_unit: outcome.aum_unit.clone(),
                    source_url: url.to_string(),
                    source_type: kind,
                    confidence_score: outcome.confidence_score,
                    is_available: true,
                    created_at: Utc::now(),
                })
                .await
                .context("persisting aum snapshot")?;
            counter!("scrape_aum_found_total").increment(1);
            info!(
                target: "scrape",
                org_id = org.id,
                source = %kind,
                value = %outcome.aum_value,
                "aum found"
            );
        }
        result.aum = Some(outcome);
        Ok(result)
    }

    async fn fail(
        &self,
        org: &Organization,
        kind: SourceKind,
        url: &str,
        logged: &AtomicBool,
        message: String,
    ) -> SourceResult {
        warn!(target: "scrape", org_id = org.id, url, error = %message, "source failed");
        // The attempt row may already exist; never write a second one for this source.
        if !logged.load(Ordering::SeqCst) {
            let attempt = SourceAttempt {
                organization_id: org.id,
                url: url.to_string(),
                status: AttemptStatus::Failed,
                content_length: 0,
                error_message: Some(message.clone()),
                created_at: Utc::now(),
            };
            match self.sink.append_attempt(attempt).await {
                Ok(()) => {
                    counter!("scrape_attempts_total", "status" => "failed").increment(1);
                }
                Err(e) => {
                    warn!(target: "scrape", url, error = ?e, "could not record failed attempt");
                }
            }
        }
        SourceResult {
            url: url.to_string(),
            source_kind: kind,
            status: AttemptStatus::Failed,
            content_length: 0,
            error: Some(message),
            aum: None,
        }
    }
}

fn status_label(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::Success => "success",
        AttemptStatus::Failed => "failed",
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
