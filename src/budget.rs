// src/budget.rs
//! Daily spend ledger + advisory budget gate for paid extraction calls.
//!
//! Soft cap: `allow()` only looks at what is already recorded, so the call that crosses
//! the threshold still completes and may push spend past the budget. The *next* call is blocked.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::pipeline::BudgetConfig;
use crate::model::SpendLedger;
use crate::store::DynSink;

pub struct BudgetGate {
    sink: DynSink,
    daily_budget_usd: f64,
    unit_price_per_1k: f64,
    threshold_ratio: f64,
    // Serializes ledger read-modify-write across concurrent organization tasks.
    lock: Mutex<()>,
}

impl BudgetGate {
    pub fn new(sink: DynSink, cfg: &BudgetConfig) -> Self {
        Self {
            sink,
            daily_budget_usd: cfg.daily_budget_usd,
            unit_price_per_1k: cfg.unit_price_per_1k_tokens,
            threshold_ratio: cfg.threshold_ratio,
            lock: Mutex::new(()),
        }
    }

    /// Spend level at which further calls are refused.
    pub fn threshold_usd(&self) -> f64 {
        self.daily_budget_usd * self.threshold_ratio
    }

    /// Deterministic cost of a token total.
    pub fn cost_for(&self, total_tokens: u64) -> f64 {
        (total_tokens as f64 / 1000.0) * self.unit_price_per_1k
    }

    /// May another paid call run today (UTC)?
    pub async fn allow(&self) -> Result<bool> {
        self.allow_on(today()).await
    }

    pub async fn allow_on(&self, date: NaiveDate) -> Result<bool> {
        let _g = self.lock.lock().await;
        let allowed = match self.sink.usage_for(date).await? {
            Some(rec) => rec.cost_usd < self.threshold_usd(),
            None => true,
        };
        if !allowed {
            debug!(target: "budget", %date, threshold = self.threshold_usd(), "budget gate closed");
        }
        Ok(allowed)
    }

    /// Add one successful call's tokens to today's ledger.
    pub async fn record_usage(&self, tokens: u64) -> Result<SpendLedger> {
        self.record_usage_on(today(), tokens).await
    }

    pub async fn record_usage_on(&self, date: NaiveDate, tokens: u64) -> Result<SpendLedger> {
        let _g = self.lock.lock().await;
        let mut rec = self
            .sink
            .usage_for(date)
            .await?
            .unwrap_or_else(|| SpendLedger::empty(date));
        rec.total_tokens = rec.total_tokens.saturating_add(tokens);
        rec.requests_count = rec.requests_count.saturating_add(1);
        rec.cost_usd = self.cost_for(rec.total_tokens);
        self.sink.upsert_usage(rec.clone()).await?;

        counter!("ledger_tokens_total").increment(tokens);
        info!(
            target: "budget",
            %date,
            tokens,
            total_tokens = rec.total_tokens,
            requests = rec.requests_count,
            cost_usd = rec.cost_usd,
            "ledger updated"
        );
        Ok(rec)
    }

    /// Today's record, or a zero record when nothing was spent yet.
    pub async fn today_usage(&self) -> Result<SpendLedger> {
        let date = today();
        Ok(self
            .sink
            .usage_for(date)
            .await?
            .unwrap_or_else(|| SpendLedger::empty(date)))
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
