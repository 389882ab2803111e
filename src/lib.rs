// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod budget;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod processor;
pub mod relevance;
pub mod store;
pub mod units;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::budget::BudgetGate;
pub use crate::config::PipelineConfig;
pub use crate::extract::{parse_reply, ValueExtractor};
pub use crate::fetch::{ContentFetcher, FetchOutcome, FetchStrategy, WebFetcher};
pub use crate::orchestrator::BatchOrchestrator;
pub use crate::processor::SourceProcessor;
pub use crate::store::{MemoryStore, PersistenceSink};

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::extract::DynCompletionClient;
use crate::fetch::DynFetcher;
use crate::store::DynSink;

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// Safe to call when a subscriber is already set (it is left in place).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aum_scraper=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        warn!("tracing subscriber already installed; keeping existing one");
    }
}

/// Wire the pipeline around explicit collaborators (tests inject mocks here).
pub fn build_state_with(
    cfg: &PipelineConfig,
    sink: DynSink,
    fetcher: DynFetcher,
    client: DynCompletionClient,
) -> AppState {
    let budget = Arc::new(BudgetGate::new(sink.clone(), &cfg.budget));
    let extractor = Arc::new(ValueExtractor::new(client, budget.clone(), &cfg.model));
    let processor = Arc::new(SourceProcessor::new(
        fetcher,
        extractor,
        sink.clone(),
        cfg.scrape.max_chars,
        Duration::from_millis(cfg.scrape.politeness_delay_ms),
    ));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        sink.clone(),
        processor,
        cfg.scrape.max_concurrency,
    ));
    AppState {
        sink,
        orchestrator,
        budget,
    }
}

/// Production wiring: seeded memory store, real fetchers and model client from config.
pub fn build_state(cfg: &PipelineConfig) -> Result<AppState> {
    let store = if cfg.store.seed_path.exists() {
        MemoryStore::from_seed_file(&cfg.store.seed_path)?
    } else {
        warn!(path = %cfg.store.seed_path.display(), "organization seed not found, starting empty");
        MemoryStore::new()
    };
    let sink: DynSink = Arc::new(store);
    let fetcher: DynFetcher =
        Arc::new(WebFetcher::from_config(&cfg.scrape).context("building fetcher")?);
    let client = extract::build_client_from_config(&cfg.model).context("building model client")?;
    info!(
        provider = client.provider_name(),
        model = %cfg.model.model,
        key_len = cfg.model.api_key.len(),
        daily_budget_usd = cfg.budget.daily_budget_usd,
        max_concurrency = cfg.scrape.max_concurrency,
        "pipeline configured"
    );
    Ok(build_state_with(cfg, sink, fetcher, client))
}
