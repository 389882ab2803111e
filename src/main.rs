//! AUM Scraper: binary entrypoint
//! Boots the Axum HTTP server, wiring the scraping pipeline, shared state, and metrics.

use aum_scraper::{build_state, init_tracing, metrics::Metrics, router, PipelineConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = PipelineConfig::load_default()?;
    let state = build_state(&cfg)?;
    let metrics = Metrics::init()?;

    let app = router(state).merge(metrics.router());
    Ok(app.into())
}
