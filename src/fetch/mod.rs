// src/fetch/mod.rs
//! Content fetching: lightweight HTTP for ordinary sites, headless Chromium for social profiles.

pub mod http;
pub mod rendered;

use async_trait::async_trait;
use metrics::histogram;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::pipeline::ScrapeConfig;

pub use http::HttpFetcher;
pub use rendered::RenderedFetcher;

/// Hosts whose pages only carry content after client-side rendering.
pub const RENDERED_DOMAINS: &[&str] = &[
    "instagram.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "linkedin.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Lightweight,
    Rendered,
}

impl FetchStrategy {
    /// Pure function of the URL: case-insensitive substring match on [`RENDERED_DOMAINS`].
    pub fn for_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if RENDERED_DOMAINS.iter().any(|d| lower.contains(d)) {
            FetchStrategy::Rendered
        } else {
            FetchStrategy::Lightweight
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Lightweight => "lightweight",
            FetchStrategy::Rendered => "rendered",
        }
    }
}

/// `(content, status_code, error)`. Failure is `status_code == 0` with an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub content: String,
    pub status_code: u16,
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn ok(content: String, status_code: u16) -> Self {
        Self {
            content,
            status_code,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            status_code: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200 && !self.content.is_empty()
    }
}

/// Never fails: every error is reported through [`FetchOutcome::failed`].
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

pub type DynFetcher = Arc<dyn ContentFetcher>;

/// Routes each URL to the strategy picked by [`FetchStrategy::for_url`].
pub struct WebFetcher {
    http: HttpFetcher,
    rendered: RenderedFetcher,
}

impl WebFetcher {
    pub fn new(http: HttpFetcher, rendered: RenderedFetcher) -> Self {
        Self { http, rendered }
    }

    pub fn from_config(cfg: &ScrapeConfig) -> anyhow::Result<Self> {
        Ok(Self::new(HttpFetcher::new(cfg)?, RenderedFetcher::new(cfg)))
    }
}

#[async_trait]
impl ContentFetcher for WebFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let strategy = FetchStrategy::for_url(url);
        let t0 = Instant::now();
        let out = match strategy {
            FetchStrategy::Lightweight => self.http.fetch(url).await,
            FetchStrategy::Rendered => self.rendered.fetch(url).await,
        };
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("fetch_duration_ms", "strategy" => strategy.as_str()).record(ms);
        debug!(
            target: "scrape",
            url,
            strategy = strategy.as_str(),
            status = out.status_code,
            len = out.content.len(),
            ms,
            "fetched"
        );
        out
    }
}
