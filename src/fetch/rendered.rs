// src/fetch/rendered.rs
//! Browser-rendered fetch using chromiumoxide. One isolated browser per fetch,
//! always closed afterwards, including when navigation fails or times out.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ContentFetcher, FetchOutcome};
use crate::config::pipeline::ScrapeConfig;

#[derive(Clone)]
pub struct RenderedFetcher {
    chromium_path: Option<PathBuf>,
    user_agent: String,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(cfg: &ScrapeConfig) -> Self {
        let chromium_path = cfg
            .chromium_path
            .clone()
            .or_else(|| std::env::var("CHROMIUM_PATH").ok().map(PathBuf::from));
        Self {
            chromium_path,
            user_agent: cfg.user_agent.clone(),
            timeout: Duration::from_secs(cfg.render_timeout_secs),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent))
            .request_timeout(self.timeout);
        if let Some(path) = &self.chromium_path {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))
    }

    async fn render(&self, url: &str) -> Result<String> {
        let (mut browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .context("failed to launch Chromium")?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let captured = self.capture(&browser, url).await;

        // Teardown runs regardless of how capture ended.
        if let Err(e) = browser.close().await {
            debug!(target: "scrape", error = %e, "browser close failed");
        }
        let _ = browser.wait().await;
        events.abort();

        captured
    }

    async fn capture(&self, browser: &Browser, url: &str) -> Result<String> {
        let navigate = async {
            let page = browser
                .new_page(url)
                .await
                .context("navigation failed")?;
            // Settles once the page stops navigating (network mostly idle).
            page.wait_for_navigation()
                .await
                .context("waiting for page load")?;
            page.content().await.context("reading rendered document")
        };
        match tokio::time::timeout(self.timeout, navigate).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!(
                "navigation timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }
}

#[async_trait]
impl ContentFetcher for RenderedFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.render(url).await {
            Ok(html) => FetchOutcome::ok(html, 200),
            Err(e) => {
                warn!(target: "scrape", url, error = %format!("{e:#}"), "rendered fetch failed");
                FetchOutcome::failed(format!("{e:#}"))
            }
        }
    }
}
