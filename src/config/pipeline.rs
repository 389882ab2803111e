// src/config/pipeline.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

// --- env defaults & names ---
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const ENV_DAILY_BUDGET_USD: &str = "DAILY_BUDGET_USD";
pub const ENV_MAX_CONCURRENCY: &str = "MAX_CONCURRENCY";
pub const ENV_POLITENESS_DELAY_MS: &str = "POLITENESS_DELAY_MS";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub daily_budget_usd: f64,
    pub unit_price_per_1k_tokens: f64,
    /// Fraction of the daily budget after which the gate closes.
    pub threshold_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_budget_usd: 5.0,
            unit_price_per_1k_tokens: 0.01,
            threshold_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive)
    pub provider: String,
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    pub api_key: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Prefix of the filtered excerpt sent in the prompt.
    pub max_prompt_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key: "ENV".to_string(),
            max_output_tokens: 50,
            temperature: 0.1,
            max_prompt_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub max_concurrency: usize,
    pub politeness_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub render_timeout_secs: u64,
    pub max_chars: usize,
    pub user_agent: String,
    /// Explicit Chromium binary; autodetected when unset.
    pub chromium_path: Option<PathBuf>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            politeness_delay_ms: 1000,
            fetch_timeout_secs: 30,
            render_timeout_secs: 30,
            max_chars: crate::relevance::DEFAULT_MAX_CHARS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chromium_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON array of organizations loaded at startup; skipped when missing.
    pub seed_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed_path: PathBuf::from("config/organizations.json"),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let mut cfg: PipelineConfig = toml::from_str(data).context("parsing pipeline config")?;
        cfg.apply_env_overrides();
        cfg.resolve_api_key()?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $PIPELINE_CONFIG_PATH (must exist)
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PIPELINE_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.resolve_api_key()?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<f64>(ENV_DAILY_BUDGET_USD) {
            self.budget.daily_budget_usd = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_MAX_CONCURRENCY) {
            self.scrape.max_concurrency = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_POLITENESS_DELAY_MS) {
            self.scrape.politeness_delay_ms = v;
        }
    }

    // Missing key does not fail startup: the model client reports it and every
    // extraction degrades to "unavailable".
    fn resolve_api_key(&mut self) -> Result<()> {
        self.model.provider = self.model.provider.to_lowercase();
        if self.model.api_key.trim().eq_ignore_ascii_case("env") {
            self.model.api_key = match self.model.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.budget.threshold_ratio) {
            self.budget.threshold_ratio = BudgetConfig::default().threshold_ratio;
        }
        if self.budget.daily_budget_usd < 0.0 {
            self.budget.daily_budget_usd = 0.0;
        }
        self.scrape.max_concurrency = self.scrape.max_concurrency.max(1);
        if self.scrape.max_chars == 0 {
            self.scrape.max_chars = crate::relevance::DEFAULT_MAX_CHARS;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
