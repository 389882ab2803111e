//! AI adapter: chat-completion provider abstraction used by the value extractor.
//! Returns the reply text plus the provider-reported token usage; errors are plain `anyhow`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::pipeline::ModelConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One chat-style request: fixed system instruction + user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Reply text and the token count the provider billed for the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub total_tokens: u64,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynCompletionClient = Arc<dyn CompletionClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled==false`, returns a disabled client.
/// * Else builds the real provider (OpenAI).
pub fn build_client_from_config(config: &ModelConfig) -> Result<DynCompletionClient> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockClient::new("R$ 1,5 bi", 120)));
    }

    if !config.enabled {
        return Ok(Arc::new(DisabledClient));
    }

    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        other => bail!("Unsupported model provider: {other}"),
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// OpenAI provider (uses Chat Completions API).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("aum-scraper/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building OpenAI http client")?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        })
    }

    /// Point the provider at a different base (local proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}

#[async_trait]
impl CompletionClient for OpenAiProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        if self.api_key.is_empty() {
            bail!("OPENAI_API_KEY is not configured");
        }

        let body = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.system,
                },
                Msg {
                    role: "user",
                    content: &req.prompt,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("openai returned HTTP {status}");
        }
        let parsed: Resp = resp.json().await.context("decoding openai response")?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("openai response has no message content"))?;
        let total_tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);

        Ok(Completion {
            text: text.trim().to_string(),
            total_tokens,
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Always errors; used when the model is disabled in config.
pub struct DisabledClient;

#[async_trait]
impl CompletionClient for DisabledClient {
    async fn complete(&self, _req: &CompletionRequest) -> Result<Completion> {
        bail!("model client disabled")
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed reply for tests/local runs.
#[derive(Clone)]
pub struct MockClient {
    pub reply: String,
    pub total_tokens: u64,
}

impl MockClient {
    pub fn new(reply: impl Into<String>, total_tokens: u64) -> Self {
        Self {
            reply: reply.into(),
            total_tokens,
        }
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, _req: &CompletionRequest) -> Result<Completion> {
        Ok(Completion {
            text: self.reply.clone(),
            total_tokens: self.total_tokens,
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
