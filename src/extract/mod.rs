// src/extract/mod.rs
//! Budget-gated AUM extraction: prompt the model, account the spend, parse the reply.

pub mod ai_adapter;

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::budget::BudgetGate;
use crate::config::pipeline::ModelConfig;
use crate::model::{ExtractionOutcome, UNAVAILABLE_SENTINEL};
use crate::units::parse_amount;

pub use ai_adapter::{
    build_client_from_config, Completion, CompletionClient, CompletionRequest, DisabledClient,
    DynCompletionClient, MockClient, OpenAiProvider,
};

/// Confidence attached to every successfully parsed reply.
pub const PARSED_CONFIDENCE: f64 = 0.9;

const SYSTEM_INSTRUCTION: &str =
    "Você é um assistente especializado em extrair informações financeiras de textos.";

pub struct ValueExtractor {
    client: DynCompletionClient,
    budget: Arc<BudgetGate>,
    max_output_tokens: u32,
    temperature: f32,
    max_prompt_chars: usize,
}

impl ValueExtractor {
    pub fn new(client: DynCompletionClient, budget: Arc<BudgetGate>, cfg: &ModelConfig) -> Self {
        Self {
            client,
            budget,
            max_output_tokens: cfg.max_output_tokens,
            temperature: cfg.temperature,
            max_prompt_chars: cfg.max_prompt_chars,
        }
    }

    /// Never fails: budget refusal, model errors and unparsable replies all yield
    /// [`ExtractionOutcome::unavailable`].
    pub async fn extract(
        &self,
        organization_name: &str,
        content: &str,
        source_url: &str,
    ) -> ExtractionOutcome {
        match self.budget.allow().await {
            Ok(true) => {}
            Ok(false) => {
                counter!("extract_budget_blocked_total").increment(1);
                debug!(target: "extract", url = source_url, "skipped: daily budget reached");
                return ExtractionOutcome::unavailable(source_url);
            }
            Err(e) => {
                warn!(target: "extract", error = ?e, "ledger read failed, skipping extraction");
                return ExtractionOutcome::unavailable(source_url);
            }
        }

        let req = CompletionRequest {
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: build_prompt(organization_name, content, self.max_prompt_chars),
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };

        counter!("extract_calls_total").increment(1);
        let completion = match self.client.complete(&req).await {
            Ok(c) => c,
            Err(e) => {
                counter!("extract_errors_total").increment(1);
                warn!(
                    target: "extract",
                    provider = self.client.provider_name(),
                    url = source_url,
                    error = %e,
                    "model call failed"
                );
                return ExtractionOutcome::unavailable(source_url);
            }
        };

        if let Err(e) = self.budget.record_usage(completion.total_tokens).await {
            warn!(target: "extract", error = ?e, "ledger update failed");
        }

        let outcome = parse_reply(&completion.text, source_url);
        debug!(
            target: "extract",
            url = source_url,
            available = outcome.is_available,
            tokens = completion.total_tokens,
            "reply parsed"
        );
        outcome
    }
}

/// Fixed prompt; only the first `max_chars` characters of the excerpt are included.
pub fn build_prompt(organization_name: &str, content: &str, max_chars: usize) -> String {
    let excerpt: String = content.chars().take(max_chars).collect();
    format!(
        "Qual é o patrimônio sob gestão (AUM) anunciado por {organization_name}? \
         Responda somente com o número e a unidade (ex.: R$ 2,3 bi) ou {UNAVAILABLE_SENTINEL}.\n\n\
         Conteúdo da fonte: {excerpt}"
    )
}

/// Turn a model reply into an outcome. The sentinel anywhere (any case) wins.
pub fn parse_reply(text: &str, source_url: &str) -> ExtractionOutcome {
    if text.to_uppercase().contains(UNAVAILABLE_SENTINEL) {
        return ExtractionOutcome::unavailable(source_url);
    }
    match parse_amount(text) {
        Some(amount) => ExtractionOutcome {
            aum_value: amount.display(),
            aum_numeric: Some(amount.numeric),
            aum_unit: Some(amount.unit),
            confidence_score: PARSED_CONFIDENCE,
            is_available: true,
            source_url: source_url.to_string(),
            source_type: "ai_extraction".to_string(),
        },
        None => ExtractionOutcome::unavailable(source_url),
    }
}
