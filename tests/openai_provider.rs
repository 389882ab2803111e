// tests/openai_provider.rs
//
// OpenAI chat-completions client against a local mock server: token usage decoding,
// missing usage, empty choices, non-2xx replies and the unconfigured key.

use aum_scraper::config::pipeline::ModelConfig;
use aum_scraper::extract::{CompletionClient, CompletionRequest, OpenAiProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn model_cfg(api_key: &str) -> ModelConfig {
    ModelConfig {
        api_key: api_key.to_string(),
        ..ModelConfig::default()
    }
}

fn provider(server: &MockServer, api_key: &str) -> OpenAiProvider {
    OpenAiProvider::new(&model_cfg(api_key))
        .expect("provider")
        .with_endpoint(format!("{}/v1/chat/completions", server.uri()))
}

fn request() -> CompletionRequest {
    CompletionRequest {
        system: "sistema".into(),
        prompt: "Qual é o AUM?".into(),
        max_tokens: 50,
        temperature: 0.1,
    }
}

#[tokio::test]
async fn reply_text_and_total_tokens_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 50 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  R$ 1,5 bi \n" } }],
            "usage": { "prompt_tokens": 300, "completion_tokens": 12, "total_tokens": 312 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = provider(&server, "sk-test")
        .complete(&request())
        .await
        .expect("completion");
    assert_eq!(out.text, "R$ 1,5 bi");
    assert_eq!(out.total_tokens, 312);
}

#[tokio::test]
async fn missing_usage_counts_as_zero_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "NAO_DISPONIVEL" } }]
        })))
        .mount(&server)
        .await;

    let out = provider(&server, "sk-test")
        .complete(&request())
        .await
        .expect("completion");
    assert_eq!(out.text, "NAO_DISPONIVEL");
    assert_eq!(out.total_tokens, 0);
}

#[tokio::test]
async fn rate_limited_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = provider(&server, "sk-test")
        .complete(&request())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("429"), "unexpected error: {err:#}");
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "usage": { "total_tokens": 40 }
        })))
        .mount(&server)
        .await;

    let res = provider(&server, "sk-test").complete(&request()).await;
    assert!(res.is_err());
}

#[tokio::test]
async fn empty_key_fails_without_calling_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = provider(&server, "").complete(&request()).await.unwrap_err();
    assert!(format!("{err:#}").contains("OPENAI_API_KEY"));
}
