mod common;

use aip_common::{AipError, Provider};
use aip_config::LlmConfig;
use aip_llm::groq::GroqClient;
use aip_llm::huggingface::HuggingFaceClient;
use aip_llm::ollama::OllamaClient;
use aip_llm::traits::LlmClient;
use aip_llm::{build_client, GenerationOptions, NO_RESPONSE};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn groq_sends_chat_completion_and_reads_first_choice() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk_test"))
        .and(body_partial_json(json!({
            "model": "meta-llama/llama-4-scout-17b-16e-instruct",
            "messages": [{ "role": "user", "content": "hello" }],
            "max_tokens": 1024
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "meta-llama/llama-4-scout-17b-16e-instruct",
            "choices": [{ "message": { "role": "assistant", "content": "Hi there" } }],
            "usage": { "total_tokens": 12 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GroqClient::new(
        &format!("{}/openai/v1", server.uri()),
        "gsk_test",
        "meta-llama/llama-4-scout-17b-16e-instruct".into(),
    )
    .unwrap();

    let resp = client
        .generate("hello", &GenerationOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.text, "Hi there");
    assert_eq!(resp.tokens_used, Some(12));
    assert_eq!(client.provider(), Provider::Groq);
}

#[tokio::test]
async fn groq_without_choices_yields_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = GroqClient::new(&server.uri(), "gsk_test", "m".into()).unwrap();
    assert_eq!(client.reply("hi").await.unwrap(), NO_RESPONSE);
}

#[tokio::test]
async fn groq_client_error_surfaces_provider_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error":{"message":"Invalid API Key"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GroqClient::new(&server.uri(), "gsk_bad", "m".into()).unwrap();
    let err = client.reply("hi").await.unwrap_err();
    match err {
        AipError::Upstream { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API Key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn huggingface_reads_array_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/Qwen/Qwen2-7B-Instruct"))
        .and(body_partial_json(json!({
            "inputs": "prompt",
            "parameters": { "max_length": 150 }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "generated_text": "prompt and more" }])),
        )
        .mount(&server)
        .await;

    let client =
        HuggingFaceClient::new(&server.uri(), "hf_test", "Qwen/Qwen2-7B-Instruct".into()).unwrap();
    assert_eq!(client.reply("prompt").await.unwrap(), "prompt and more");
}

#[tokio::test]
async fn huggingface_retries_while_model_loads() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "Model gpt2 is currently loading",
            "estimated_time": 20.0
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generated_text": "ready" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HuggingFaceClient::new(&server.uri(), "hf_test", "gpt2".into())
        .unwrap()
        .with_loading_backoff(3, Duration::from_millis(10));
    assert_eq!(client.reply("x").await.unwrap(), "ready");
}

#[tokio::test]
async fn huggingface_gives_up_after_loading_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string(r#"{"error":"Model gpt2 is currently loading"}"#),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = HuggingFaceClient::new(&server.uri(), "hf_test", "gpt2".into())
        .unwrap()
        .with_loading_backoff(1, Duration::from_millis(5));
    let err = client.reply("x").await.unwrap_err();
    assert!(matches!(err, AipError::Upstream { status: 503, .. }));
}

#[tokio::test]
async fn huggingface_does_not_retry_other_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HuggingFaceClient::new(&server.uri(), "hf_test", "gpt2".into())
        .unwrap()
        .with_loading_backoff(3, Duration::from_millis(5));
    let err = client.reply("x").await.unwrap_err();
    assert_eq!(err.upstream_text(), Some("boom"));
}

#[tokio::test]
async fn ollama_generate_reads_response_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2:3b",
            "stream": false,
            "options": { "num_predict": 64 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "local reply",
            "eval_count": 7
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), "llama3.2:3b".into())
        .unwrap()
        .with_defaults(None, Some(64));
    let resp = client
        .generate("hi", &GenerationOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.text, "local reply");
    assert_eq!(resp.tokens_used, Some(7));
}

#[tokio::test]
async fn ollama_pulls_missing_model_at_build_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "models": [{ "name": "other:latest" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(json!({ "model": "llama3.2:3b" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = LlmConfig::Ollama {
        model: "llama3.2:3b".into(),
        endpoint: server.uri(),
        temperature: None,
        max_tokens: None,
        timeout_secs: None,
        pull_missing_model: true,
    };
    let client = build_client(&cfg).await.unwrap();
    assert_eq!(client.provider(), Provider::Ollama);
    assert!(client.health_check().await.unwrap());
}

#[tokio::test]
async fn ollama_health_is_false_when_server_is_down() {
    let client = OllamaClient::new("http://127.0.0.1:9", "m".into()).unwrap();
    assert!(!client.health_check().await.unwrap());
}

#[tokio::test]
async fn build_client_rejects_missing_hosted_key() {
    let cfg = LlmConfig::Groq {
        model: "m".into(),
        auth_token: "${GROQ_API_KEY}".into(),
        endpoint: "https://api.groq.com/openai/v1".into(),
        temperature: None,
        max_tokens: None,
        timeout_secs: None,
    };
    let err = build_client(&cfg).await.err().expect("missing key");
    assert!(matches!(err, AipError::Config(_)));
}
