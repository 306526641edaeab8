use std::sync::Arc;
use std::time::Duration;

use pressroom_engine::{
    build_config, build_http_client, AgentConfig, AgentError, AgentRole, ErrorKind, ModelClient,
    PromptPair, ProviderAdapter, ProviderEndpoints, RetryPolicy, StaticCredentials,
    TolerantParser,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer, credentials: StaticCredentials) -> ProviderAdapter {
    let endpoints = ProviderEndpoints {
        openai_base: format!("{}/v1", server.uri()),
        google_base: format!("{}/v1beta", server.uri()),
    };
    let client = build_http_client(Duration::from_secs(5)).unwrap();
    ProviderAdapter::new(client, endpoints, Arc::new(credentials))
}

fn openai_key() -> StaticCredentials {
    StaticCredentials::new().with("OPENAI_API_KEY", "sk-test")
}

fn prompt() -> PromptPair {
    PromptPair {
        system: "You edit news.".into(),
        user: "Rewrite: hello".into(),
    }
}

fn no_retry() -> RetryPolicy<AgentError> {
    RetryPolicy::new(0, Duration::ZERO)
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

#[test]
fn reasoning_models_get_only_completion_budget() {
    let mut config = AgentConfig::default_for(AgentRole::Content);
    config.model = "o3-mini-2024-09".into();
    let params = build_config(&config);
    assert_eq!(
        serde_json::Value::Object(params),
        json!({ "model": "o3-mini-2024-09", "max_completion_tokens": 16000 })
    );
}

#[test]
fn chat_models_get_sampling_defaults() {
    let config = AgentConfig::default_for(AgentRole::PrWriter);
    let params = build_config(&config);
    assert_eq!(
        serde_json::Value::Object(params),
        json!({
            "model": "gpt-4o",
            "temperature": 0.4,
            "max_tokens": 16000,
            "top_p": 0.95,
            "presence_penalty": 0.0,
            "frequency_penalty": 0.0,
        })
    );
}

#[tokio::test]
async fn openai_call_sends_messages_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "system", "content": "You edit news." },
                { "role": "user", "content": "Rewrite: hello" },
            ]
        })))
        .respond_with(chat_reply("# Hello"))
        .expect(1)
        .mount(&server)
        .await;

    let config = AgentConfig::default_for(AgentRole::Content);
    let text = adapter(&server, openai_key())
        .complete(&config, &prompt(), &no_retry())
        .await
        .unwrap();
    assert_eq!(text, "# Hello");
}

#[tokio::test]
async fn google_call_uses_generate_content_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "g-test"))
        .and(body_json(json!({
            "systemInstruction": { "parts": [{ "text": "You edit news." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "Rewrite: hello" }] }],
            "generationConfig": { "temperature": 0.3, "maxOutputTokens": 2048, "topP": 0.95 },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Gemini says hi" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = AgentConfig::default_for(AgentRole::Content);
    config.provider = "Gemini".into();
    config.model = "gemini-1.5-flash".into();
    config.max_tokens = 2048;
    config.top_p = None;

    let credentials = StaticCredentials::new().with("GEMINI_API_KEY", "g-test");
    let text = adapter(&server, credentials)
        .complete(&config, &prompt(), &no_retry())
        .await
        .unwrap();
    assert_eq!(text, "Gemini says hi");
}

fn gemini(model: &str) -> AgentConfig {
    let mut config = AgentConfig::default_for(AgentRole::CopyEditor);
    config.provider = "google".into();
    config.model = model.into();
    config
}

fn gemini_key() -> StaticCredentials {
    StaticCredentials::new().with("GEMINI_API_KEY", "g-test")
}

#[tokio::test]
async fn google_reasoning_model_gets_only_output_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro-preview:generateContent"))
        .and(body_json(json!({
            "systemInstruction": { "parts": [{ "text": "You edit news." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "Rewrite: hello" }] }],
            "generationConfig": { "maxOutputTokens": 16000 },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Thought it through" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = adapter(&server, gemini_key())
        .complete(&gemini("gemini-2.5-pro-preview"), &prompt(), &no_retry())
        .await
        .unwrap();
    assert_eq!(text, "Thought it through");
}

#[tokio::test]
async fn google_reply_without_candidates_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-empty:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-blocked:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, gemini_key());
    for model in ["gemini-empty", "gemini-blocked"] {
        let err = adapter
            .complete(&gemini(model), &prompt(), &no_retry())
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::EmptyResponse, "{model}");
    }
}

#[tokio::test]
async fn missing_credential_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let config = AgentConfig::default_for(AgentRole::Content);
    let err = adapter(&server, StaticCredentials::new())
        .complete(&config, &prompt(), &RetryPolicy::new(3, Duration::ZERO))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialMissing);
    assert!(err.to_string().contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn rate_limit_is_retried_and_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let policy = RetryPolicy::<AgentError>::new(3, Duration::ZERO).transient_only().notify(tx);
    let config = AgentConfig::default_for(AgentRole::Content);
    let text = adapter(&server, openai_key())
        .complete(&config, &prompt(), &policy)
        .await
        .unwrap();

    assert_eq!(text, "finally");
    let first = rx.try_recv().unwrap();
    assert_eq!(first.attempt, 1);
    assert!(first.error.contains("rate limit"));
    assert_eq!(rx.try_recv().unwrap().attempt, 2);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn client_errors_are_not_retried_by_transient_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown parameter"))
        .expect(1)
        .mount(&server)
        .await;

    let policy = RetryPolicy::<AgentError>::new(3, Duration::ZERO).transient_only();
    let config = AgentConfig::default_for(AgentRole::CopyEditor);
    let err = adapter(&server, openai_key())
        .complete(&config, &prompt(), &policy)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AgentError::Provider {
            status: 400,
            body: "unknown parameter".into()
        }
    );
    assert_eq!(err.kind(), ErrorKind::Rejected);
}

#[tokio::test]
async fn invalid_and_empty_bodies_are_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "broken" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "empty" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, openai_key());
    let mut config = AgentConfig::default_for(AgentRole::Content);

    config.model = "broken".into();
    let err = adapter.complete(&config, &prompt(), &no_retry()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(err.to_string().contains("not valid JSON"));

    config.model = "empty".into();
    let err = adapter.complete(&config, &prompt(), &no_retry()).await.unwrap_err();
    assert_eq!(err, AgentError::EmptyResponse);
}

#[tokio::test]
async fn structured_completion_runs_tolerant_parser() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply(
            "Sure! {\"wordpress_parameters\": {\"title\": \"Launch\", \"slug\": \"launch\"}}",
        ))
        .mount(&server)
        .await;

    let config = AgentConfig::default_for(AgentRole::CopyEditor);
    let parsed = adapter(&server, openai_key())
        .complete_structured(&config, &prompt(), &no_retry(), &TolerantParser::new(), "<p>Body</p>")
        .await
        .unwrap();

    let params = parsed.params().unwrap();
    assert_eq!(params["title"], json!("Launch"));
    assert_eq!(params["content"], json!("<p>Body</p>"));
    assert_eq!(parsed.adapted_content(), Some("<p>Body</p>"));
    assert!(parsed.used_fallback);
}
