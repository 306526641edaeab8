use serde_json::{json, Map, Value};

use super::ProviderFamily;
use crate::agent::{AgentConfig, PromptPair};

pub(crate) const DEFAULT_TOP_P: f64 = 0.95;

/// Sampling parameters for a chat-completions request.
///
/// Reasoning models reject sampling controls, so they only get the model name
/// and `max_completion_tokens`.
pub fn build_config(config: &AgentConfig) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("model".into(), json!(config.model));
    if ProviderFamily::OpenAi.is_reasoning_model(&config.model) {
        params.insert("max_completion_tokens".into(), json!(config.max_tokens));
        return params;
    }
    params.insert("temperature".into(), json!(config.temperature));
    params.insert("max_tokens".into(), json!(config.max_tokens));
    params.insert("top_p".into(), json!(config.top_p.unwrap_or(DEFAULT_TOP_P)));
    params.insert(
        "presence_penalty".into(),
        json!(config.presence_penalty.unwrap_or(0.0)),
    );
    params.insert(
        "frequency_penalty".into(),
        json!(config.frequency_penalty.unwrap_or(0.0)),
    );
    params
}

pub(crate) fn build_request(config: &AgentConfig, prompt: &PromptPair) -> Value {
    let mut body = build_config(config);
    body.insert(
        "messages".into(),
        json!([
            { "role": "system", "content": prompt.system },
            { "role": "user", "content": prompt.user },
        ]),
    );
    Value::Object(body)
}

pub(crate) fn extract_text(response: &Value) -> Option<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}
