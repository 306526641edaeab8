use serde_json::{json, Value};

use super::openai::DEFAULT_TOP_P;
use super::ProviderFamily;
use crate::agent::{AgentConfig, PromptPair};

pub(crate) fn build_request(config: &AgentConfig, prompt: &PromptPair) -> Value {
    let generation_config = if ProviderFamily::Google.is_reasoning_model(&config.model) {
        json!({ "maxOutputTokens": config.max_tokens })
    } else {
        json!({
            "temperature": config.temperature,
            "maxOutputTokens": config.max_tokens,
            "topP": config.top_p.unwrap_or(DEFAULT_TOP_P),
        })
    };
    json!({
        "systemInstruction": { "parts": [{ "text": prompt.system }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
        "generationConfig": generation_config,
    })
}

pub(crate) fn extract_text(response: &Value) -> Option<String> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}
