//! One call shape over the OpenAI-compatible and Google generative APIs.

mod google;
mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pressroom_logging::{press_debug, press_info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use openai::build_config;

use crate::agent::{AgentConfig, PromptPair};
use crate::parse::{ParseResult, TolerantParser};
use crate::retry::{self, RetryPolicy};
use crate::AgentError;

const OPENAI_REASONING_MODELS: &[&str] = &[
    "o1",
    "o1-preview",
    "o1-mini",
    "o1-pro",
    "o3",
    "o3-mini",
    "o3-pro",
    "o4-mini",
    "o4-mini-high",
];
const GOOGLE_REASONING_MODELS: &[&str] = &["gemini-2.5-pro"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// OpenAI-compatible chat completions.
    OpenAi,
    Google,
}

impl ProviderFamily {
    /// `google` and `gemini` select Google; anything else is OpenAI-compatible.
    pub fn from_provider(provider: &str) -> Self {
        let provider = provider.trim();
        if provider.eq_ignore_ascii_case("google") || provider.eq_ignore_ascii_case("gemini") {
            ProviderFamily::Google
        } else {
            ProviderFamily::OpenAi
        }
    }

    pub fn credential_variable(self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "OPENAI_API_KEY",
            ProviderFamily::Google => "GEMINI_API_KEY",
        }
    }

    pub fn is_reasoning_model(self, model: &str) -> bool {
        let names = match self {
            ProviderFamily::OpenAi => OPENAI_REASONING_MODELS,
            ProviderFamily::Google => GOOGLE_REASONING_MODELS,
        };
        let model = model.trim().to_ascii_lowercase();
        names.iter().any(|name| model.starts_with(name))
    }

    fn label(self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Google => "google",
        }
    }
}

/// True for models of either family that take the reduced reasoning parameter set.
pub fn is_reasoning_model(model: &str) -> bool {
    ProviderFamily::OpenAi.is_reasoning_model(model)
        || ProviderFamily::Google.is_reasoning_model(model)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub openai_base: String,
    pub google_base: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            openai_base: "https://api.openai.com/v1".to_string(),
            google_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

/// Looks up API keys at call time.
pub trait CredentialSource: Send + Sync {
    fn credential(&self, variable: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn credential(&self, variable: &str) -> Option<String> {
        std::env::var(variable).ok().filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(variable.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn credential(&self, variable: &str) -> Option<String> {
        self.values.get(variable).cloned()
    }
}

/// Text completion seam used by the AI stages.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        config: &AgentConfig,
        prompt: &PromptPair,
        policy: &RetryPolicy<AgentError>,
    ) -> Result<String, AgentError>;

    /// Completes and recovers a structured object with `parser`.
    async fn complete_structured(
        &self,
        config: &AgentConfig,
        prompt: &PromptPair,
        policy: &RetryPolicy<AgentError>,
        parser: &TolerantParser,
        source_content: &str,
    ) -> Result<ParseResult, AgentError> {
        let text = self.complete(config, prompt, policy).await?;
        Ok(parser.parse(&text, source_content))
    }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AgentError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AgentError::Network(err.to_string()))
}

/// HTTP adapter for both provider families. Every call is wrapped in the
/// caller's retry policy.
#[derive(Clone)]
pub struct ProviderAdapter {
    client: reqwest::Client,
    endpoints: ProviderEndpoints,
    credentials: Arc<dyn CredentialSource>,
}

impl ProviderAdapter {
    pub fn new(
        client: reqwest::Client,
        endpoints: ProviderEndpoints,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            client,
            endpoints,
            credentials,
        }
    }

    fn endpoint(&self, family: ProviderFamily, model: &str, api_key: &str) -> String {
        match family {
            ProviderFamily::OpenAi => {
                format!("{}/chat/completions", self.endpoints.openai_base.trim_end_matches('/'))
            }
            ProviderFamily::Google => format!(
                "{}/models/{model}:generateContent?key={api_key}",
                self.endpoints.google_base.trim_end_matches('/')
            ),
        }
    }

    async fn send_once(
        &self,
        family: ProviderFamily,
        url: &str,
        api_key: &str,
        body: &Value,
    ) -> Result<String, AgentError> {
        let mut request = self.client.post(url).json(body);
        if family == ProviderFamily::OpenAi {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(AgentError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|err| AgentError::MalformedResponse(err.to_string()))?;
        let content = match family {
            ProviderFamily::OpenAi => openai::extract_text(&value),
            ProviderFamily::Google => google::extract_text(&value),
        };
        content.ok_or(AgentError::EmptyResponse)
    }
}

#[async_trait::async_trait]
impl ModelClient for ProviderAdapter {
    async fn complete(
        &self,
        config: &AgentConfig,
        prompt: &PromptPair,
        policy: &RetryPolicy<AgentError>,
    ) -> Result<String, AgentError> {
        let family = ProviderFamily::from_provider(&config.provider);
        let variable = family.credential_variable();
        let api_key = self
            .credentials
            .credential(variable)
            .ok_or_else(|| AgentError::CredentialMissing {
                provider: family.label().to_string(),
                variable: variable.to_string(),
            })?;

        let body = match family {
            ProviderFamily::OpenAi => openai::build_request(config, prompt),
            ProviderFamily::Google => google::build_request(config, prompt),
        };
        let url = self.endpoint(family, &config.model, &api_key);
        press_info!("calling {} model {}", family.label(), config.model);

        let text = retry::execute(policy, || self.send_once(family, &url, &api_key, &body)).await?;
        press_debug!("{} returned {} chars", config.model, text.len());
        Ok(text)
    }
}

fn map_transport_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(err.without_url().to_string())
    } else {
        AgentError::Network(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_selection_is_case_insensitive() {
        assert_eq!(ProviderFamily::from_provider("Gemini"), ProviderFamily::Google);
        assert_eq!(ProviderFamily::from_provider("GOOGLE"), ProviderFamily::Google);
        assert_eq!(ProviderFamily::from_provider(""), ProviderFamily::OpenAi);
        assert_eq!(ProviderFamily::from_provider("openrouter"), ProviderFamily::OpenAi);
    }

    #[test]
    fn reasoning_models_match_by_prefix() {
        assert!(is_reasoning_model("o3-mini-2024-09"));
        assert!(is_reasoning_model("O1-preview"));
        assert!(is_reasoning_model("gemini-2.5-pro-exp"));
        assert!(!is_reasoning_model("gpt-4o"));
        assert!(!ProviderFamily::Google.is_reasoning_model("o3"));
    }
}
