//! Per-role model configuration and prompt templating.

use std::collections::BTreeMap;
use std::fmt;

use pressroom_logging::{press_debug, press_warn};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// The AI passes of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    /// First pass: normalizes extracted content into an article.
    Content,
    /// Second pass: rewrites the article as a press release.
    PrWriter,
    /// Generates publication parameters and adapted content.
    CopyEditor,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [AgentRole::Content, AgentRole::PrWriter, AgentRole::CopyEditor];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Content => "content",
            AgentRole::PrWriter => "pr-writer",
            AgentRole::CopyEditor => "copy-editor",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable settings for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    pub system_prompt: String,
    pub user_prompt: String,
}

const CONTENT_SYSTEM: &str = "You are a senior news editor with decades of experience preparing \
professional press material. Normalize the source into a clear, well-structured article. Keep every \
important fact, link, image and table in its original position. Answer with Markdown only, without \
any extra commentary or metadata.";
const CONTENT_USER: &str = "Turn the following source material into a professional news article:\n\n${content}";

const PR_WRITER_SYSTEM: &str = "You are an experienced PR writer. Rewrite the article as a polished \
press release with a strong headline, a concise lead paragraph and correct heading levels. Preserve \
all facts and links. Answer with Markdown only.";
const PR_WRITER_USER: &str = "Rewrite this article as a press release:\n\n${content}";

const COPY_EDITOR_SYSTEM: &str = "You are a copy editor preparing an article for WordPress. Derive \
the publication parameters (title, excerpt, slug, categories, tags) from the content and adapt the \
content to the house style. Respond with a JSON object containing `wordpress_params` and \
`adaptedContent`.";
const COPY_EDITOR_USER: &str = "Content type: ${contentType}\n\n${content}";

impl AgentConfig {
    /// Built-in configuration used when the config source has nothing for `role`.
    pub fn default_for(role: AgentRole) -> Self {
        let (temperature, system, user) = match role {
            AgentRole::Content => (0.3, CONTENT_SYSTEM, CONTENT_USER),
            AgentRole::PrWriter => (0.4, PR_WRITER_SYSTEM, PR_WRITER_USER),
            AgentRole::CopyEditor => (0.3, COPY_EDITOR_SYSTEM, COPY_EDITOR_USER),
        };
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            temperature,
            max_tokens: 16_000,
            top_p: Some(0.95),
            presence_penalty: None,
            frequency_penalty: None,
            system_prompt: system.to_string(),
            user_prompt: user.to_string(),
        }
    }

    /// System prompt plus the user template rendered with `vars`.
    pub fn prompt(&self, vars: &[(&str, &str)]) -> PromptPair {
        PromptPair {
            system: self.system_prompt.clone(),
            user: render_template(&self.user_prompt, vars),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Replaces `${name}` placeholders in one pass. Unknown names stay as written,
/// and substituted text is never rescanned.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Where agent configurations come from, e.g. a settings file or a remote store.
#[async_trait::async_trait]
pub trait AgentConfigSource: Send + Sync {
    async fn load(&self, role: AgentRole) -> Result<AgentConfig, ServiceError>;
}

/// Serves configurations held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticAgentConfigs {
    configs: BTreeMap<AgentRole, AgentConfig>,
}

impl StaticAgentConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: AgentRole, config: AgentConfig) -> Self {
        self.configs.insert(role, config);
        self
    }
}

impl FromIterator<(AgentRole, AgentConfig)> for StaticAgentConfigs {
    fn from_iter<I: IntoIterator<Item = (AgentRole, AgentConfig)>>(iter: I) -> Self {
        Self {
            configs: iter.into_iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl AgentConfigSource for StaticAgentConfigs {
    async fn load(&self, role: AgentRole) -> Result<AgentConfig, ServiceError> {
        self.configs
            .get(&role)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("agent config for {role}")))
    }
}

/// Loads the config for `role`, falling back to [`AgentConfig::default_for`].
pub async fn resolve_agent_config(source: &dyn AgentConfigSource, role: AgentRole) -> AgentConfig {
    match source.load(role).await {
        Ok(config) => {
            press_debug!("{role} agent uses {} / {}", config.provider, config.model);
            config
        }
        Err(err) => {
            press_warn!("no {role} agent config ({err}), using built-in defaults");
            AgentConfig::default_for(role)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_render_once() {
        let rendered = render_template(
            "Type ${contentType}: ${content} ${missing} ${",
            &[("content", "uses ${contentType}"), ("contentType", "html")],
        );
        assert_eq!(rendered, "Type html: uses ${contentType} ${missing} ${");
    }

    #[test]
    fn defaults_follow_role() {
        let content = AgentConfig::default_for(AgentRole::Content);
        let writer = AgentConfig::default_for(AgentRole::PrWriter);
        assert_eq!(content.model, "gpt-4o");
        assert_eq!(content.max_tokens, 16_000);
        assert_eq!(writer.temperature, 0.4);
        assert!(writer.user_prompt.contains("${content}"));
    }

    #[tokio::test]
    async fn missing_config_falls_back() {
        let source = StaticAgentConfigs::new();
        let config = resolve_agent_config(&source, AgentRole::CopyEditor).await;
        assert_eq!(config, AgentConfig::default_for(AgentRole::CopyEditor));
    }
}
