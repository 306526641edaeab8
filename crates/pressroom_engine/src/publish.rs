use std::sync::Arc;

use pressroom_logging::press_info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::persist::ObjectStore;
use crate::provider::CredentialSource;
use crate::ServiceError;

pub const WORDPRESS_USERNAME: &str = "WORDPRESS_USERNAME";
pub const WORDPRESS_APP_PASSWORD: &str = "WORDPRESS_APP_PASSWORD";

/// Post payload in WordPress REST field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub status: String,
    /// Remaining fields produced by the copy editor (categories, tags, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub id: String,
    pub link: Option<String>,
    pub status: String,
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishReceipt, ServiceError>;
}

/// Creates posts through `/wp-json/wp/v2/posts` with application-password auth.
pub struct WordPressPublisher {
    client: reqwest::Client,
    site_url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl WordPressPublisher {
    pub fn new(client: reqwest::Client, site_url: impl Into<String>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            client,
            site_url: site_url.into(),
            credentials,
        }
    }

    fn credential(&self, variable: &str) -> Result<String, ServiceError> {
        self.credentials
            .credential(variable)
            .ok_or_else(|| ServiceError::CredentialMissing(variable.to_string()))
    }
}

#[async_trait::async_trait]
impl Publisher for WordPressPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishReceipt, ServiceError> {
        let username = self.credential(WORDPRESS_USERNAME)?;
        let password = self.credential(WORDPRESS_APP_PASSWORD)?;
        let url = format!("{}/wp-json/wp/v2/posts", self.site_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .basic_auth(username, Some(password))
            .json(draft)
            .send()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let created: Value = serde_json::from_str(&body)?;
        let id = match created.get("id") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => return Err(ServiceError::Invalid("post response has no id".into())),
        };
        let receipt = PublishReceipt {
            id,
            link: created.get("link").and_then(Value::as_str).map(str::to_string),
            status: created
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or(&draft.status)
                .to_string(),
        };
        press_info!("published post {} ({})", receipt.id, receipt.status);
        Ok(receipt)
    }
}

/// Dry-run publisher: writes the post payload to `published/{slug}.json`.
pub struct DraftPublisher {
    store: Arc<dyn ObjectStore>,
}

impl DraftPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Publisher for DraftPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishReceipt, ServiceError> {
        let slug = draft
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| crate::filename::slugify(&draft.title));
        let slug = if slug.is_empty() { "post".to_string() } else { slug };
        let key = format!("published/{slug}.json");
        let stored = self
            .store
            .put(&key, serde_json::to_string_pretty(draft)?.as_bytes())
            .await?;
        press_info!("dry run: post written to {}", stored.location);
        Ok(PublishReceipt {
            id: key,
            link: Some(stored.location),
            status: draft.status.clone(),
        })
    }
}
