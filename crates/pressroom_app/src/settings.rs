//! RON settings file for the `pressroom` binary.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. Without `--settings`, `./pressroom.ron` is used when present.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use pressroom_engine::{
    AgentConfig, AgentRole, FetchSettings, ProviderEndpoints, RetrySettings, StaticAgentConfigs,
    COPY_EDIT_RETRY,
};
use pressroom_logging::press_info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_FILE: &str = "pressroom.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub endpoints: ProviderEndpoints,
    /// Per-request timeout for provider calls.
    pub request_timeout_secs: u64,
    pub ai_retry: RetrySettings,
    pub copy_edit_retry: RetrySettings,
    pub agents: AgentSettings,
    pub publisher: PublisherSettings,
    pub fetch: FetchSettings,
    /// Write posts under `published/` instead of calling WordPress.
    pub dry_run: bool,
    /// Seconds between simulated progress ticks while a model call runs.
    pub tick_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./pressroom-output"),
            endpoints: ProviderEndpoints::default(),
            request_timeout_secs: 120,
            ai_retry: RetrySettings::default(),
            copy_edit_retry: COPY_EDIT_RETRY,
            agents: AgentSettings::default(),
            publisher: PublisherSettings::default(),
            fetch: FetchSettings::default(),
            dry_run: false,
            tick_interval_secs: 1,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }
}

/// Agent overrides by role. Roles left out use the built-in configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub content: Option<AgentConfig>,
    pub pr_writer: Option<AgentConfig>,
    pub copy_editor: Option<AgentConfig>,
}

impl AgentSettings {
    pub fn to_source(&self) -> StaticAgentConfigs {
        [
            (AgentRole::Content, &self.content),
            (AgentRole::PrWriter, &self.pr_writer),
            (AgentRole::CopyEditor, &self.copy_editor),
        ]
        .into_iter()
        .filter_map(|(role, config)| config.clone().map(|config| (role, config)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSettings {
    /// WordPress site root. Without it runs publish as a dry run.
    pub site_url: Option<String>,
    pub post_status: String,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            site_url: None,
            post_status: "draft".to_string(),
        }
    }
}

/// Loads `path`, or `./pressroom.ron` when no path is given and the file exists.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !fallback.exists() {
                return Ok(Settings::default());
            }
            fallback
        }
    };
    let text = fs::read_to_string(&path)
        .with_context(|| format!("cannot read settings file {}", path.display()))?;
    let settings = parse(&text).with_context(|| format!("invalid settings in {}", path.display()))?;
    press_info!("loaded settings from {}", path.display());
    Ok(settings)
}

pub fn parse(text: &str) -> Result<Settings> {
    Ok(ron::from_str(text)?)
}
