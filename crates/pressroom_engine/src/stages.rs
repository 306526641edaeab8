//! Stage handlers: one per pipeline stage, each turning the previous stage's
//! saved result into its own.
//!
//! Payloads carry forward: every handler starts from the previous payload and
//! adds or replaces its own fields, so later stages can read `fileId`,
//! `markdown`, `html` and friends without looking further back.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pressroom_core::{
    Metadata, PipelineKind, ADVANCED_AI, COPY_EDITING, EXTRACT, FORMAT_CONVERSION, PREP_PUBLISH,
    PROCESS, PUBLISH_NEWS, UPLOAD,
};
use pressroom_logging::{press_info, press_warn};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::agent::{AgentConfig, AgentRole};
use crate::convert::{clean_markdown, strip_code_fence, FormatConverter};
use crate::extract::{ContentExtractor, ExtractionInput};
use crate::fetch::DownloadProgress;
use crate::filename::{file_id, slugify};
use crate::frontmatter::Frontmatter;
use crate::parse::{TolerantParser, PLACEHOLDER_TITLE};
use crate::persist::{off_runtime, ObjectStore};
use crate::preview::{preview, MAX_PREVIEW_BYTES};
use crate::provider::ModelClient;
use crate::publish::{PostDraft, Publisher};
use crate::retry::{execute_with_fallback, RetryEvent, RetryPolicy, RetrySettings};
use crate::ticker::ProgressTicker;
use crate::{AgentError, ProgressSink};

/// Produces an RFC 3339 timestamp.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Keys the runner adds to a stored payload. They are not carried forward.
const OUTCOME_KEYS: &[&str] = &["success", "stageComplete", "message"];

/// Result of one stage run, as reported to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub success: bool,
    pub stage_complete: bool,
    pub message: Option<String>,
    pub payload: Map<String, Value>,
}

impl StageOutcome {
    pub fn completed(message: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::new(true, true, message, payload)
    }

    /// Failed, but later stages can still run on the carried payload.
    pub fn degraded(message: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::new(false, true, message, payload)
    }

    /// Failed; the run stops here.
    pub fn halted(message: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::new(false, false, message, payload)
    }

    /// Waiting on something outside the pipeline; the stage is run again on resume.
    pub fn paused(message: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::new(true, false, message, payload)
    }

    fn new(success: bool, stage_complete: bool, message: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            success,
            stage_complete,
            message: Some(message.into()),
            payload,
        }
    }

    /// The payload with the outcome flags merged in, as stored on the run.
    pub fn to_result(&self) -> Value {
        let mut result = self.payload.clone();
        result.insert("success".into(), json!(self.success));
        result.insert("stageComplete".into(), json!(self.stage_complete));
        if let Some(message) = &self.message {
            result.insert("message".into(), json!(message));
        }
        Value::Object(result)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInput {
    /// Saved result of the closest earlier stage that produced one.
    pub previous: Option<Value>,
    /// Resolved config when the handler has an agent role.
    pub agent: Option<AgentConfig>,
}

impl StageInput {
    /// Previous payload without the outcome flags.
    pub fn carry(&self) -> Map<String, Value> {
        let mut carry = match &self.previous {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        for key in OUTCOME_KEYS {
            carry.remove(*key);
        }
        carry
    }

    fn agent_or_default(&self, role: AgentRole) -> AgentConfig {
        self.agent
            .clone()
            .unwrap_or_else(|| AgentConfig::default_for(role))
    }
}

/// Per-run environment handed to every handler.
#[derive(Clone)]
pub struct StageContext {
    pub run_id: String,
    pub kind: PipelineKind,
    pub metadata: Metadata,
    pub progress: Arc<dyn ProgressSink>,
    pub store: Arc<dyn ObjectStore>,
    pub clock: Clock,
    pub tick_interval: Duration,
    pub retry_events: Option<UnboundedSender<RetryEvent>>,
}

impl StageContext {
    pub fn report(&self, stage_id: &str, percent: u8, message: impl Into<String>) {
        self.progress
            .stage_progress(stage_id, percent, Some(message.into()));
    }

    pub fn ticker(&self, stage_id: &str, message: &str) -> ProgressTicker {
        ProgressTicker::start(self.progress.clone(), stage_id, self.tick_interval, message)
    }

    pub fn policy(&self, settings: &RetrySettings) -> RetryPolicy<AgentError> {
        let policy = settings.policy();
        match &self.retry_events {
            Some(observer) => policy.notify(observer.clone()),
            None => policy,
        }
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

#[async_trait::async_trait]
pub trait StageHandler: Send + Sync {
    fn stage_id(&self) -> &'static str;

    fn agent_role(&self) -> Option<AgentRole> {
        None
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome;
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn set(map: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    map.insert(key.to_string(), value.into());
}

pub struct UploadHandler;

#[async_trait::async_trait]
impl StageHandler for UploadHandler {
    fn stage_id(&self) -> &'static str {
        UPLOAD
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        match ctx.kind {
            PipelineKind::File => {
                let Some(path) = ctx.metadata_str("filePath") else {
                    return StageOutcome::halted("no file path given", payload);
                };
                let path = Path::new(path);
                let name = ctx
                    .metadata_str("fileName")
                    .and_then(|n| Path::new(n).file_name())
                    .or_else(|| path.file_name())
                    .and_then(|n| n.to_str())
                    .unwrap_or("document")
                    .to_string();

                let source = path.to_path_buf();
                let bytes = match off_runtime(move || std::fs::read(source)).await {
                    Ok(bytes) if bytes.is_empty() => {
                        return StageOutcome::halted(format!("{name} is empty"), payload)
                    }
                    Ok(bytes) => bytes,
                    Err(err) => {
                        return StageOutcome::halted(format!("cannot read {}: {err}", path.display()), payload)
                    }
                };
                ctx.report(UPLOAD, 50, format!("storing {name}"));

                let id = file_id(&name, &ctx.run_id);
                let key = format!("uploads/{id}/{name}");
                let stored = match ctx.store.put(&key, &bytes).await {
                    Ok(stored) => stored,
                    Err(err) => return StageOutcome::halted(format!("upload failed: {err}"), payload),
                };
                set(&mut payload, "fileId", id);
                set(&mut payload, "fileName", name.clone());
                set(&mut payload, "objectKey", stored.key);
                set(&mut payload, "size", stored.size);
                StageOutcome::completed(format!("uploaded {name}"), payload)
            }
            PipelineKind::Url => {
                let Some(raw) = ctx.metadata_str("url") else {
                    return StageOutcome::halted("no url given", payload);
                };
                let url = match url::Url::parse(raw.trim()) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => url,
                    Ok(url) => {
                        return StageOutcome::halted(format!("unsupported scheme {}", url.scheme()), payload)
                    }
                    Err(err) => return StageOutcome::halted(format!("invalid url: {err}"), payload),
                };
                let name = url
                    .path_segments()
                    .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                    .or(url.host_str())
                    .unwrap_or("page")
                    .to_string();
                let id = file_id(&name, &format!("{}{}", ctx.run_id, url));
                set(&mut payload, "fileId", id);
                set(&mut payload, "fileName", name);
                set(&mut payload, "url", url.to_string());
                StageOutcome::completed(format!("resolved {url}"), payload)
            }
        }
    }
}

/// Share of the extract stage's progress bar spent downloading a page.
const DOWNLOAD_FROM: u8 = 20;
const DOWNLOAD_TO: u8 = 70;

pub struct ExtractHandler {
    extractor: Arc<dyn ContentExtractor>,
}

impl ExtractHandler {
    pub fn new(extractor: Arc<dyn ContentExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait::async_trait]
impl StageHandler for ExtractHandler {
    fn stage_id(&self) -> &'static str {
        EXTRACT
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let Some(id) = str_field(&payload, "fileId").map(str::to_string) else {
            return StageOutcome::halted("upload result is missing", payload);
        };
        let name = str_field(&payload, "fileName").unwrap_or("document").to_string();

        let extraction = if let Some(url) = str_field(&payload, "url") {
            ExtractionInput::Url(url.to_string())
        } else {
            let Some(key) = str_field(&payload, "objectKey") else {
                return StageOutcome::halted("uploaded object key is missing", payload);
            };
            match ctx.store.get(key).await {
                Ok(bytes) => ExtractionInput::Bytes {
                    name: name.clone(),
                    bytes,
                    content_type: None,
                },
                Err(err) => return StageOutcome::halted(format!("cannot load upload: {err}"), payload),
            }
        };
        let step = match &extraction {
            ExtractionInput::Url(_) => "downloading page",
            ExtractionInput::Bytes { .. } => "extracting content",
        };
        ctx.report(EXTRACT, DOWNLOAD_FROM, step);
        let download = DownloadProgress::new(ctx.progress.clone(), EXTRACT, DOWNLOAD_FROM, DOWNLOAD_TO);

        let document = match self.extractor.extract(extraction, &download).await {
            Ok(document) if document.markdown.trim().is_empty() => {
                return StageOutcome::halted("no content could be extracted", payload)
            }
            Ok(document) => document,
            Err(err) => return StageOutcome::halted(format!("extraction failed: {err}"), payload),
        };
        let title = document.title.clone().unwrap_or_else(|| {
            name.rsplit_once('.')
                .map_or(name.as_str(), |(stem, _)| stem)
                .to_string()
        });

        let mut header = Frontmatter::new()
            .set("title", title.as_str())
            .set("encoding", document.encoding.as_str())
            .set("extracted_at", (ctx.clock)());
        header = match &document.source_url {
            Some(url) => header.set("source_url", url.as_str()),
            None => header.set("source_file", name.as_str()),
        };
        ctx.report(EXTRACT, 80, "storing markdown");
        let key = format!("{id}.md");
        if let Err(err) = ctx
            .store
            .put(&key, header.render(&document.markdown).as_bytes())
            .await
        {
            return StageOutcome::halted(format!("cannot store markdown: {err}"), payload);
        }

        set(&mut payload, "title", title);
        set(&mut payload, "markdown", document.markdown.clone());
        set(&mut payload, "markdownKey", key);
        set(&mut payload, "preview", preview(&document.markdown, MAX_PREVIEW_BYTES));
        StageOutcome::completed(
            format!("extracted {} characters", document.markdown.chars().count()),
            payload,
        )
    }
}

/// First AI pass. Never fails: when the model call gives up, the extracted
/// Markdown continues unchanged.
pub struct ProcessHandler {
    model: Arc<dyn ModelClient>,
    retry: RetrySettings,
}

impl ProcessHandler {
    pub fn new(model: Arc<dyn ModelClient>, retry: RetrySettings) -> Self {
        Self { model, retry }
    }
}

#[async_trait::async_trait]
impl StageHandler for ProcessHandler {
    fn stage_id(&self) -> &'static str {
        PROCESS
    }

    fn agent_role(&self) -> Option<AgentRole> {
        Some(AgentRole::Content)
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let Some(markdown) = str_field(&payload, "markdown").map(str::to_string) else {
            return StageOutcome::halted("extracted content is missing", payload);
        };
        let id = str_field(&payload, "fileId").unwrap_or("document").to_string();
        let config = input.agent_or_default(AgentRole::Content);
        let prompt = config.prompt(&[("content", markdown.as_str())]);
        let policy = ctx.policy(&self.retry);

        let ticker = ctx.ticker(PROCESS, "AI content pass");
        let enhanced = execute_with_fallback(None, async {
            self.model.complete(&config, &prompt, &policy).await.map(Some)
        })
        .await;
        ticker.stop();

        let enhanced = enhanced
            .map(|text| clean_markdown(&text))
            .filter(|text| !text.is_empty());
        let (body, source) = match enhanced {
            Some(text) => (text, "ai-enhanced"),
            None => (markdown, "original-content"),
        };

        let title = str_field(&payload, "title").unwrap_or(PLACEHOLDER_TITLE).to_string();
        let document = Frontmatter::new()
            .set("title", title)
            .set("source", source)
            .set("processed_at", (ctx.clock)())
            .render(&body);
        let key = format!("{id}.processed.md");
        match ctx.store.put(&key, document.as_bytes()).await {
            Ok(_) => set(&mut payload, "processedKey", key),
            Err(err) => press_warn!("processed markdown not stored: {err}"),
        }

        set(&mut payload, "markdown", body.clone());
        set(&mut payload, "source", source);
        set(&mut payload, "preview", preview(&body, MAX_PREVIEW_BYTES));
        StageOutcome::completed(format!("content pass finished ({source})"), payload)
    }
}

/// Second AI pass. On failure the stage is marked failed and the previous
/// Markdown continues.
pub struct AdvancedAiHandler {
    model: Arc<dyn ModelClient>,
    retry: RetrySettings,
}

impl AdvancedAiHandler {
    pub fn new(model: Arc<dyn ModelClient>, retry: RetrySettings) -> Self {
        Self { model, retry }
    }
}

#[async_trait::async_trait]
impl StageHandler for AdvancedAiHandler {
    fn stage_id(&self) -> &'static str {
        ADVANCED_AI
    }

    fn agent_role(&self) -> Option<AgentRole> {
        Some(AgentRole::PrWriter)
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let Some(markdown) = str_field(&payload, "markdown").map(str::to_string) else {
            return StageOutcome::halted("processed content is missing", payload);
        };
        let config = input.agent_or_default(AgentRole::PrWriter);
        let prompt = config.prompt(&[("content", markdown.as_str())]);
        let policy = ctx.policy(&self.retry);

        let ticker = ctx.ticker(ADVANCED_AI, "PR writer pass");
        let result = self.model.complete(&config, &prompt, &policy).await;
        ticker.stop();

        match result {
            Ok(text) => {
                let body = strip_code_fence(&text).trim().to_string();
                if body.is_empty() {
                    set(&mut payload, "enhanced", false);
                    return StageOutcome::degraded("PR writer returned no content", payload);
                }
                set(&mut payload, "preview", preview(&body, MAX_PREVIEW_BYTES));
                set(&mut payload, "markdown", body);
                set(&mut payload, "enhanced", true);
                StageOutcome::completed("PR writer pass finished", payload)
            }
            Err(err) => {
                set(&mut payload, "enhanced", false);
                StageOutcome::degraded(format!("PR writer pass failed: {err}"), payload)
            }
        }
    }
}

pub struct FormatConversionHandler {
    converter: Arc<dyn FormatConverter>,
}

impl FormatConversionHandler {
    pub fn new(converter: Arc<dyn FormatConverter>) -> Self {
        Self { converter }
    }
}

#[async_trait::async_trait]
impl StageHandler for FormatConversionHandler {
    fn stage_id(&self) -> &'static str {
        FORMAT_CONVERSION
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let Some(markdown) = str_field(&payload, "markdown").map(clean_markdown) else {
            return StageOutcome::halted("content to convert is missing", payload);
        };
        let id = str_field(&payload, "fileId").unwrap_or("document").to_string();
        ctx.report(FORMAT_CONVERSION, 40, "converting Markdown to HTML");

        let html = match self.converter.to_html(&markdown).await {
            Ok(html) => html,
            Err(err) => {
                return StageOutcome::degraded(format!("format conversion failed: {err}"), payload)
            }
        };
        let key = format!("{id}.html");
        if let Err(err) = ctx.store.put(&key, html.as_bytes()).await {
            return StageOutcome::degraded(format!("cannot store html: {err}"), payload);
        }
        set(&mut payload, "markdown", markdown);
        set(&mut payload, "html", html);
        set(&mut payload, "htmlKey", key);
        StageOutcome::completed("converted to HTML", payload)
    }
}

/// Generates publication parameters. Failures fall back to placeholder
/// parameters over the unedited content.
pub struct CopyEditingHandler {
    model: Arc<dyn ModelClient>,
    parser: TolerantParser,
    retry: RetrySettings,
}

impl CopyEditingHandler {
    pub fn new(model: Arc<dyn ModelClient>, retry: RetrySettings) -> Self {
        Self {
            model,
            parser: TolerantParser::new(),
            retry,
        }
    }

    pub fn with_parser(mut self, parser: TolerantParser) -> Self {
        self.parser = parser;
        self
    }
}

#[async_trait::async_trait]
impl StageHandler for CopyEditingHandler {
    fn stage_id(&self) -> &'static str {
        COPY_EDITING
    }

    fn agent_role(&self) -> Option<AgentRole> {
        Some(AgentRole::CopyEditor)
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let (content, content_type) = match (str_field(&payload, "html"), str_field(&payload, "markdown")) {
            (Some(html), _) => (html.to_string(), "html"),
            (None, Some(markdown)) => (markdown.to_string(), "markdown"),
            (None, None) => return StageOutcome::halted("content to edit is missing", payload),
        };
        let config = input.agent_or_default(AgentRole::CopyEditor);
        let prompt = config.prompt(&[("content", content.as_str()), ("contentType", content_type)]);
        let policy = ctx.policy(&self.retry).transient_only();

        let ticker = ctx.ticker(COPY_EDITING, "generating publication parameters");
        let result = self
            .model
            .complete_structured(&config, &prompt, &policy, &self.parser, &content)
            .await;
        ticker.stop();

        match result {
            Ok(parsed) => {
                let params = parsed.params().cloned().unwrap_or_default();
                let adapted = parsed.adapted_content().unwrap_or(content.as_str()).to_string();
                let message = if parsed.used_fallback {
                    format!("parameters generated with {} recovery step(s)", parsed.warnings.len())
                } else {
                    "parameters generated".to_string()
                };
                set(&mut payload, "wordpressParams", Value::Object(params));
                set(&mut payload, "adaptedContent", adapted);
                set(&mut payload, "parseWarnings", parsed.warnings);
                set(&mut payload, "usedFallback", parsed.used_fallback);
                StageOutcome::completed(message, payload)
            }
            Err(err) => {
                let title = str_field(&payload, "title").unwrap_or(PLACEHOLDER_TITLE).to_string();
                set(
                    &mut payload,
                    "wordpressParams",
                    json!({ "title": title, "content": content }),
                );
                set(&mut payload, "adaptedContent", content);
                set(&mut payload, "parseWarnings", vec![err.to_string()]);
                set(&mut payload, "usedFallback", true);
                StageOutcome::degraded(format!("copy editing failed: {err}"), payload)
            }
        }
    }
}

pub struct PrepPublishHandler {
    post_status: String,
}

impl PrepPublishHandler {
    pub fn new(post_status: impl Into<String>) -> Self {
        Self {
            post_status: post_status.into(),
        }
    }
}

#[async_trait::async_trait]
impl StageHandler for PrepPublishHandler {
    fn stage_id(&self) -> &'static str {
        PREP_PUBLISH
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let Some(Value::Object(params)) = payload.get("wordpressParams").cloned() else {
            return StageOutcome::halted("publication parameters are missing", payload);
        };
        let id = str_field(&payload, "fileId").unwrap_or("document").to_string();

        let title = str_field(&params, "title")
            .or_else(|| str_field(&payload, "title"))
            .unwrap_or(PLACEHOLDER_TITLE)
            .to_string();
        let Some(content) = str_field(&payload, "adaptedContent")
            .or_else(|| str_field(&params, "content"))
            .map(str::to_string)
        else {
            return StageOutcome::halted("post content is missing", payload);
        };
        let slug = str_field(&params, "slug")
            .map(slugify)
            .unwrap_or_else(|| slugify(&title));
        let extra: Map<String, Value> = params
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "title" | "content" | "excerpt" | "slug" | "status"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let draft = PostDraft {
            title,
            content,
            excerpt: str_field(&params, "excerpt").map(str::to_string),
            slug: (!slug.is_empty()).then_some(slug),
            status: self.post_status.clone(),
            extra,
        };

        let draft_value = match serde_json::to_value(&draft) {
            Ok(value) => value,
            Err(err) => return StageOutcome::halted(format!("cannot encode draft: {err}"), payload),
        };
        let key = format!("drafts/{id}.json");
        let bytes = match serde_json::to_vec_pretty(&draft_value) {
            Ok(bytes) => bytes,
            Err(err) => return StageOutcome::halted(format!("cannot encode draft: {err}"), payload),
        };
        if let Err(err) = ctx.store.put(&key, &bytes).await {
            return StageOutcome::halted(format!("cannot store draft: {err}"), payload);
        }
        set(&mut payload, "draft", draft_value);
        set(&mut payload, "draftKey", key);
        StageOutcome::completed(format!("draft prepared: {}", draft.title), payload)
    }
}

pub struct PublishHandler {
    publisher: Arc<dyn Publisher>,
}

impl PublishHandler {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait::async_trait]
impl StageHandler for PublishHandler {
    fn stage_id(&self) -> &'static str {
        PUBLISH_NEWS
    }

    async fn run(&self, ctx: &StageContext, input: StageInput) -> StageOutcome {
        let mut payload = input.carry();
        let draft: PostDraft = match payload.get("draft").cloned().map(serde_json::from_value) {
            Some(Ok(draft)) => draft,
            Some(Err(err)) => return StageOutcome::halted(format!("draft is invalid: {err}"), payload),
            None => return StageOutcome::halted("draft is missing", payload),
        };
        ctx.report(PUBLISH_NEWS, 50, "publishing");

        match self.publisher.publish(&draft).await {
            Ok(receipt) => {
                press_info!("post {} is {}", receipt.id, receipt.status);
                set(&mut payload, "postId", receipt.id.clone());
                set(&mut payload, "postStatus", receipt.status.clone());
                if let Some(link) = &receipt.link {
                    set(&mut payload, "link", link.clone());
                }
                StageOutcome::completed(format!("published as {}", receipt.status), payload)
            }
            Err(err) => StageOutcome::halted(format!("publishing failed: {err}"), payload),
        }
    }
}

/// Collaborators for the standard handler set.
#[derive(Clone)]
pub struct StageServices {
    pub model: Arc<dyn ModelClient>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub converter: Arc<dyn FormatConverter>,
    pub publisher: Arc<dyn Publisher>,
    pub ai_retry: RetrySettings,
    pub copy_edit_retry: RetrySettings,
    pub post_status: String,
}

/// Copy editing retries only transient failures, 3 times, 3 s apart.
pub const COPY_EDIT_RETRY: RetrySettings = RetrySettings::new(3, 3000);

/// One handler per stage of the default layout, in order.
pub fn standard_handlers(services: &StageServices) -> Vec<Arc<dyn StageHandler>> {
    vec![
        Arc::new(UploadHandler),
        Arc::new(ExtractHandler::new(services.extractor.clone())),
        Arc::new(ProcessHandler::new(services.model.clone(), services.ai_retry)),
        Arc::new(AdvancedAiHandler::new(services.model.clone(), services.ai_retry)),
        Arc::new(FormatConversionHandler::new(services.converter.clone())),
        Arc::new(CopyEditingHandler::new(
            services.model.clone(),
            services.copy_edit_retry,
        )),
        Arc::new(PrepPublishHandler::new(services.post_status.clone())),
        Arc::new(PublishHandler::new(services.publisher.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_flags_are_stored_but_not_carried() {
        let mut payload = Map::new();
        payload.insert("fileId".into(), json!("doc-1"));
        let outcome = StageOutcome::degraded("PR writer pass failed", payload);
        let stored = outcome.to_result();
        assert_eq!(stored["success"], json!(false));
        assert_eq!(stored["stageComplete"], json!(true));

        let input = StageInput {
            previous: Some(stored),
            agent: None,
        };
        let carry = input.carry();
        assert_eq!(carry.len(), 1);
        assert_eq!(carry["fileId"], json!("doc-1"));
    }
}
