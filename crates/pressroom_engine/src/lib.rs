//! Pressroom engine: resilience executor, provider adapter, stage handlers and
//! the pipeline runner.
mod agent;
mod convert;
mod decode;
mod error;
mod extract;
mod fetch;
mod filename;
mod frontmatter;
mod parse;
mod persist;
mod preview;
mod provider;
mod publish;
mod retry;
mod runner;
mod stages;
mod ticker;
mod types;

pub use agent::{
    render_template, resolve_agent_config, AgentConfig, AgentConfigSource, AgentRole, PromptPair,
    StaticAgentConfigs,
};
pub use convert::{
    clean_markdown, strip_code_fence, FormatConverter, Html2MdConverter, HtmlToMarkdown,
    MarkdownHtmlConverter,
};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use error::{AgentError, ErrorKind};
pub use extract::{
    main_content, ContentExtractor, DocumentExtractor, ExtractedDocument, ExtractionInput,
    MainContent,
};
pub use fetch::{DownloadProgress, FetchSettings, Fetcher, PageFetcher};
pub use filename::{file_id, slugify};
pub use frontmatter::{split as split_frontmatter, Frontmatter};
pub use parse::{ParseResult, TolerantParser, PARAMS_KEY, PLACEHOLDER_TITLE};
pub use persist::{ensure_output_dir, LocalObjectStore, ObjectStore, PersistError, StoredObject};
pub use preview::{preview, MAX_PREVIEW_BYTES};
pub use provider::{
    build_config, build_http_client, is_reasoning_model, CredentialSource, EnvCredentials,
    ModelClient, ProviderAdapter, ProviderEndpoints, ProviderFamily, StaticCredentials,
};
pub use publish::{
    DraftPublisher, PostDraft, PublishReceipt, Publisher, WordPressPublisher,
    WORDPRESS_APP_PASSWORD, WORDPRESS_USERNAME,
};
pub use retry::{
    execute, execute_with_fallback, is_transient_message, RetryEvent, RetryPolicy, RetrySettings,
    TRANSIENT_MARKERS,
};
pub use runner::{PipelineHandle, PipelineRunner, RunSummary, RunnerError};
pub use stages::{
    standard_handlers, AdvancedAiHandler, Clock, CopyEditingHandler, ExtractHandler,
    FormatConversionHandler, PrepPublishHandler, ProcessHandler, PublishHandler, StageContext,
    StageHandler, StageInput, StageOutcome, StageServices, UploadHandler, COPY_EDIT_RETRY,
};
pub use ticker::{ProgressTicker, TICK_CEILING, TICK_START, TICK_STEP};
pub use types::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, NullProgress, ProgressSink, ServiceError,
};
