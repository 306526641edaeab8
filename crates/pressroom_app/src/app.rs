//! Wires settings into a pipeline runner and drives one run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use pressroom_core::{Metadata, PipelineKind};
use pressroom_engine::{
    build_http_client, ensure_output_dir, standard_handlers, CredentialSource, DocumentExtractor,
    DraftPublisher, EnvCredentials, LocalObjectStore, MarkdownHtmlConverter, ObjectStore,
    PageFetcher, PipelineHandle, PipelineRunner, ProviderAdapter, Publisher, RetryEvent,
    RunSummary, StageServices, WordPressPublisher,
};
use pressroom_logging::press_info;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::progress::print_progress;
use crate::settings::Settings;

pub async fn run(args: &RunArgs, settings: Settings) -> Result<RunSummary> {
    let output_dir = args.output.clone().unwrap_or_else(|| settings.output_dir.clone());
    ensure_output_dir(&output_dir)
        .with_context(|| format!("cannot use output directory {}", output_dir.display()))?;
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(output_dir.clone()));

    let credentials: Arc<dyn CredentialSource> = Arc::new(EnvCredentials);
    let client = build_http_client(settings.request_timeout()).context("cannot build HTTP client")?;
    let fetcher = PageFetcher::new(settings.fetch.clone()).context("cannot build page fetcher")?;
    let publisher = publisher(args, &settings, client.clone(), credentials.clone(), store.clone());
    let services = StageServices {
        model: Arc::new(ProviderAdapter::new(
            client,
            settings.endpoints.clone(),
            credentials,
        )),
        extractor: Arc::new(DocumentExtractor::new(Arc::new(fetcher))),
        converter: Arc::new(MarkdownHtmlConverter),
        publisher,
        ai_retry: settings.ai_retry,
        copy_edit_retry: settings.copy_edit_retry,
        post_status: settings.publisher.post_status.clone(),
    };

    let (retry_tx, retry_rx) = mpsc::unbounded_channel();
    let handle = PipelineHandle::default();
    let runner = PipelineRunner::new(handle.clone(), Arc::new(settings.agents.to_source()), store)
        .with_handlers(standard_handlers(&services))
        .with_tick_interval(settings.tick_interval())
        .with_retry_events(retry_tx);

    let done = CancellationToken::new();
    let printer = tokio::spawn(print_progress(handle.subscribe(), done.clone()));
    let retries = tokio::spawn(print_retries(retry_rx, done.clone()));

    let (kind, metadata) = source_metadata(args)?;
    let summary = runner.run(kind, metadata).await;
    done.cancel();
    printer.await.context("progress printer stopped unexpectedly")?;
    retries.await.context("retry printer stopped unexpectedly")?;

    let summary = summary?;
    press_info!("artifacts are in {}", output_dir.display());
    Ok(summary)
}

fn publisher(
    args: &RunArgs,
    settings: &Settings,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    store: Arc<dyn ObjectStore>,
) -> Arc<dyn Publisher> {
    match (&settings.publisher.site_url, args.dry_run || settings.dry_run) {
        (Some(site_url), false) => {
            press_info!("publishing to {site_url}");
            Arc::new(WordPressPublisher::new(client, site_url.clone(), credentials))
        }
        _ => {
            press_info!("dry run: posts are written to the output directory");
            Arc::new(DraftPublisher::new(store))
        }
    }
}

fn source_metadata(args: &RunArgs) -> Result<(PipelineKind, Metadata)> {
    if let Some(url) = &args.source.url {
        return Ok((PipelineKind::Url, Metadata::from([("url".to_string(), json!(url))])));
    }
    let path = args
        .source
        .file
        .as_deref()
        .context("either --file or --url is required")?;
    Ok((PipelineKind::File, file_metadata(path)))
}

fn file_metadata(path: &Path) -> Metadata {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));
    let mut metadata = Metadata::from([("filePath".to_string(), json!(absolute.display().to_string()))]);
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        metadata.insert("fileName".to_string(), json!(name));
    }
    metadata
}

async fn print_retries(mut events: mpsc::UnboundedReceiver<RetryEvent>, done: CancellationToken) {
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = done.cancelled() => None,
        };
        let Some(event) = event else {
            break;
        };
        println!(
            "       retry #{} in {} ms: {}",
            event.attempt,
            event.delay.as_millis(),
            event.error
        );
    }
}
