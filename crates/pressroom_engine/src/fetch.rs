//! Page downloads for the URL pipeline.
//!
//! The body is streamed so oversized pages are cut off early and the extract
//! stage can show how far the download has got.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pressroom_logging::{press_debug, press_info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput, NullProgress, ProgressSink};

const USER_AGENT: &str = concat!("pressroom/", env!("CARGO_PKG_VERSION"));

/// Bytes between progress reports when the server sends no length.
const UNSIZED_REPORT_STEP: u64 = 64 * 1024;

/// Limits applied when pulling a web page for the URL pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Media types accepted from the server. A response without a
    /// `Content-Type` header is always accepted.
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: ["text/html", "application/xhtml+xml", "text/plain", "text/markdown"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl FetchSettings {
    fn accepts(&self, content_type: &str) -> bool {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }

    fn check_size(&self, len: u64) -> Result<(), FetchError> {
        if len <= self.max_bytes {
            return Ok(());
        }
        Err(FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.max_bytes,
                actual: Some(len),
            },
            format!("page is larger than {} bytes", self.max_bytes),
        ))
    }
}

/// Maps a download onto a slice of one stage's progress bar.
#[derive(Clone)]
pub struct DownloadProgress {
    sink: Arc<dyn ProgressSink>,
    stage_id: String,
    from: u8,
    to: u8,
}

impl DownloadProgress {
    pub fn new(sink: Arc<dyn ProgressSink>, stage_id: impl Into<String>, from: u8, to: u8) -> Self {
        Self {
            sink,
            stage_id: stage_id.into(),
            from: from.min(to),
            to,
        }
    }

    /// Reports nowhere.
    pub fn silent() -> Self {
        Self::new(Arc::new(NullProgress), "", 0, 0)
    }

    fn percent(&self, received: u64, total: Option<u64>) -> u8 {
        let Some(total) = total.filter(|total| *total > 0) else {
            return self.from;
        };
        let span = u64::from(self.to - self.from);
        let done = span * received.min(total) / total;
        self.from + u8::try_from(done).unwrap_or(self.to - self.from)
    }

    fn report(&self, received: u64, total: Option<u64>) {
        let message = match total {
            Some(total) => format!("downloaded {} of {}", kib(received), kib(total)),
            None => format!("downloaded {}", kib(received)),
        };
        self.sink
            .stage_progress(&self.stage_id, self.percent(received, total), Some(message));
    }
}

fn kib(bytes: u64) -> String {
    format!("{} KiB", bytes.div_ceil(1024))
}

/// Throttles reports to one per percent step, or one per
/// [`UNSIZED_REPORT_STEP`] bytes for unsized bodies.
struct Meter<'a> {
    progress: &'a DownloadProgress,
    total: Option<u64>,
    last_percent: u8,
    last_bytes: u64,
}

impl<'a> Meter<'a> {
    fn start(progress: &'a DownloadProgress, total: Option<u64>) -> Self {
        progress.report(0, total);
        Self {
            progress,
            total,
            last_percent: progress.from,
            last_bytes: 0,
        }
    }

    fn advance(&mut self, received: u64) {
        let percent = self.progress.percent(received, self.total);
        let due = match self.total {
            Some(_) => percent > self.last_percent,
            None => received >= self.last_bytes + UNSIZED_REPORT_STEP,
        };
        if due {
            self.progress.report(received, self.total);
            self.last_percent = percent;
            self.last_bytes = received;
        }
    }

    fn finish(self, received: u64) {
        if received != self.last_bytes {
            self.progress.report(received, self.total);
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, progress: &DownloadProgress) -> Result<FetchOutput, FetchError>;
}

/// Downloads pages over HTTP(S) with a shared client.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn read_body(
        &self,
        response: Response,
        total: Option<u64>,
        progress: &DownloadProgress,
    ) -> Result<Vec<u8>, FetchError> {
        let capacity = total.map_or(0, |total| total.min(self.settings.max_bytes));
        let mut body = Vec::with_capacity(usize::try_from(capacity).unwrap_or_default());
        let mut meter = Meter::start(progress, total);
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(classify)?;
            let received = (body.len() + chunk.len()) as u64;
            self.settings.check_size(received)?;
            body.extend_from_slice(&chunk);
            meter.advance(received);
        }
        meter.finish(body.len() as u64);
        Ok(body)
    }
}

fn page_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::new(
            FailureKind::InvalidUrl,
            format!("unsupported scheme {other}"),
        )),
    }
}

#[async_trait::async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str, progress: &DownloadProgress) -> Result<FetchOutput, FetchError> {
        let requested = page_url(url)?;
        press_info!("downloading {requested}");
        let response = self
            .client
            .get(requested.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("{requested} answered {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type.as_deref().filter(|ct| !self.settings.accepts(ct)) {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: content_type.to_string(),
                },
                "not a text or HTML page",
            ));
        }

        let total = response.content_length();
        if let Some(total) = total {
            self.settings.check_size(total)?;
        }
        let final_url = response.url().clone();
        let body = self.read_body(response, total, progress).await?;
        press_debug!("downloaded {} bytes from {final_url}", body.len());

        Ok(FetchOutput {
            metadata: FetchMetadata {
                requested_url: requested.to_string(),
                redirected: final_url != requested,
                final_url: final_url.to_string(),
                content_type,
                byte_len: body.len() as u64,
            },
            bytes: body,
        })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}
