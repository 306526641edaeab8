use std::path::Path;
use std::sync::Arc;

use pressroom_logging::press_debug;
use scraper::{Html, Selector};

use crate::convert::{Html2MdConverter, HtmlToMarkdown};
use crate::decode::decode_text;
use crate::fetch::{DownloadProgress, Fetcher};
use crate::ServiceError;

/// What the extract stage hands to a [`ContentExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionInput {
    Bytes {
        name: String,
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub title: Option<String>,
    pub markdown: String,
    pub encoding: String,
    pub source_url: Option<String>,
}

#[async_trait::async_trait]
pub trait ContentExtractor: Send + Sync {
    /// `progress` receives download progress when the input is a URL.
    async fn extract(
        &self,
        input: ExtractionInput,
        progress: &DownloadProgress,
    ) -> Result<ExtractedDocument, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainContent {
    pub title: Option<String>,
    pub content_html: String,
}

/// Lightweight readability-style pass over an HTML page:
/// `<title>` text, then `<article>`, `<main>` or `<body>` inner HTML.
pub fn main_content(html: &str) -> MainContent {
    let doc = Html::parse_document(html);
    let title = first_match(&doc, "title")
        .or_else(|| first_match(&doc, "h1"))
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let content_html = ["article", "main", "body"]
        .iter()
        .find_map(|tag| first_match(&doc, tag))
        .map(|node| node.inner_html())
        .unwrap_or_else(|| doc.root_element().html());

    MainContent {
        title,
        content_html,
    }
}

fn first_match<'a>(doc: &'a Html, selector: &str) -> Option<scraper::ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector).next()
}

/// Extracts local HTML, Markdown and text documents and fetched web pages.
pub struct DocumentExtractor {
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn HtmlToMarkdown>,
}

impl DocumentExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            converter: Arc::new(Html2MdConverter),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn HtmlToMarkdown>) -> Self {
        self.converter = converter;
        self
    }

    fn html_document(&self, html: &str, encoding: String, source_url: Option<String>) -> ExtractedDocument {
        let content = main_content(html);
        ExtractedDocument {
            title: content.title,
            markdown: self.converter.to_markdown(&content.content_html).trim().to_string(),
            encoding,
            source_url,
        }
    }
}

#[async_trait::async_trait]
impl ContentExtractor for DocumentExtractor {
    async fn extract(
        &self,
        input: ExtractionInput,
        progress: &DownloadProgress,
    ) -> Result<ExtractedDocument, ServiceError> {
        match input {
            ExtractionInput::Url(url) => {
                let output = self.fetcher.fetch(&url, progress).await?;
                let decoded = decode_text(&output.bytes, output.metadata.content_type.as_deref())?;
                let is_html = output
                    .metadata
                    .content_type
                    .as_deref()
                    .is_none_or(|ct| ct.contains("html"));
                let final_url = Some(output.metadata.final_url);
                if is_html {
                    Ok(self.html_document(&decoded.text, decoded.encoding, final_url))
                } else {
                    Ok(text_document(&decoded.text, decoded.encoding, final_url))
                }
            }
            ExtractionInput::Bytes {
                name,
                bytes,
                content_type,
            } => {
                let kind = DocumentKind::detect(&name, content_type.as_deref())
                    .ok_or_else(|| ServiceError::Unsupported(name.clone()))?;
                let decoded = decode_text(&bytes, content_type.as_deref())?;
                press_debug!("decoded {name} as {}", decoded.encoding);
                Ok(match kind {
                    DocumentKind::Html => self.html_document(&decoded.text, decoded.encoding, None),
                    DocumentKind::Markdown | DocumentKind::Text => {
                        text_document(&decoded.text, decoded.encoding, None)
                    }
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Html,
    Markdown,
    Text,
}

impl DocumentKind {
    fn detect(name: &str, content_type: Option<&str>) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("html" | "htm" | "xhtml") => Some(Self::Html),
            Some("md" | "markdown") => Some(Self::Markdown),
            Some("txt") => Some(Self::Text),
            _ => match content_type {
                Some(ct) if ct.contains("html") => Some(Self::Html),
                Some(ct) if ct.contains("markdown") => Some(Self::Markdown),
                Some(ct) if ct.starts_with("text/") => Some(Self::Text),
                _ => None,
            },
        }
    }
}

fn text_document(text: &str, encoding: String, source_url: Option<String>) -> ExtractedDocument {
    let markdown = crate::frontmatter::split(text).1.trim().to_string();
    let title = markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    ExtractedDocument {
        title,
        markdown,
        encoding,
        source_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_beats_body() {
        let html = "<html><head><title>T</title></head><body><nav>menu</nav><article><p>Story</p></article></body></html>";
        let content = main_content(html);
        assert_eq!(content.title.as_deref(), Some("T"));
        assert_eq!(content.content_html, "<p>Story</p>");
    }

    #[test]
    fn unknown_extension_without_type_is_unsupported() {
        assert_eq!(DocumentKind::detect("report.docx", None), None);
        assert_eq!(
            DocumentKind::detect("notes", Some("text/plain")),
            Some(DocumentKind::Text)
        );
    }
}
