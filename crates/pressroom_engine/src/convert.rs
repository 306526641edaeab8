use pulldown_cmark::{html, Options, Parser};

use crate::frontmatter;
use crate::ServiceError;

pub trait HtmlToMarkdown: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl HtmlToMarkdown for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html(html)
    }
}

/// Markdown to publishable HTML.
#[async_trait::async_trait]
pub trait FormatConverter: Send + Sync {
    async fn to_html(&self, markdown: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownHtmlConverter;

#[async_trait::async_trait]
impl FormatConverter for MarkdownHtmlConverter {
    async fn to_html(&self, markdown: &str) -> Result<String, ServiceError> {
        if markdown.trim().is_empty() {
            return Err(ServiceError::Invalid("nothing to convert".into()));
        }
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_TASKLISTS;
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        Ok(out)
    }
}

/// Header keys the pipeline writes into stored Markdown.
const PIPELINE_HEADER_KEYS: &[&str] = &[
    "title",
    "source",
    "processed_at",
    "extracted_at",
    "source_url",
    "source_file",
];

/// Prepares model output for conversion: drops a header the pipeline wrote,
/// a wrapping code fence and HTML comments. Other leading `---` blocks are
/// content and stay.
pub fn clean_markdown(markdown: &str) -> String {
    let body = strip_pipeline_header(markdown.trim_start());
    let body = strip_pipeline_header(strip_code_fence(body));
    strip_html_comments(body).trim().to_string()
}

fn strip_pipeline_header(markdown: &str) -> &str {
    match frontmatter::split(markdown) {
        (Some(header), body) if PIPELINE_HEADER_KEYS.iter().any(|key| header.get(key).is_some()) => body,
        _ => markdown,
    }
}

/// Removes a markdown (or untagged) code fence wrapping the whole text.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some((info, body)) = rest.split_once('\n') else {
        return text;
    };
    let info = info.trim().to_ascii_lowercase();
    if !(info.is_empty() || info == "markdown" || info == "md") {
        return text;
    }
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn strip_html_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + "-->".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_and_comments_are_removed() {
        let text = "```markdown\n# Title\n<!-- note -->\nBody\n```\n";
        assert_eq!(clean_markdown(text), "# Title\n\nBody");
    }

    #[test]
    fn opening_rule_keeps_headline_and_lead() {
        let text = "---\n# Launch day\n\nWe shipped the product.\n\n---\n\nContact: press@example.com";
        let cleaned = clean_markdown(text);
        assert!(cleaned.contains("# Launch day"));
        assert!(cleaned.contains("We shipped the product."));
        assert!(cleaned.ends_with("Contact: press@example.com"));
    }

    #[test]
    fn only_pipeline_headers_are_dropped() {
        let ours = "---\ntitle: Launch day\nsource: ai-enhanced\n---\n\n# Launch day\n";
        assert_eq!(clean_markdown(ours), "# Launch day");

        let theirs = "---\nNote: embargoed until Monday\n---\n\n# Launch day";
        assert_eq!(clean_markdown(theirs), theirs);
    }

    #[test]
    fn header_inside_a_fence_is_dropped() {
        let text = "```markdown\n---\ntitle: Launch day\n---\n# Launch day\n```";
        assert_eq!(clean_markdown(text), "# Launch day");
    }

    #[test]
    fn other_fences_are_kept() {
        let text = "```rust\nfn main() {}\n```";
        assert_eq!(strip_code_fence(text), text);
    }

    #[tokio::test]
    async fn markdown_tables_render() {
        let html = MarkdownHtmlConverter
            .to_html("| a | b |\n|---|---|\n| 1 | 2 |")
            .await
            .unwrap();
        assert!(html.contains("<table>"));
    }
}
