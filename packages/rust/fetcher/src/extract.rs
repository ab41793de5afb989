//! HTML → readable text.
//!
//! Picks the page's main content container, drops navigation chrome, converts
//! the rest to Markdown with `htmd`, then tidies whitespace.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use sourcescout_shared::{Result, SourceScoutError};

/// Content containers in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    ".post",
];

/// Tags whose subtree never carries page content.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form", "button", "iframe",
    "noscript", "svg", "template",
];

/// Convert an HTML document into text for summarization.
pub fn html_to_text(html: &str) -> Result<String> {
    let content_html = extract_content_html(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(CHROME_TAGS.to_vec())
        .build();

    let markdown = converter
        .convert(&content_html)
        .map_err(|e| SourceScoutError::parse(format!("htmd conversion failed: {e}")))?;

    let text = strip_media(&markdown);
    let text = normalize_whitespace(&text);
    debug!(html_len = html.len(), text_len = text.len(), "extracted text");
    Ok(text)
}

/// Trim line ends and collapse runs of blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let trimmed_lines = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUN_RE
        .replace_all(trimmed_lines.trim(), "\n\n")
        .into_owned()
}

fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    for sel_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                if !el.text().all(|t| t.trim().is_empty()) {
                    return el.inner_html();
                }
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    html.to_string()
}

/// Image links add nothing to a summary.
fn strip_media(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    IMAGE_RE.replace_all(md, "").into_owned()
}
