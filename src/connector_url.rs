//! Web page connector.
//!
//! Fetches a URL and reduces the HTML to plain text: `script`, `style`
//! and `noscript` subtrees are dropped and all whitespace runs collapse to
//! a single space.

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;

use crate::models::{Document, DocumentMetadata, Origin};

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "br", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "section",
    "article", "header", "footer", "blockquote", "pre",
];

/// Fetch `url` and extract its visible text.
pub async fn fetch_url(url: &str, timeout: Duration, tag: Option<String>) -> Result<Document> {
    tracing::info!(url, "fetching url");
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("kb-ingest/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let html = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Failed to fetch {}", url))?
        .text()
        .await?;

    Ok(Document {
        content: html_to_text(&html),
        metadata: DocumentMetadata::new(
            Origin::Url {
                url: url.to_string(),
            },
            tag,
        ),
    })
}

/// Visible text of an HTML document's `<body>`, whitespace-collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = match Selector::parse("body") {
        Ok(body) => document
            .select(&body)
            .next()
            .unwrap_or_else(|| document.root_element()),
        Err(_) => document.root_element(),
    };

    let mut raw = String::new();
    collect_text(root, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if BLOCK_TAGS.contains(&name) {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
