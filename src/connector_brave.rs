//! Brave Search connector.
//!
//! Queries the Brave web search API and flattens the results into text,
//! one paragraph per result, so the chunker can split on result
//! boundaries. Each paragraph ends with a `Source: <url>` line so the
//! embedded text keeps its attribution. Requires `BRAVE_API_KEY`.

use anyhow::{bail, Context, Result};
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;

use crate::config::BraveConfig;
use crate::models::{Document, DocumentMetadata, Origin};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// One web result as returned by the API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extra_snippets: Vec<String>,
}

/// Run `query` against Brave Search and return the combined result text.
pub async fn search_brave(
    config: &BraveConfig,
    timeout: Duration,
    api_key: &str,
    query: &str,
    tag: Option<String>,
) -> Result<Document> {
    tracing::info!(query, "searching brave");
    let results = fetch_results(config, timeout, api_key, query).await?;
    tracing::info!(count = results.len(), "processing search results");

    Ok(Document {
        content: results_to_text(&results),
        metadata: DocumentMetadata::new(
            Origin::Brave {
                query: query.to_string(),
            },
            tag,
        ),
    })
}

async fn fetch_results(
    config: &BraveConfig,
    timeout: Duration,
    api_key: &str,
    query: &str,
) -> Result<Vec<SearchResult>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()?;

    let count = config.count.to_string();
    let response = client
        .get(&config.endpoint)
        .query(&[("q", query), ("count", count.as_str())])
        .header("Accept", "application/json")
        .header("X-Subscription-Token", api_key)
        .send()
        .await
        .context("Brave search request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Brave API error {}: {}", status, body);
    }

    let body: SearchResponse = response
        .json()
        .await
        .context("Invalid Brave search response")?;
    Ok(body.web.map(|w| w.results).unwrap_or_default())
}

/// Flatten results into blank-line separated paragraphs.
///
/// Brave highlights matches with inline tags (`<strong>`), which are
/// stripped here.
pub fn results_to_text(results: &[SearchResult]) -> String {
    results
        .iter()
        .filter_map(|r| {
            let mut lines = Vec::new();
            for field in [&r.title, &r.description] {
                let text = strip_tags(field);
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            let snippets: Vec<String> = r
                .extra_snippets
                .iter()
                .map(|s| strip_tags(s))
                .filter(|s| !s.is_empty())
                .collect();
            if !snippets.is_empty() {
                lines.push(snippets.join(" "));
            }
            if lines.is_empty() {
                return None;
            }
            if !r.url.is_empty() {
                lines.push(format!("Source: {}", r.url));
            }
            Some(lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn strip_tags(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    let text: String = html.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
