use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::errors::CollaboratorError;

pub const DUCKDUCKGO_BASE: &str = "https://duckduckgo.com";
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

const BROWSER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub position: usize,
    pub title: String,
    pub description: String,
    pub url: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CollaboratorError>;
}

/// Scrapes the DuckDuckGo HTML endpoint.
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
        let url = format!(
            "{}/html/?q={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        );
        info!("searching the web for '{}'", query);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, BROWSER_AGENT)
            .send()
            .await
            .map_err(|e| CollaboratorError::SearchUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::SearchUnavailable(format!(
                "search returned {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CollaboratorError::SearchUnavailable(e.to_string()))?;
        parse_results(&html, limit)
    }
}

fn selector(css: &str) -> Result<Selector, CollaboratorError> {
    Selector::parse(css)
        .map_err(|e| CollaboratorError::SearchUnavailable(format!("bad selector {}: {:?}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result links point at a redirector carrying the target in `uddg`.
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

/// Extract up to `limit` results from a results page. Entries without a
/// title or link are skipped.
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
    let document = Html::parse_document(html);
    let body_selector = selector(".result__body")?;
    let link_selector = selector("a.result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut results = Vec::new();
    for body in document.select(&body_selector) {
        if results.len() >= limit {
            break;
        }
        let Some(link) = body.select(&link_selector).next() else {
            continue;
        };
        let title = text_of(link);
        let href = link.value().attr("href").unwrap_or_default();
        if title.is_empty() || href.is_empty() {
            debug!("skipping search result without title or link");
            continue;
        }
        let description = body
            .select(&snippet_selector)
            .next()
            .map(text_of)
            .unwrap_or_default();

        results.push(SearchResult {
            position: results.len() + 1,
            title,
            description,
            url: resolve_link(href),
        });
    }
    Ok(results)
}
