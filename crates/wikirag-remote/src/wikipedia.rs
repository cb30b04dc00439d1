use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use wikirag_core::config::WikipediaSettings;
use wikirag_core::traits::TextSource;
use wikirag_core::types::{SourceRecord, SourceText};

/// MediaWiki-backed source: search for a topic, then pull the plain-text intro of each hit.
///
/// Each page becomes one record formatted `Page: <title>\nSummary: <extract>`.
/// The combined text (records joined by a blank line) is capped at `max_chars`.
pub struct WikipediaSource {
    client: Client,
    settings: WikipediaSettings,
}

impl WikipediaSource {
    pub fn new(settings: WikipediaSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .context("building Wikipedia HTTP client")?;
        Ok(Self { client, settings })
    }

    fn api_url(&self) -> String {
        format!("{}/w/api.php", self.settings.base_url.trim_end_matches('/'))
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value> {
        let resp = self
            .client
            .get(self.api_url())
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .with_context(|| format!("requesting {}", self.api_url()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("Wikipedia API returned {}", status));
        }
        Ok(resp.json::<Value>().await?)
    }

    pub async fn search_titles(&self, topic: &str) -> Result<Vec<String>> {
        let limit = self.settings.top_k_results.to_string();
        let body = self.query(&[("list", "search"), ("srsearch", topic), ("srlimit", limit.as_str())]).await?;
        let mut titles = parse_search_titles(&body);
        titles.truncate(self.settings.top_k_results);
        debug!(topic, hits = titles.len(), "wikipedia search");
        Ok(titles)
    }

    pub async fn page_extract(&self, title: &str) -> Result<Option<(String, String)>> {
        let body = self
            .query(&[("prop", "extracts"), ("exintro", "1"), ("explaintext", "1"), ("redirects", "1"), ("titles", title)])
            .await?;
        Ok(parse_extract(&body))
    }
}

#[async_trait]
impl TextSource for WikipediaSource {
    async fn fetch(&self, topic: &str) -> Result<SourceText> {
        let titles = self.search_titles(topic).await?;
        let mut outcomes = Vec::with_capacity(titles.len());
        for title in titles {
            let outcome = self.page_extract(&title).await;
            outcomes.push((title, outcome));
        }
        let pages = keep_fetched_pages(outcomes);
        let text = format_records(pages, self.settings.max_chars);
        if let SourceText::Records(records) = &text {
            info!(topic, pages = records.len(), "fetched Wikipedia summaries");
        }
        Ok(text)
    }
}

/// Titles from a `list=search` response, in rank order.
pub fn parse_search_titles(body: &Value) -> Vec<String> {
    body.pointer("/query/search")
        .and_then(Value::as_array)
        .map(|hits| hits.iter().filter_map(|h| h.get("title").and_then(Value::as_str)).map(str::to_string).collect())
        .unwrap_or_default()
}

/// `(title, extract)` of the first non-missing page with a non-blank extract.
pub fn parse_extract(body: &Value) -> Option<(String, String)> {
    let pages = body.pointer("/query/pages").and_then(Value::as_array)?;
    pages.iter().find_map(|page| {
        if page.get("missing").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }
        let title = page.get("title").and_then(Value::as_str)?;
        let extract = page.get("extract").and_then(Value::as_str)?.trim();
        if extract.is_empty() { None } else { Some((title.to_string(), extract.to_string())) }
    })
}

/// Pages that fetched cleanly, in order. A page whose request failed is logged and skipped.
pub fn keep_fetched_pages(outcomes: Vec<(String, Result<Option<(String, String)>>)>) -> Vec<(String, String)> {
    let mut pages = Vec::with_capacity(outcomes.len());
    for (title, outcome) in outcomes {
        match outcome {
            Ok(Some(page)) => pages.push(page),
            Ok(None) => {}
            Err(e) => warn!(title = %title, error = %format!("{e:#}"), "skipping Wikipedia page"),
        }
    }
    pages
}

/// Build one record per page, stopping once the joined text reaches `max_chars`.
pub fn format_records(pages: Vec<(String, String)>, max_chars: usize) -> SourceText {
    let mut records = Vec::new();
    let mut budget = max_chars;
    for (title, extract) in pages {
        if !records.is_empty() {
            if budget <= 2 { break; }
            budget -= 2;
        }
        if budget == 0 { break; }
        let text = format!("Page: {title}\nSummary: {extract}");
        let len = text.chars().count();
        if len <= budget {
            budget -= len;
            records.push(SourceRecord::titled(title, text));
        } else {
            records.push(SourceRecord::titled(title, text.chars().take(budget).collect::<String>()));
            break;
        }
    }
    SourceText::Records(records)
}
