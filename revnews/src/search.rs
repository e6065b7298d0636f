//! News search capability: query types, the `NewsSearch` trait and the
//! remote HTTP client.
//!
//! Pagination is purely offset-based; the retriever keeps no memory of
//! prior calls. All cross-page dedup sits with the caller (`feed`).

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One retrieved article. Identity is the exact URL string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Recency filter on search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Day,
    Week,
    Month,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Day => "day",
            Freshness::Week => "week",
            Freshness::Month => "month",
        }
    }
}

impl std::str::FromStr for Freshness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Freshness::Day),
            "week" => Ok(Freshness::Week),
            "month" => Ok(Freshness::Month),
            other => Err(format!("unknown freshness: {}", other)),
        }
    }
}

/// Immutable search query value object
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub freshness: Freshness,
    pub count: u32,
    pub offset: u32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            freshness: Freshness::Day,
            count: 20,
            offset: 0,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// News search capability
#[async_trait::async_trait]
pub trait NewsSearch: Send + Sync {
    /// Retrieve one page of articles, deduplicated by URL within the page.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>>;
}

/// Diversifying terms appended to the generic default query so that repeated
/// default-feed loads do not return the same stale pool.
const QUERY_DIVERSIFIERS: &[&str] = &["today", "recent", "breaking", "update", "current"];

/// Append a pseudo-random diversifier when the raw text is exactly the
/// generic default; any other query passes through unmodified.
pub fn diversify_query(text: &str) -> String {
    if text == "latest" || text == "latest news" {
        let buster = QUERY_DIVERSIFIERS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("today");
        format!("{} {}", text, buster)
    } else {
        text.to_string()
    }
}

/// Title words used to build the related-story query
const RELATED_QUERY_WORDS: usize = 8;

/// Comparison cluster size for the spectrum analysis
const RELATED_COUNT: u32 = 8;

/// Condense an article title into the query used to find other coverage of
/// the same story.
pub fn related_query(title: &str) -> String {
    title
        .split_whitespace()
        .take(RELATED_QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Retrieve other sources' coverage of the story behind `title`, excluding
/// the subject article itself.
pub async fn find_related(
    search: &dyn NewsSearch,
    title: &str,
    exclude_url: &str,
) -> Result<Vec<Article>> {
    let query = SearchQuery::new(related_query(title)).with_count(RELATED_COUNT);
    let articles = search.search(&query).await?;
    Ok(articles
        .into_iter()
        .filter(|a| a.url != exclude_url)
        .collect())
}

/// Drop articles whose URL was already seen earlier in the same page.
pub fn dedup_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen: HashSet<String> = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.url.clone()))
        .collect()
}

/// Remote news search client (bearer-key GET endpoint)
pub struct RemoteNewsSearch {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    results: Vec<Article>,
}

impl RemoteNewsSearch {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("news search API key is missing; upstream calls will likely be rejected");
        }
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: Duration::from_secs(15),
            client: reqwest::Client::new(),
        }
    }

    /// Build the client from configuration, reading the key from the env var
    /// named there. A missing key is tolerated here (the upstream rejects the
    /// call and the error surfaces as `UpstreamUnavailable`).
    pub fn from_config(config: &common::SearchConfig) -> Self {
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok());
        Self::new(config.api_url.clone(), api_key)
    }
}

#[async_trait::async_trait]
impl NewsSearch for RemoteNewsSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>> {
        let effective_text = diversify_query(&query.text);
        debug!(query = %effective_text, offset = query.offset, "news search");

        let count = query.count.to_string();
        let offset = query.offset.to_string();
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", effective_text.as_str()),
                ("count", count.as_str()),
                ("offset", offset.as_str()),
                ("freshness", query.freshness.as_str()),
            ])
            .timeout(self.timeout);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(Error::search_unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::search_unavailable(format!("{}: {}", status, body)));
        }

        let body: SearchResponseBody = response
            .json()
            .await
            .map_err(|e| Error::search_unavailable(format!("invalid search body: {}", e)))?;

        Ok(dedup_by_url(body.results))
    }
}
