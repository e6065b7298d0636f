//! Client-side feed accumulation: cursor-based pagination with URL dedup,
//! modeled as an explicit three-phase state machine instead of independent
//! loading/has-more/offset flags.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::search::{Article, Freshness, NewsSearch, SearchQuery};

/// Phase of the paginator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// Ready for another load-more trigger
    Idle,
    /// A retrieval call is in flight
    Loading,
    /// Upstream returned zero results (or failed); terminal until the
    /// active query changes
    Exhausted,
}

/// Outcome of one load-more call, for the caller's rendering decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// New articles were appended
    Appended(usize),
    /// The page contained only already-seen articles; cursor advanced
    AllDuplicates,
    /// The feed is exhausted (zero results or retrieval failure)
    Exhausted,
    /// Ignored: the paginator was not Idle
    NotReady,
}

/// Accumulated feed state for one query. Single-writer: owned by one UI
/// session; concurrent tabs hold independent instances.
pub struct FeedPaginator {
    query_text: String,
    freshness: Freshness,
    page_size: u32,
    articles: Vec<Article>,
    seen_urls: HashSet<String>,
    offset: u32,
    phase: FeedPhase,
}

impl FeedPaginator {
    /// Build from the initial page of a feed load. The cursor starts past
    /// the initial results.
    pub fn new(query_text: impl Into<String>, initial: Vec<Article>, page_size: u32) -> Self {
        let mut paginator = Self {
            query_text: query_text.into(),
            freshness: Freshness::Day,
            page_size,
            articles: Vec::new(),
            seen_urls: HashSet::new(),
            offset: 0,
            phase: FeedPhase::Idle,
        };
        paginator.absorb_initial(initial);
        paginator
    }

    fn absorb_initial(&mut self, initial: Vec<Article>) {
        let raw_count = initial.len() as u32;
        for article in initial {
            if self.seen_urls.insert(article.url.clone()) {
                self.articles.push(article);
            }
        }
        self.offset = raw_count;
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Discard the whole state and rebuild from a new query's initial page
    /// (new personalization or explicit refresh). The only way out of
    /// `Exhausted`.
    pub fn reset(&mut self, query_text: impl Into<String>, initial: Vec<Article>) {
        self.query_text = query_text.into();
        self.articles.clear();
        self.seen_urls.clear();
        self.offset = 0;
        self.phase = FeedPhase::Idle;
        self.absorb_initial(initial);
    }

    /// One load-more trigger (viewport sentinel intersection or explicit
    /// request). No-op unless Idle.
    ///
    /// The cursor advances by the count of RAW results returned, not just
    /// the novel ones, so the offset stays aligned with upstream
    /// pagination. A page of pure duplicates therefore still advances the
    /// cursor, which prevents infinite retry loops on a stagnant page.
    pub async fn load_more(&mut self, search: &dyn NewsSearch) -> LoadOutcome {
        if self.phase != FeedPhase::Idle {
            return LoadOutcome::NotReady;
        }
        self.phase = FeedPhase::Loading;

        let query = SearchQuery {
            text: self.query_text.clone(),
            freshness: self.freshness,
            count: self.page_size,
            offset: self.offset,
        };

        match search.search(&query).await {
            Ok(results) if results.is_empty() => {
                info!(query = %self.query_text, "feed exhausted at offset {}", self.offset);
                self.phase = FeedPhase::Exhausted;
                LoadOutcome::Exhausted
            }
            Ok(results) => {
                let raw_count = results.len() as u32;
                let mut appended = 0usize;
                for article in results {
                    if self.seen_urls.insert(article.url.clone()) {
                        self.articles.push(article);
                        appended += 1;
                    }
                }
                self.offset += raw_count;
                self.phase = FeedPhase::Idle;

                if appended == 0 {
                    // A stagnant upstream page: advance past it silently.
                    debug!(
                        query = %self.query_text,
                        "page of {} duplicates skipped, cursor now {}",
                        raw_count,
                        self.offset
                    );
                    LoadOutcome::AllDuplicates
                } else {
                    LoadOutcome::Appended(appended)
                }
            }
            Err(e) => {
                // Do not retry indefinitely against a failing upstream.
                warn!(query = %self.query_text, "feed retrieval failed: {}", e);
                self.phase = FeedPhase::Exhausted;
                LoadOutcome::Exhausted
            }
        }
    }
}

/// Convenience used by tests and callers that need the invariant checked.
pub fn has_duplicate_urls(articles: &[Article]) -> bool {
    let mut seen = HashSet::new();
    articles.iter().any(|a| !seen.insert(a.url.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str) -> Article {
        Article {
            url: url.to_string(),
            title: url.to_string(),
            source: "s".to_string(),
            age: None,
            description: None,
            thumbnail: None,
        }
    }

    #[test]
    fn initial_page_sets_cursor_past_raw_results() {
        let paginator = FeedPaginator::new(
            "latest",
            vec![article("a"), article("b"), article("a")],
            24,
        );
        assert_eq!(paginator.offset(), 3);
        assert_eq!(paginator.articles().len(), 2);
        assert_eq!(paginator.phase(), FeedPhase::Idle);
    }

    #[test]
    fn reset_discards_everything() {
        let mut paginator = FeedPaginator::new("old query", vec![article("a")], 24);
        paginator.phase = FeedPhase::Exhausted;

        paginator.reset("new query", vec![article("z")]);
        assert_eq!(paginator.phase(), FeedPhase::Idle);
        assert_eq!(paginator.offset(), 1);
        assert_eq!(paginator.articles()[0].url, "z");
    }
}
