use std::collections::VecDeque;
use std::sync::Mutex;

use revnews::error::{Error, Result};
use revnews::feed::{has_duplicate_urls, FeedPaginator, FeedPhase, LoadOutcome};
use revnews::search::{Article, NewsSearch, SearchQuery};

fn article(url: &str) -> Article {
    Article {
        url: url.to_string(),
        title: format!("title {}", url),
        source: "wire".to_string(),
        age: Some("1h".to_string()),
        description: None,
        thumbnail: None,
    }
}

/// Scripted retriever: returns pre-programmed pages in order and records
/// the offsets it was called with.
struct ScriptedSearch {
    pages: Mutex<VecDeque<Result<Vec<Article>>>>,
    offsets: Mutex<Vec<u32>>,
}

impl ScriptedSearch {
    fn new(pages: Vec<Result<Vec<Article>>>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().collect()),
            offsets: Mutex::new(Vec::new()),
        }
    }

    fn offsets(&self) -> Vec<u32> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl NewsSearch for ScriptedSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>> {
        self.offsets.lock().unwrap().push(query.offset);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[tokio::test]
async fn overlapping_pages_accumulate_without_duplicates() {
    // Page at offset 0: [a, b]; page at offset 2: [b, c].
    let search = ScriptedSearch::new(vec![Ok(vec![article("b"), article("c")])]);
    let mut paginator = FeedPaginator::new("latest", vec![article("a"), article("b")], 2);

    assert_eq!(paginator.offset(), 2);

    let outcome = paginator.load_more(&search).await;
    assert_eq!(outcome, LoadOutcome::Appended(1));

    let urls: Vec<&str> = paginator.articles().iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls, vec!["a", "b", "c"]);
    // Cursor advanced by the raw result count (4 total), not just novel ones.
    assert_eq!(paginator.offset(), 4);
    assert_eq!(search.offsets(), vec![2]);
}

#[tokio::test]
async fn no_duplicates_across_many_loads() {
    let pages = vec![
        Ok(vec![article("c"), article("a"), article("d")]),
        Ok(vec![article("d"), article("e")]),
        Ok(vec![article("a"), article("f"), article("f")]),
    ];
    let search = ScriptedSearch::new(pages);
    let mut paginator = FeedPaginator::new("markets", vec![article("a"), article("b")], 3);

    while paginator.phase() == FeedPhase::Idle {
        if paginator.load_more(&search).await == LoadOutcome::Exhausted {
            break;
        }
    }

    assert!(!has_duplicate_urls(paginator.articles()));
    assert_eq!(paginator.articles().len(), 6); // a b c d e f
}

#[tokio::test]
async fn all_duplicate_page_advances_cursor_without_content() {
    let search = ScriptedSearch::new(vec![Ok(vec![article("a"), article("b")])]);
    let mut paginator = FeedPaginator::new("latest", vec![article("a"), article("b")], 2);

    let outcome = paginator.load_more(&search).await;
    assert_eq!(outcome, LoadOutcome::AllDuplicates);
    assert_eq!(paginator.articles().len(), 2);
    // Cursor still advanced, so the next trigger probes a fresh page
    // instead of looping on the stagnant one.
    assert_eq!(paginator.offset(), 4);
    assert_eq!(paginator.phase(), FeedPhase::Idle);
}

#[tokio::test]
async fn zero_results_exhaust_the_feed_terminally() {
    let search = ScriptedSearch::new(vec![Ok(Vec::new())]);
    let mut paginator = FeedPaginator::new("latest", vec![article("a")], 24);

    assert_eq!(paginator.load_more(&search).await, LoadOutcome::Exhausted);
    assert_eq!(paginator.phase(), FeedPhase::Exhausted);

    // Further triggers are ignored until the query changes.
    assert_eq!(paginator.load_more(&search).await, LoadOutcome::NotReady);
    assert_eq!(search.offsets().len(), 1);
}

#[tokio::test]
async fn retrieval_error_exhausts_instead_of_retrying() {
    let search = ScriptedSearch::new(vec![
        Err(Error::search_unavailable("503")),
        Ok(vec![article("z")]),
    ]);
    let mut paginator = FeedPaginator::new("latest", vec![article("a")], 24);

    assert_eq!(paginator.load_more(&search).await, LoadOutcome::Exhausted);
    assert_eq!(paginator.phase(), FeedPhase::Exhausted);
    assert_eq!(paginator.offset(), 1); // failed load does not advance

    // A query change resets the whole state and the feed loads again.
    paginator.reset("new interest", vec![article("y")]);
    assert_eq!(paginator.phase(), FeedPhase::Idle);
    assert_eq!(paginator.load_more(&search).await, LoadOutcome::Appended(1));
    let urls: Vec<&str> = paginator.articles().iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls, vec!["y", "z"]);
}
