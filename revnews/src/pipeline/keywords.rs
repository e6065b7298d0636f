//! Keyword stage: decide whether a conversational turn needs a live search,
//! and with what terms.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

use crate::llm::{ChatTurn, CompletionProvider, CompletionRequest};

/// Sentinel the model emits when no live search is required
const NO_SEARCH_SENTINEL: &str = "NONE";

/// Fallback terms when extraction degrades
const DEFAULT_KEYWORDS: &str = "latest news";

/// Outcome of the keyword stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordDecision {
    /// Run a live search with these 1-3 terms
    Search(String),
    /// Greeting / meta question: answer without retrieval
    NoSearch,
}

pub struct KeywordExtractor {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl KeywordExtractor {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Derive search keywords from one user turn.
    ///
    /// The system prompt pins "today" to `as_of`: the model's knowledge
    /// horizon is static, so every time-sensitive decision is re-grounded
    /// with the caller-supplied date. Extraction never hard-fails; a missing
    /// provider, an upstream error or empty output all degrade to the
    /// default terms.
    pub async fn extract(&self, turn_text: &str, as_of: NaiveDate) -> KeywordDecision {
        let Some(provider) = &self.provider else {
            return KeywordDecision::Search(DEFAULT_KEYWORDS.to_string());
        };

        let system = format!(
            "You are a news researcher. Today is {}. Based on the user's question, \
             output 1-3 specific search keywords to find the most recent news. \
             Output ONLY the keywords. If it's a general greeting or doesn't need \
             news, output 'NONE'.",
            as_of
        );

        let request = CompletionRequest::new(vec![
            ChatTurn::system(system),
            ChatTurn::user(turn_text),
        ])
        .with_max_tokens(20);

        let raw = match provider.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("keyword extraction failed, using default terms: {}", e);
                return KeywordDecision::Search(DEFAULT_KEYWORDS.to_string());
            }
        };

        let keywords = clean_keywords(&raw);
        if keywords.is_empty() {
            return KeywordDecision::Search(DEFAULT_KEYWORDS.to_string());
        }
        if keywords.eq_ignore_ascii_case(NO_SEARCH_SENTINEL) {
            return KeywordDecision::NoSearch;
        }
        KeywordDecision::Search(keywords)
    }
}

/// Strip the filler labels the model may prepend, then trim.
pub fn clean_keywords(raw: &str) -> String {
    const FILLERS: &[&str] = &["Keywords:", "Search:", "Topic:"];

    let mut out = raw.trim().to_string();
    for filler in FILLERS {
        out = strip_label_ci(&out, filler);
    }
    out.trim().to_string()
}

/// Remove every case-insensitive occurrence of `label` from `text`.
fn strip_label_ci(text: &str, label: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let needle = label.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&needle) {
        let at = pos + found;
        out.push_str(&text[pos..at]);
        pos = at + needle.len();
    }
    out.push_str(&text[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_filler_labels() {
        assert_eq!(clean_keywords("Keywords: rust 1.80 release"), "rust 1.80 release");
        assert_eq!(clean_keywords("SEARCH: ukraine ceasefire"), "ukraine ceasefire");
        assert_eq!(clean_keywords("topic: fed rates"), "fed rates");
        assert_eq!(clean_keywords("  nvidia earnings  "), "nvidia earnings");
    }

    #[test]
    fn cleaning_is_literal_not_word_based() {
        // Labels are removed wherever they occur, matching the original behavior
        assert_eq!(clean_keywords("Keywords: Search: oil prices"), "oil prices");
    }

    #[tokio::test]
    async fn missing_provider_degrades_to_default_terms() {
        let extractor = KeywordExtractor::new(None);
        let decision = extractor
            .extract("what happened today?", NaiveDate::from_ymd_opt(2026, 8, 30).unwrap())
            .await;
        assert_eq!(decision, KeywordDecision::Search(DEFAULT_KEYWORDS.to_string()));
    }
}
