//! Interest translation: turn a freeform stated interest into a strict,
//! high-precision search query for feed personalization. Runs once per
//! preference update, not per feed load.

use std::sync::Arc;
use tracing::warn;

use crate::llm::{ChatTurn, CompletionProvider, CompletionRequest};

/// Generic-feed fallback when translation degrades
const FALLBACK_QUERY: &str = "latest";

pub struct InterestTranslator {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl InterestTranslator {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Derive the persisted search query for a stated interest.
    ///
    /// Personalization degrades to the generic feed ("latest") on a missing
    /// credential or upstream failure; the preference update itself never
    /// fails on this path.
    pub async fn translate(&self, interest: &str) -> String {
        let Some(provider) = &self.provider else {
            return FALLBACK_QUERY.to_string();
        };

        let system = "You are a HYPER-STRICT news filtering assistant. The user wants to \
                      see ONLY news that exactly matches their interests.\n\
                      \n\
                      INSTRUCTIONS:\n\
                      1. Identify the core subjects, entities, or themes in the user's request.\n\
                      2. Convert them into 3-5 high-precision search keywords.\n\
                      3. Use specific identifiers, proper nouns, and technical terminology.\n\
                      4. DO NOT include broad categories (like 'tech' or 'sports') unless they \
                      are the primary subject.\n\
                      5. Output ONLY the keywords separated by spaces. Your goal is 100% \
                      relevance, even if it means fewer results.";

        let request = CompletionRequest::new(vec![
            ChatTurn::system(system),
            ChatTurn::user(interest),
        ])
        .with_max_tokens(30);

        match provider.complete(request).await {
            Ok(response) => {
                let cleaned = strip_quotes(response.content.trim());
                if cleaned.is_empty() {
                    FALLBACK_QUERY.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!("interest translation failed, falling back to generic feed: {}", e);
                FALLBACK_QUERY.to_string()
            }
        }
    }
}

/// Remove any quote characters the model may have added around or inside
/// the keywords.
fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| *c != '"' && *c != '\'').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_every_quote_character() {
        assert_eq!(strip_quotes(r#""SpaceX Starship launch""#), "SpaceX Starship launch");
        assert_eq!(strip_quotes("'rust' \"tokio\" async"), "rust tokio async");
        assert_eq!(strip_quotes("no quotes here"), "no quotes here");
    }

    #[tokio::test]
    async fn missing_provider_degrades_to_generic_feed() {
        let translator = InterestTranslator::new(None);
        assert_eq!(translator.translate("formula 1 and f1 transfers").await, "latest");
    }
}
