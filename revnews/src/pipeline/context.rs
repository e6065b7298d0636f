//! Context assembly: format retrieved articles and recent history into a
//! bounded prompt context.

use crate::llm::ChatTurn;
use crate::search::Article;

/// Marker used instead of an empty string so the generation stage can tell
/// "nothing relevant was found" apart from "context omitted".
pub const EMPTY_CONTEXT_MARKER: &str = "No recent articles found.";

/// Most recent turns kept when interleaving history into the prompt.
/// Bounding prompt growth is an invariant here, not a transport accident.
pub const HISTORY_WINDOW: usize = 5;

/// Format retrieved articles as the grounding context block, one line per
/// article, blank-line separated.
pub fn assemble_news_context(articles: &[Article]) -> String {
    if articles.is_empty() {
        return EMPTY_CONTEXT_MARKER.to_string();
    }

    let mut lines = Vec::with_capacity(articles.len());
    for article in articles {
        let date = article.age.as_deref().unwrap_or("unknown");
        let description = article.description.as_deref().unwrap_or("");
        lines.push(format!(
            "[SOURCE: {} | DATE: {}] {}: {}",
            article.source, date, article.title, description
        ));
    }
    lines.join("\n\n")
}

/// Truncate conversation history to the most recent window.
pub fn truncate_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn article(source: &str, title: &str, description: Option<&str>) -> Article {
        Article {
            url: format!("https://example.com/{}", title),
            title: title.to_string(),
            source: source.to_string(),
            age: Some("2 hours ago".to_string()),
            description: description.map(|d| d.to_string()),
            thumbnail: None,
        }
    }

    #[test]
    fn empty_retrieval_becomes_explicit_marker() {
        assert_eq!(assemble_news_context(&[]), EMPTY_CONTEXT_MARKER);
    }

    #[test]
    fn articles_render_one_line_each() {
        let ctx = assemble_news_context(&[
            article("Reuters", "Rates held", Some("The central bank held rates.")),
            article("AP", "Storm lands", None),
        ]);
        let blocks: Vec<&str> = ctx.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0],
            "[SOURCE: Reuters | DATE: 2 hours ago] Rates held: The central bank held rates."
        );
        assert_eq!(blocks[1], "[SOURCE: AP | DATE: 2 hours ago] Storm lands: ");
    }

    #[test]
    fn history_truncates_to_most_recent_window() {
        let history: Vec<ChatTurn> = (0..8)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("turn {}", i),
            })
            .collect();

        let window = truncate_history(&history);
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].content, "turn 3");
        assert_eq!(window[4].content, "turn 7");

        let short: Vec<ChatTurn> = history[..2].to_vec();
        assert_eq!(truncate_history(&short).len(), 2);
    }
}
