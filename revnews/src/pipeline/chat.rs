//! Grounded answer generation: the two-stage turn pipeline.
//!
//! Each turn runs the completion capability twice: once to decide whether
//! and what to search (keyword stage), once to produce the grounded answer.
//! The stages are an explicit state machine so each one carries its own
//! failure handling; the pipeline always returns a response string, never
//! an unhandled fault.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::llm::{ChatTurn, CompletionProvider, CompletionRequest};
use crate::pipeline::context::{assemble_news_context, truncate_history, EMPTY_CONTEXT_MARKER};
use crate::pipeline::keywords::{KeywordDecision, KeywordExtractor};
use crate::search::{NewsSearch, SearchQuery};

/// Returned when no completion credential is configured
pub const UNAVAILABLE_REPLY: &str =
    "The news assistant is unavailable right now (no completion capability configured).";

/// Returned when any stage of the turn fails
pub const FALLBACK_REPLY: &str =
    "I encountered an error searching for live news. Please try again.";

/// Returned when the model produced an empty answer
const EMPTY_ANSWER_REPLY: &str = "I'm sorry, I couldn't process that news request.";

/// Articles fetched per grounded turn
const TURN_ARTICLE_COUNT: u32 = 8;

/// Progression of one chat turn through the pipeline
enum TurnStage {
    AwaitingKeywords,
    AwaitingAnswer { context: String },
    Done(String),
}

pub struct ResponseGenerator {
    completion: Option<Arc<dyn CompletionProvider>>,
    search: Arc<dyn NewsSearch>,
    extractor: KeywordExtractor,
}

impl ResponseGenerator {
    pub fn new(
        completion: Option<Arc<dyn CompletionProvider>>,
        search: Arc<dyn NewsSearch>,
    ) -> Self {
        let extractor = KeywordExtractor::new(completion.clone());
        Self {
            completion,
            search,
            extractor,
        }
    }

    /// Produce a grounded answer for one user turn.
    ///
    /// Never fails: a missing credential short-circuits to a fixed
    /// unavailable string, and any error inside the two-stage sequence is
    /// converted into the fixed apologetic fallback.
    pub async fn generate(
        &self,
        turn_text: &str,
        history: &[ChatTurn],
        as_of: NaiveDate,
    ) -> String {
        let Some(provider) = &self.completion else {
            return UNAVAILABLE_REPLY.to_string();
        };

        match self.run_turn(provider.as_ref(), turn_text, history, as_of).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("chat turn failed, returning fallback reply: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn run_turn(
        &self,
        provider: &dyn CompletionProvider,
        turn_text: &str,
        history: &[ChatTurn],
        as_of: NaiveDate,
    ) -> Result<String> {
        let mut stage = TurnStage::AwaitingKeywords;

        loop {
            stage = match stage {
                TurnStage::AwaitingKeywords => {
                    let context = match self.extractor.extract(turn_text, as_of).await {
                        KeywordDecision::Search(terms) => {
                            info!(terms = %terms, "turn needs live search");
                            let query = SearchQuery::new(terms).with_count(TURN_ARTICLE_COUNT);
                            let articles = self.search.search(&query).await?;
                            assemble_news_context(&articles)
                        }
                        KeywordDecision::NoSearch => EMPTY_CONTEXT_MARKER.to_string(),
                    };
                    TurnStage::AwaitingAnswer { context }
                }

                TurnStage::AwaitingAnswer { context } => {
                    let system = grounded_system_prompt(&context, as_of);

                    let mut messages = Vec::with_capacity(HISTORY_CAPACITY);
                    messages.push(ChatTurn::system(system));
                    messages.extend_from_slice(truncate_history(history));
                    messages.push(ChatTurn::user(turn_text));

                    let response = provider.complete(CompletionRequest::new(messages)).await?;
                    let answer = if response.content.trim().is_empty() {
                        EMPTY_ANSWER_REPLY.to_string()
                    } else {
                        response.content
                    };
                    TurnStage::Done(answer)
                }

                TurnStage::Done(answer) => return Ok(answer),
            };
        }
    }
}

const HISTORY_CAPACITY: usize = 7; // system + 5 history turns + user

/// System prompt for the answer stage: pins "today", forbids claiming a
/// knowledge cutoff, and mandates exclusive reliance on the supplied context
/// for time-sensitive claims.
fn grounded_system_prompt(context: &str, as_of: NaiveDate) -> String {
    format!(
        "You are RevNews AI, a real-time news assistant. Today's date is {as_of}.\n\
         \n\
         CRITICAL INSTRUCTION: You have access to real-time search results provided \
         below. NEVER say you have a knowledge cutoff. Use the provided NEWS CONTEXT \
         to answer. If the context is empty, explain that no recent news was found \
         for that specific topic today.\n\
         \n\
         NEWS CONTEXT FOR {as_of}:\n\
         {context}"
    )
}
