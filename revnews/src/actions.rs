//! Owner-scoped operations: chat turns, preference updates, save/unsave
//! toggles and reading history.
//!
//! Every operation takes `owner: Option<i64>`; a missing identity is a
//! precondition violation (`Unauthorized`), the one error class here that
//! propagates as a hard failure.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::error;

use crate::error::{Error, Result};
use crate::llm::Role;
use crate::pipeline::chat::ResponseGenerator;
use crate::pipeline::interest::InterestTranslator;
use crate::search::Article;
use crate::sessions;

/// Max characters of the first message used as a lazy session title
const SESSION_TITLE_LEN: usize = 50;

/// Result of one chat turn
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatReply {
    pub content: String,
    pub session_id: i64,
}

fn require_owner(owner: Option<i64>) -> Result<i64> {
    owner.ok_or(Error::Unauthorized)
}

fn session_title(content: &str) -> String {
    let head: String = content.chars().take(SESSION_TITLE_LEN).collect();
    if content.chars().count() > SESSION_TITLE_LEN {
        format!("{}...", head)
    } else {
        head
    }
}

/// Run one chat turn: resolve the session (creating it lazily on first
/// message), read recent history, generate the grounded answer, then
/// persist both turns together.
///
/// Persistence happens only after generation resolves (the generator always
/// returns, possibly with fallback text), and both messages are written in
/// one transaction so an orphaned user-only turn cannot be left behind.
pub async fn send_chat_message(
    pool: &SqlitePool,
    generator: &ResponseGenerator,
    owner: Option<i64>,
    content: &str,
    session_id: Option<i64>,
) -> Result<ChatReply> {
    let owner = require_owner(owner)?;

    let session = match session_id {
        Some(id) => {
            let session = sessions::get_session(pool, id).await?;
            if session.user_id != owner {
                return Err(Error::Unauthorized);
            }
            session
        }
        None => sessions::create_session(pool, owner, Some(&session_title(content))).await?,
    };

    let history = sessions::recent_messages(pool, session.id, 10).await?;
    let history = sessions::messages_to_turns(&history);

    let answer = generator
        .generate(content, &history, Utc::now().date_naive())
        .await;

    let mut tx = pool.begin().await?;
    insert_message(&mut tx, session.id, Role::User, content).await?;
    insert_message(&mut tx, session.id, Role::Assistant, &answer).await?;
    tx.commit().await?;

    Ok(ChatReply {
        content: answer,
        session_id: session.id,
    })
}

async fn insert_message(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: i64,
    role: Role,
    content: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_messages (session_id, role, content, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    Ok(())
}

/// Update the owner's stated interest, deriving and persisting the strict
/// search query once. Returns the derived query.
pub async fn update_preferences(
    pool: &SqlitePool,
    translator: &InterestTranslator,
    owner: Option<i64>,
    interest: &str,
) -> Result<String> {
    let owner = require_owner(owner)?;

    let search_query = translator.translate(interest).await;

    sqlx::query(
        r#"
        INSERT INTO user_preferences (user_id, stated_interest, search_query, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            stated_interest = excluded.stated_interest,
            search_query = excluded.search_query,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(owner)
    .bind(interest)
    .bind(&search_query)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(search_query)
}

/// The owner's persisted feed query, or the generic default.
pub async fn feed_query(pool: &SqlitePool, owner: Option<i64>) -> Result<String> {
    let Some(owner) = owner else {
        return Ok("latest".to_string());
    };
    let stored: Option<String> =
        sqlx::query_scalar("SELECT search_query FROM user_preferences WHERE user_id = ?")
            .bind(owner)
            .fetch_optional(pool)
            .await?;
    Ok(stored.unwrap_or_else(|| "latest".to_string()))
}

/// Toggle the saved state of an article for an owner. Returns the new
/// state: true when the article is now saved.
///
/// The flip is a delete-first check: if nothing was deleted the record did
/// not exist and is inserted (OR IGNORE), so a doubled invocation lands on
/// exactly one consistent final state instead of two records or an error.
pub async fn toggle_save_article(
    pool: &SqlitePool,
    owner: Option<i64>,
    article: &Article,
) -> Result<bool> {
    let owner = require_owner(owner)?;

    let deleted = sqlx::query("DELETE FROM saved_articles WHERE user_id = ? AND article_url = ?")
        .bind(owner)
        .bind(&article.url)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted > 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO saved_articles
            (user_id, article_url, title, source, description, thumbnail, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(owner)
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.source)
    .bind(&article.description)
    .bind(&article.thumbnail)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(true)
}

/// Whether an article is currently saved by the owner.
pub async fn is_saved(pool: &SqlitePool, owner: i64, url: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM saved_articles WHERE user_id = ? AND article_url = ?",
    )
    .bind(owner)
    .bind(url)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Record an article view in the owner's reading history. Best-effort: a
/// missing owner is a silent no-op and store failures are logged, never
/// surfaced (history must not break article viewing).
pub async fn add_to_history(pool: &SqlitePool, owner: Option<i64>, article: &Article) {
    let Some(owner) = owner else {
        return;
    };

    let result = sqlx::query(
        r#"
        INSERT INTO history (user_id, article_url, title, source, viewed_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(owner)
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.source)
    .bind(Utc::now())
    .execute(pool)
    .await;

    if let Err(e) = result {
        error!("failed to add to history: {}", e);
    }
}
