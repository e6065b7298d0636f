//! Append-only conversation store: chat sessions and their ordered turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::llm::{ChatTurn, Role};

/// One conversation owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// One message in a conversation. Ordered, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: String, // "user" or "assistant"
    pub content: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    title: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    session_id: i64,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> ChatSession {
        ChatSession {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

impl MessageRow {
    fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            session_id: self.session_id,
            role: self.role,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Create a new chat session
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    title: Option<&str>,
) -> Result<ChatSession> {
    let result = sqlx::query(
        r#"
        INSERT INTO chat_sessions (user_id, title, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(title)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_session(pool, result.last_insert_rowid()).await
}

/// Get a single session by ID
pub async fn get_session(pool: &SqlitePool, session_id: i64) -> Result<ChatSession> {
    let row = sqlx::query_as::<_, SessionRow>(
        r#"
        SELECT id, user_id, title, created_at
        FROM chat_sessions
        WHERE id = ?
        "#,
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(row.into_session())
}

/// List all sessions for a user, most recent first
pub async fn list_sessions(pool: &SqlitePool, user_id: i64) -> Result<Vec<ChatSession>> {
    let rows = sqlx::query_as::<_, SessionRow>(
        r#"
        SELECT id, user_id, title, created_at
        FROM chat_sessions
        WHERE user_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SessionRow::into_session).collect())
}

/// Append one message to a session. Returns the message id.
pub async fn store_message(
    pool: &SqlitePool,
    session_id: i64,
    role: Role,
    content: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO chat_messages (session_id, role, content, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Read the most recent `limit` messages of a session, in creation order.
pub async fn recent_messages(
    pool: &SqlitePool,
    session_id: i64,
    limit: u32,
) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, session_id, role, content, created_at
        FROM chat_messages
        WHERE session_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut messages: Vec<ChatMessage> = rows.into_iter().map(MessageRow::into_message).collect();
    messages.reverse();
    Ok(messages)
}

/// Convert stored messages into completion turns, skipping anything with an
/// unknown role.
pub fn messages_to_turns(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    messages
        .iter()
        .filter_map(|m| {
            m.role.parse::<Role>().ok().map(|role| ChatTurn {
                role,
                content: m.content.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_are_skipped_in_turn_conversion() {
        let base = ChatMessage {
            id: 1,
            session_id: 1,
            role: "user".to_string(),
            content: "hi".to_string(),
            created_at: Utc::now(),
        };
        let odd = ChatMessage {
            role: "tool".to_string(),
            ..base.clone()
        };

        let turns = messages_to_turns(&[base, odd]);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }
}
