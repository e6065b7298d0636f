//! HTTP surface consumed by the UI layer.
//!
//! Authentication is an external collaborator: the routes trust the
//! `X-User-Id` header installed upstream and map its absence to 401.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{get, post, routes, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use common::Config;

use crate::actions::{self, ChatReply};
use crate::error::Error;
use crate::pipeline::chat::ResponseGenerator;
use crate::pipeline::interest::InterestTranslator;
use crate::pipeline::spectrum::{ArticleAnalysis, SpectrumAnalyzer};
use crate::search::{self, Article, Freshness, NewsSearch, SearchQuery};

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub db: SqlitePool,
    pub search: Arc<dyn NewsSearch>,
    pub generator: ResponseGenerator,
    pub translator: InterestTranslator,
    pub analyzer: SpectrumAnalyzer,
}

/// Owner identity extracted from the `X-User-Id` header set by the
/// upstream auth layer.
pub struct OwnerId(pub i64);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OwnerId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req
            .headers()
            .get_one("X-User-Id")
            .and_then(|v| v.parse::<i64>().ok())
        {
            Some(id) => Outcome::Success(OwnerId(id)),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

fn error_status(e: &Error) -> Status {
    match e {
        Error::Unauthorized => Status::Unauthorized,
        Error::UpstreamUnavailable { .. } => Status::BadGateway,
        Error::CredentialMissing => Status::ServiceUnavailable,
        Error::MalformedModelOutput(_) => Status::BadGateway,
        Error::Database(_) => Status::InternalServerError,
    }
}

fn log_and_status(e: Error) -> Status {
    error!("request failed: {}", e);
    error_status(&e)
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
}

#[derive(Serialize)]
struct NewsResponse {
    results: Vec<Article>,
}

#[derive(Deserialize)]
struct ChatRequest {
    content: String,
    session_id: Option<i64>,
}

#[derive(Deserialize)]
struct PreferencesRequest {
    interest: String,
}

#[derive(Serialize)]
struct PreferencesResponse {
    search_query: String,
}

#[derive(Serialize)]
struct SaveResponse {
    saved: bool,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
    /// Title of the article under analysis; used to look up the comparison
    /// cluster when `related` is not supplied.
    #[serde(default)]
    title: Option<String>,
    /// URL of the article under analysis; excluded from the cluster.
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    related: Vec<Article>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    analysis: ArticleAnalysis,
    spectrum: String,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
    })
}

/// Feed read endpoint. Without `q` it falls back to the owner's persisted
/// personalization query (or the generic default for anonymous loads).
/// An empty or short result list is the sole exhaustion signal.
///
/// This is the one place a retrieval failure propagates, so the caller can
/// render an error/empty state instead of silently degraded content.
#[get("/api/v1/news?<q>&<offset>&<count>")]
async fn news(
    state: &State<AppState>,
    owner: Option<OwnerId>,
    q: Option<String>,
    offset: Option<u32>,
    count: Option<u32>,
) -> Result<Json<NewsResponse>, Status> {
    let query_text = match q {
        Some(q) if !q.trim().is_empty() => q,
        _ => actions::feed_query(&state.db, owner.map(|o| o.0))
            .await
            .map_err(log_and_status)?,
    };

    let default_count = state.config.search.default_count.unwrap_or(20);
    let freshness = state
        .config
        .search
        .freshness
        .as_deref()
        .and_then(|f| f.parse().ok())
        .unwrap_or(Freshness::Day);

    let query = SearchQuery {
        text: query_text,
        freshness,
        count: count.unwrap_or(default_count),
        offset: offset.unwrap_or(0),
    };

    let results = state.search.search(&query).await.map_err(log_and_status)?;
    Ok(Json(NewsResponse { results }))
}

/// One chat turn. Always answers: pipeline failures surface as fallback
/// text in the reply, not as HTTP errors.
#[post("/api/v1/chat", data = "<body>")]
async fn chat(
    state: &State<AppState>,
    owner: OwnerId,
    body: Json<ChatRequest>,
) -> Result<Json<ChatReply>, Status> {
    let reply = actions::send_chat_message(
        &state.db,
        &state.generator,
        Some(owner.0),
        &body.content,
        body.session_id,
    )
    .await
    .map_err(log_and_status)?;
    Ok(Json(reply))
}

#[post("/api/v1/preferences", data = "<body>")]
async fn preferences(
    state: &State<AppState>,
    owner: OwnerId,
    body: Json<PreferencesRequest>,
) -> Result<Json<PreferencesResponse>, Status> {
    let search_query =
        actions::update_preferences(&state.db, &state.translator, Some(owner.0), &body.interest)
            .await
            .map_err(log_and_status)?;
    Ok(Json(PreferencesResponse { search_query }))
}

#[post("/api/v1/articles/save", data = "<body>")]
async fn save_article(
    state: &State<AppState>,
    owner: OwnerId,
    body: Json<Article>,
) -> Result<Json<SaveResponse>, Status> {
    let article = body.into_inner();
    let saved = actions::toggle_save_article(&state.db, Some(owner.0), &article)
        .await
        .map_err(log_and_status)?;
    Ok(Json(SaveResponse { saved }))
}

#[post("/api/v1/articles/history", data = "<body>")]
async fn record_history(
    state: &State<AppState>,
    owner: OwnerId,
    body: Json<Article>,
) -> Status {
    let article = body.into_inner();
    actions::add_to_history(&state.db, Some(owner.0), &article).await;
    Status::NoContent
}

/// Article-view analysis. The comparison cluster is retrieved server-side
/// from the article title when the caller does not supply one; a failed
/// lookup degrades to the no-sources marker rather than failing the
/// request. The bias summary and the spectrum comparison are independent,
/// so both branches run concurrently; each carries its own fallback and
/// tolerates the other failing.
#[post("/api/v1/articles/analyze", data = "<body>")]
async fn analyze_article(
    state: &State<AppState>,
    body: Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let body = body.into_inner();

    let related = if body.related.is_empty() {
        match body.title.as_deref() {
            Some(title) => {
                let exclude = body.url.as_deref().unwrap_or("");
                match search::find_related(state.search.as_ref(), title, exclude).await {
                    Ok(articles) => articles,
                    Err(e) => {
                        warn!("related-news lookup failed: {}", e);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        }
    } else {
        body.related
    };

    let (analysis, spectrum) = tokio::join!(
        state.analyzer.summarize_and_rate(&body.text),
        state.analyzer.analyze(&related),
    );
    Json(AnalyzeResponse { analysis, spectrum })
}

/// Create the core schema if missing. The persistence layer is treated as
/// a simple key-value session/message/article store; anything richer lives
/// with the owning collaborator.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES chat_sessions(id),
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_preferences (
            user_id INTEGER PRIMARY KEY,
            stated_interest TEXT NOT NULL,
            search_query TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS saved_articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            article_url TEXT NOT NULL,
            title TEXT NOT NULL,
            source TEXT,
            description TEXT,
            thumbnail TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, article_url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            article_url TEXT NOT NULL,
            title TEXT NOT NULL,
            source TEXT,
            viewed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Launch the Rocket server (blocks until Rocket shuts down).
pub async fn launch_rocket(state: AppState) -> anyhow::Result<()> {
    info!("mounting API routes");
    rocket::build()
        .manage(state)
        .mount(
            "/",
            routes![
                health,
                status,
                news,
                chat,
                preferences,
                save_article,
                record_history,
                analyze_article,
            ],
        )
        .launch()
        .await?;
    Ok(())
}
