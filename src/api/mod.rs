// HTTP API routes (story continuation, story CRUD, likes, accounts).

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRef, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{self, JwtKeys, Session};
use crate::continuation::{
    string_or_number, ContinuationRequest, ContinuationResponse, ContinuationService,
    MISSING_FIELDS,
};
use crate::db::{Database, LikeOutcome, NewStory, Story};
use crate::error::AppError;
use crate::listing;
use crate::metrics;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStoryRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub duration: Option<String>,
    pub description: Option<String>,
    pub story: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeRequest {
    /// The like count the caller last saw; the stored counter wins.
    pub current_like_count: Option<i64>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct TrendingParams {
    pub limit: Option<usize>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub continuation: ContinuationService,
    pub jwt: JwtKeys,
    pub trending_limit: usize,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/profile", put(auth::update_profile))
        // Continuation
        .route("/api/generateStory", post(generate_story))
        // Stories
        .route("/api/stories", get(list_stories).post(publish_story))
        .route("/api/stories/trending", get(trending_stories))
        .route("/api/stories/mine", get(my_stories))
        .route("/api/stories/{id}", get(get_story).delete(delete_story))
        .route("/api/stories/{id}/like", post(toggle_like))
        .layer(axum::middleware::from_fn(metrics::track_requests))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "storyhub-backend" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Continuation ──────────────────────────────────────────────────────

async fn generate_story(
    State(state): State<AppState>,
    payload: Result<Json<ContinuationRequest>, JsonRejection>,
) -> Result<Json<ContinuationResponse>, AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!("Rejected continuation body: {e}");
        AppError::Validation(MISSING_FIELDS.to_string())
    })?;
    state.continuation.continue_story(req).await.map(Json)
}

// ── Story handlers ────────────────────────────────────────────────────

async fn list_stories(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Story>>, AppError> {
    let stories = state.db.list_stories().await?;
    let term = params.search.unwrap_or_default();
    Ok(Json(listing::filter_stories(stories, term.trim())))
}

async fn trending_stories(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<Vec<Story>>, AppError> {
    let limit = params.limit.unwrap_or(state.trending_limit);
    let stories = state.db.list_stories().await?;
    Ok(Json(listing::trending(stories, limit)))
}

async fn my_stories(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<Story>>, AppError> {
    let stories = state.db.list_stories_by_creator(session.user_id).await?;
    Ok(Json(stories))
}

fn required(field: Option<String>) -> Result<String, AppError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(
            "Please complete all fields before publishing.".into(),
        )),
    }
}

async fn publish_story(
    session: Session,
    State(state): State<AppState>,
    payload: Result<Json<PublishStoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let new = NewStory {
        title: req
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        author: required(req.author)?,
        genre: required(req.genre)?,
        duration: required(req.duration)?,
        description: required(req.description)?,
        story: required(req.story)?,
        creator_id: session.user_id,
    };

    let story = state.db.create_story(&new).await?;
    metrics::STORIES_PUBLISHED_TOTAL.inc();
    tracing::info!(story_id = story.id, user_id = session.user_id, "story published");
    Ok((StatusCode::CREATED, Json(story)))
}

async fn get_story(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Story>, AppError> {
    state
        .db
        .get_story(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Story"))
}

async fn delete_story(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let story = state
        .db
        .get_story(id)
        .await?
        .ok_or(AppError::NotFound("Story"))?;
    if story.creator_id != Some(session.user_id) {
        return Err(AppError::Forbidden("You do not own this story".into()));
    }

    if state.db.delete_story(id).await? {
        tracing::info!(story_id = id, "story deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Story"))
    }
}

// ── Likes ─────────────────────────────────────────────────────────────

async fn toggle_like(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<LikeOutcome>, AppError> {
    let req: ToggleLikeRequest = if body.is_empty() {
        ToggleLikeRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?
    };

    let outcome = state.db.toggle_like(id, session.user_id).await?;

    let direction = if outcome.liked { "like" } else { "unlike" };
    metrics::LIKE_TOGGLES_TOTAL
        .with_label_values(&[direction])
        .inc();

    if let Some(seen) = req.current_like_count {
        let before = if outcome.liked {
            outcome.likes - 1
        } else {
            outcome.likes + 1
        };
        if seen != before {
            tracing::debug!(
                story_id = id,
                seen,
                stored = before,
                "caller like count was stale"
            );
        }
    }

    Ok(Json(outcome))
}
