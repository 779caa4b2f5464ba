use axum::extract::State;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::extract::{trimmed, Path, ValidatedJson};
use super::AppState;
use crate::auth::CurrentUser;
use crate::db::{self, ReviewStatus, ReviewWithPublisher};
use crate::error::{ApiError, ApiResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/publisher/games/:slug/review",
            get(get_review).put(upsert_review),
        )
        .route("/api/publisher/games/:slug/review/publish", patch(publish))
        .route("/api/publisher/games/:slug/review/draft", patch(draft))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub title: String,
    pub content: String,
    pub status: ReviewStatus,
    pub publisher_username: String,
    pub updated_at: String,
}

impl From<ReviewWithPublisher> for ReviewView {
    fn from(review: ReviewWithPublisher) -> Self {
        Self {
            status: review.status_enum(),
            title: review.title,
            content: review.content,
            publisher_username: review.publisher_username,
            updated_at: review.updated_at,
        }
    }
}

/// Any review of the game, drafts included. Unknown games have none.
async fn get_review(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Option<ReviewView>>> {
    let pool = state.db.pool();
    let Some(game) = db::get_game_by_slug(pool, &slug).await? else {
        return Ok(Json(None));
    };
    let review = db::get_review_by_game(pool, game.id).await?;
    Ok(Json(review.map(ReviewView::from)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertReviewRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 160, message = "must be 1..160 characters"))]
    pub title: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 20000, message = "must be 1..20000 characters"))]
    pub content: String,
}

async fn upsert_review(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(slug): Path<String>,
    ValidatedJson(req): ValidatedJson<UpsertReviewRequest>,
) -> ApiResult<Json<ReviewView>> {
    let pool = state.db.pool();
    let game = db::get_game_by_slug(pool, &slug)
        .await?
        .ok_or_else(|| ApiError::bad_request("Game not found"))?;
    let publisher = db::get_user_by_id(pool, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("User not found"))?;

    let review = db::upsert_review(pool, game.id, publisher.id, &req.title, &req.content).await?;
    info!(game_id = game.id, publisher = %publisher.username, "Review saved");
    Ok(Json(review.into()))
}

async fn set_status(state: &AppState, slug: &str, status: ReviewStatus) -> ApiResult<ReviewView> {
    let pool = state.db.pool();
    let game = db::get_game_by_slug(pool, slug)
        .await?
        .ok_or_else(|| ApiError::bad_request("Review not found"))?;
    let review = db::set_review_status(pool, game.id, status)
        .await?
        .ok_or_else(|| ApiError::bad_request("Review not found"))?;
    info!(game_id = game.id, status = status.as_str(), "Review status changed");
    Ok(review.into())
}

async fn publish(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ReviewView>> {
    Ok(Json(set_status(&state, &slug, ReviewStatus::Published).await?))
}

async fn draft(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ReviewView>> {
    Ok(Json(set_status(&state, &slug, ReviewStatus::Draft).await?))
}
