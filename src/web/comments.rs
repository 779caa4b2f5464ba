use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::extract::{trimmed, Path, Query, ValidatedJson};
use super::games::require_game;
use super::pagination::{Page, PageParams};
use super::AppState;
use crate::auth::CurrentUser;
use crate::db::{self, CommentWithAuthor};
use crate::error::{ApiError, ApiResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/games/:slug/comments",
            get(list_comments).post(create_comment),
        )
        .route("/api/games/:slug/comments/:id", delete(delete_comment))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub username: String,
    pub content: String,
    pub created_at: String,
}

impl From<CommentWithAuthor> for CommentView {
    fn from(comment: CommentWithAuthor) -> Self {
        Self {
            id: comment.id,
            username: comment.username,
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<CommentView>>> {
    let game = require_game(&state, &slug).await?;
    let pool = state.db.pool();
    let comments = db::list_comments(pool, game.id, params.size(), params.offset()).await?;
    let total = db::count_comments(pool, game.id).await?;
    Ok(Json(Page::new(
        comments.into_iter().map(CommentView::from).collect(),
        params,
        total,
    )))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 1000, message = "must be 1..1000 characters"))]
    pub content: String,
}

async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(slug): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    let pool = state.db.pool();
    let game = db::get_game_by_slug(pool, &slug)
        .await?
        .ok_or_else(|| ApiError::bad_request("Game not found"))?;
    let user = db::get_user_by_id(pool, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("User not found"))?;

    let comment = db::create_comment(pool, game.id, user.id, &req.content).await?;
    info!(comment_id = comment.id, game_id = game.id, user_id = user.id, "Comment posted");
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// Soft-delete a comment. Only its author or an admin may do so.
async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path((slug, id)): Path<(String, i64)>,
) -> ApiResult<StatusCode> {
    let game = require_game(&state, &slug).await?;
    let pool = state.db.pool();

    let comment = db::get_comment(pool, id)
        .await?
        .filter(|c| c.game_id == game.id && !c.is_deleted)
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if comment.user_id != identity.user_id && !identity.is_admin() {
        return Err(ApiError::forbidden("You can delete only your own comments"));
    }

    db::soft_delete_comment(pool, comment.id).await?;
    info!(comment_id = comment.id, by = %identity.username, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
