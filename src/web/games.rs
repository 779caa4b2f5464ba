use std::sync::LazyLock;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::extract::{trimmed, trimmed_opt, Path, Query, ValidatedJson};
use super::pagination::{Page, PageParams};
use super::reviews::ReviewView;
use super::AppState;
use crate::auth::CurrentUser;
use crate::db::{self, Game, GameChanges, NewGame, RatingAggregate};
use crate::error::{ApiError, ApiResult};

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid regex"));

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/games", get(list_games))
        .route("/api/games/:slug", get(game_details))
        .route("/api/games/:slug/rating", post(rate_game))
        .route("/api/publisher/games", post(create_game))
        .route(
            "/api/publisher/games/:slug",
            patch(update_game).delete(delete_game),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameListItem {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub rating_avg: f64,
    pub rating_cnt: i64,
}

impl From<Game> for GameListItem {
    fn from(game: Game) -> Self {
        Self {
            id: game.id,
            slug: game.slug,
            title: game.title,
            description: game.description,
            cover_url: game.cover_url,
            rating_avg: game.rating_avg,
            rating_cnt: game.rating_cnt,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDetails {
    #[serde(flatten)]
    pub game: GameListItem,
    pub review: Option<ReviewView>,
}

/// Load a game by slug or fail with 404.
pub(super) async fn require_game(state: &AppState, slug: &str) -> ApiResult<Game> {
    db::get_game_by_slug(state.db.pool(), slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Game not found"))
}

async fn details_of(state: &AppState, game: Game) -> ApiResult<GameDetails> {
    let review = db::get_published_review(state.db.pool(), game.id)
        .await?
        .map(ReviewView::from);
    Ok(GameDetails {
        game: game.into(),
        review,
    })
}

async fn list_games(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<GameListItem>>> {
    let pool = state.db.pool();
    let games = db::list_games(pool, params.size(), params.offset()).await?;
    let total = db::count_games(pool).await?;
    Ok(Json(Page::new(
        games.into_iter().map(GameListItem::from).collect(),
        params,
        total,
    )))
}

async fn game_details(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<GameDetails>> {
    let game = require_game(&state, &slug).await?;
    Ok(Json(details_of(&state, game).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 2, max = 80, message = "must be 2..80 characters"))]
    pub slug: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 2, max = 120, message = "must be 2..120 characters"))]
    pub title: String,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub cover_url: Option<String>,
}

async fn create_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateGameRequest>,
) -> ApiResult<(StatusCode, Json<GameDetails>)> {
    let pool = state.db.pool();
    let slug = req.slug.to_lowercase();
    if !SLUG.is_match(&slug) {
        return Err(ApiError::field(
            "slug",
            "may contain only lowercase letters, digits and dashes",
        ));
    }
    if db::slug_exists(pool, &slug).await? {
        return Err(ApiError::Conflict);
    }

    let new_game = NewGame {
        slug,
        title: req.title,
        description: req.description.unwrap_or_default(),
        cover_url: req.cover_url.unwrap_or_default(),
    };
    let id = db::create_game(pool, &new_game).await?;
    info!(game_id = id, slug = %new_game.slug, by = %user.username, "Game created");

    let game = db::get_game_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("game {id} vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(details_of(&state, game).await?)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 2, max = 120, message = "must be 2..120 characters"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub cover_url: Option<String>,
}

async fn update_game(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateGameRequest>,
) -> ApiResult<Json<GameDetails>> {
    let pool = state.db.pool();
    let game = require_game(&state, &slug).await?;

    let changes = GameChanges {
        title: req.title,
        description: req.description,
        cover_url: req.cover_url,
    };
    db::update_game(pool, game.id, &changes).await?;

    let game = require_game(&state, &slug).await?;
    Ok(Json(details_of(&state, game).await?))
}

async fn delete_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    let game = require_game(&state, &slug).await?;
    db::delete_game(state.db.pool(), game.id).await?;
    info!(game_id = game.id, slug = %game.slug, by = %user.username, "Game deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateRequest {
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub value: i64,
}

async fn rate_game(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(slug): Path<String>,
    ValidatedJson(req): ValidatedJson<RateRequest>,
) -> ApiResult<Json<RatingAggregate>> {
    let pool = state.db.pool();

    let game = db::get_game_by_slug(pool, &slug)
        .await?
        .ok_or_else(|| ApiError::bad_request("Game not found"))?;
    let user = db::get_user_by_id(pool, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("User not found"))?;

    let aggregate = db::set_rating(pool, game.id, user.id, req.value).await?;
    info!(
        game_id = game.id,
        user_id = user.id,
        value = req.value,
        rating_avg = aggregate.rating_avg,
        rating_cnt = aggregate.rating_cnt,
        "Rating recorded"
    );
    Ok(Json(aggregate))
}
