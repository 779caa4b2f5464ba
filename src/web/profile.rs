use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidateEmail};

use super::extract::ValidatedJson;
use super::uploads::{read_file_field, store_image, UploadKind, UPLOAD_BODY_LIMIT};
use super::AppState;
use crate::auth::{
    hash_password, validate_password_strength, verify_password, CurrentUser, Identity,
};
use crate::db::{self, ProfileChanges, SettingsChanges, User, UserProfile};
use crate::error::{ApiError, ApiResult};

const MAX_BIO_LENGTH: usize = 1200;
const MAX_CITY_LENGTH: usize = 80;
const MAX_FAVORITE_GAMES: usize = 12;
const MAX_FAVORITE_GAME_LENGTH: usize = 60;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me/profile", get(get_profile).put(update_profile))
        .route("/api/me/settings", put(update_settings))
        .route(
            "/api/me/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub role: String,
    pub avatar_url: String,
    pub bio: String,
    pub city: String,
    pub favorite_games: Vec<String>,
    pub email_notifications: bool,
    pub public_profile: bool,
    pub member_since: String,
    pub topics_created: i64,
    pub comments_created: i64,
}

async fn current_user(state: &AppState, identity: &Identity) -> ApiResult<User> {
    db::get_user_by_id(state.db.pool(), identity.user_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("User not found"))
}

async fn view_of(state: &AppState, user: User, profile: UserProfile) -> ApiResult<ProfileView> {
    let pool = state.db.pool();
    let topics_created = db::count_topics_by_author(pool, &user.username).await?;
    let comments_created = db::count_messages_by_author(pool, &user.username).await?;

    Ok(ProfileView {
        role: user.role_enum().to_string(),
        favorite_games: profile.favorite_game_list(),
        username: user.username,
        email: user.email,
        avatar_url: profile.avatar_url,
        bio: profile.bio,
        city: profile.city,
        email_notifications: profile.email_notifications,
        public_profile: profile.public_profile,
        member_since: user.created_at,
        topics_created,
        comments_created,
    })
}

async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<ProfileView>> {
    let user = current_user(&state, &identity).await?;
    let profile = db::get_user_profile(state.db.pool(), user.id)
        .await?
        .unwrap_or_else(|| UserProfile::defaults(user.id));
    Ok(Json(view_of(&state, user, profile).await?))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
    pub city: Option<String>,
    pub favorite_games: Option<Vec<String>>,
}

fn bounded_text(value: Option<&str>, max: usize, message: &str) -> ApiResult<String> {
    let value = value.unwrap_or_default().trim();
    if value.chars().count() > max {
        return Err(ApiError::bad_request(message));
    }
    Ok(value.to_string())
}

/// Trim, drop blanks, cut each title to its maximum length and de-duplicate.
fn favorite_games(raw: Option<&[String]>) -> ApiResult<Vec<String>> {
    let mut games: Vec<String> = Vec::new();
    for title in raw.unwrap_or_default() {
        let title = title.trim();
        if title.is_empty() {
            continue;
        }
        let title: String = title.chars().take(MAX_FAVORITE_GAME_LENGTH).collect();
        if !games.contains(&title) {
            games.push(title);
        }
    }
    if games.len() > MAX_FAVORITE_GAMES {
        return Err(ApiError::bad_request(
            "At most 12 favorite games can be listed",
        ));
    }
    Ok(games)
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileView>> {
    let changes = ProfileChanges {
        bio: bounded_text(
            req.bio.as_deref(),
            MAX_BIO_LENGTH,
            "Bio must not exceed 1200 characters",
        )?,
        city: bounded_text(
            req.city.as_deref(),
            MAX_CITY_LENGTH,
            "City must not exceed 80 characters",
        )?,
        favorite_games: favorite_games(req.favorite_games.as_deref())?,
    };

    let user = current_user(&state, &identity).await?;
    let profile = db::update_user_profile(state.db.pool(), user.id, &changes).await?;
    Ok(Json(view_of(&state, user, profile).await?))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSettingsRequest {
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub email_notifications: Option<bool>,
    pub public_profile: Option<bool>,
}

async fn new_email(state: &AppState, user: &User, raw: Option<&str>) -> ApiResult<Option<String>> {
    let email = raw.unwrap_or_default().trim().to_lowercase();
    if email.is_empty() || email == user.email {
        return Ok(None);
    }
    if !email.validate_email() {
        return Err(ApiError::bad_request("Enter a valid email"));
    }
    if db::email_exists(state.db.pool(), &email).await? {
        return Err(ApiError::bad_request("This email is already in use"));
    }
    Ok(Some(email))
}

fn new_password_hash(
    user: &User,
    current: Option<&str>,
    new: Option<&str>,
) -> ApiResult<Option<String>> {
    let new = new.unwrap_or_default();
    if new.trim().is_empty() {
        return Ok(None);
    }

    let current = current.unwrap_or_default();
    if current.trim().is_empty() {
        return Err(ApiError::bad_request("Enter your current password"));
    }
    if !verify_password(current, &user.password_hash)? {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    validate_password_strength(new)
        .map_err(|_| ApiError::bad_request("New password must be at least 8 characters"))?;

    Ok(Some(hash_password(new)?))
}

async fn update_settings(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> ApiResult<Json<ProfileView>> {
    let user = current_user(&state, &identity).await?;

    let changes = SettingsChanges {
        email: new_email(&state, &user, req.email.as_deref()).await?,
        password_hash: new_password_hash(
            &user,
            req.current_password.as_deref(),
            req.new_password.as_deref(),
        )?,
        email_notifications: req.email_notifications,
        public_profile: req.public_profile,
    };

    let pool = state.db.pool();
    let profile = db::update_account_settings(pool, user.id, &changes).await?;
    if changes.email.is_some() || changes.password_hash.is_some() {
        info!(user_id = user.id, "Account credentials updated");
    }

    let user = current_user(&state, &identity).await?;
    Ok(Json(view_of(&state, user, profile).await?))
}

async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProfileView>> {
    let mut multipart = multipart?;
    let file = read_file_field(&mut multipart, "avatar").await?;
    let user = current_user(&state, &identity).await?;

    let url = store_image(&state.config.uploads_dir, UploadKind::Profile, &file).await?;
    let profile = db::update_avatar_url(state.db.pool(), user.id, &url).await?;
    Ok(Json(view_of(&state, user, profile).await?))
}
