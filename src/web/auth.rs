use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use super::extract::{trimmed, Query, ValidatedJson};
use super::AppState;
use crate::auth::{hash_password, verify_password, MaybeIdentity};
use crate::db::{self, Role, User};
use crate::error::{ApiError, ApiResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/check-username", get(check_username))
        .route("/api/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, max = 50, message = "must be 3..50 characters"))]
    pub username: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(
        email(message = "must be a valid email"),
        length(max = 120, message = "must be at most 120 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "must be 8..100 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "must not be blank"))]
    pub login: String,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<Json<AuthResponse>> {
    let token = state
        .tokens
        .issue(user.id, &user.username, user.role_enum())
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(AuthResponse { token }))
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let pool = state.db.pool();
    let username = req.username.as_str();
    let email = req.email.to_lowercase();

    if db::username_exists(pool, username).await? {
        return Err(ApiError::bad_request("Username already taken"));
    }
    if db::email_exists(pool, &email).await? {
        return Err(ApiError::bad_request("Email already taken"));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = db::create_user(pool, username, &email, &password_hash, Role::User).await?;
    let user = db::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user {user_id} vanished after insert")))?;

    info!(user_id, username = %user.username, "User registered");
    issue_token(&state, &user)
}

async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let pool = state.db.pool();
    let login = req.login.as_str();

    let user = match db::get_user_by_username(pool, login).await? {
        Some(user) => Some(user),
        None => db::get_user_by_email(pool, &login.to_lowercase()).await?,
    };
    let Some(user) = user else {
        return Err(ApiError::bad_request("Invalid credentials"));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::bad_request("Invalid credentials"));
    }

    issue_token(&state, &user)
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameParams {
    username: Option<String>,
}

async fn check_username(
    State(state): State<AppState>,
    Query(params): Query<CheckUsernameParams>,
) -> ApiResult<Json<Value>> {
    let username = params.username.as_deref().unwrap_or_default().trim();
    let available =
        username.chars().count() >= 3 && !db::username_exists(state.db.pool(), username).await?;
    Ok(Json(json!({ "available": available })))
}

async fn me(MaybeIdentity(identity): MaybeIdentity) -> Json<Value> {
    match identity {
        Some(identity) => Json(json!({
            "authenticated": true,
            "username": identity.username,
            "role": identity.role,
        })),
        None => Json(json!({ "authenticated": false })),
    }
}
