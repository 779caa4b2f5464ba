use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::put;
use axum::Router;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::extract::{Path, ValidatedJson};
use super::AppState;
use crate::auth::CurrentUser;
use crate::db::{self, Role};
use crate::error::{ApiError, ApiResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/users/:username/role", put(update_role))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

async fn update_role(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(username): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> ApiResult<StatusCode> {
    let pool = state.db.pool();
    let user = db::get_user_by_username(pool, &username)
        .await?
        .ok_or_else(|| ApiError::bad_request("User not found"))?;

    let raw = req.role.as_deref().unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(ApiError::bad_request("Role is required"));
    }
    let role = Role::parse(raw).ok_or_else(|| {
        ApiError::bad_request("Unsupported role. Use USER, PUBLISHER or ADMIN")
    })?;

    db::update_user_role(pool, user.id, role).await?;
    info!(
        user_id = user.id,
        username = %user.username,
        role = %role,
        by = %admin.username,
        "User role updated"
    );
    Ok(StatusCode::NO_CONTENT)
}
