//! Uniform JSON error responses.
//!
//! Handlers return [`ApiError`]; its response carries an [`ErrorBody`] as a
//! response extension and the `fill_error_path` layer renders the final body
//! once the request path is known.

use std::collections::BTreeMap;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::db::is_constraint_violation;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Data constraint violation")]
    Conflict,
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Unexpected error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// The 403 used by the access policy.
    #[must_use]
    pub fn access_denied() -> Self {
        Self::Forbidden("You don't have permission to access this resource".to_string())
    }

    /// A single-field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(BTreeMap::from([(field.to_string(), message.into())]))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if is_constraint_violation(&err) {
            Self::Conflict
        } else {
            Self::Internal(err)
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        collect_field_errors(&errors, "", &mut fields);
        Self::Validation(fields)
    }
}

fn collect_field_errors(
    errors: &ValidationErrors,
    prefix: &str,
    out: &mut BTreeMap<String, String>,
) {
    for (field, kind) in errors.errors() {
        let name = if prefix.is_empty() {
            (*field).to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    let message = first
                        .message
                        .as_ref()
                        .map_or_else(|| format!("invalid ({})", first.code), ToString::to_string);
                    out.entry(name).or_insert(message);
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(inner, &name, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(inner, &format!("{name}[{index}]"), out);
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge("File is too large (max 5 MB)".to_string())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

/// Wire shape shared by every error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,
}

impl ErrorBody {
    fn new(
        status: StatusCode,
        message: String,
        field_errors: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            path: String::new(),
            field_errors,
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(err) = &self {
            tracing::error!(error = ?err, "Request failed");
        }

        let field_errors = match &self {
            Self::Validation(fields) => Some(fields.clone()),
            _ => None,
        };

        ErrorBody::new(status, self.to_string(), field_errors).into_response()
    }
}

/// Error statuses produced by the router itself (405, missing upload files)
/// come without a body or content type.
fn is_bare_error(response: &Response) -> bool {
    let status = response.status();
    (status.is_client_error() || status.is_server_error())
        && !response.headers().contains_key(header::CONTENT_TYPE)
}

/// Response layer that stamps the request path into error bodies and gives
/// bare error responses the same body shape.
pub async fn fill_error_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let (mut body, headers) = match response.extensions_mut().remove::<ErrorBody>() {
        Some(body) => (body, None),
        None if is_bare_error(&response) => {
            let status = response.status();
            let message = status.canonical_reason().unwrap_or("Error").to_string();
            (ErrorBody::new(status, message, None), Some(response.headers().clone()))
        }
        None => return response,
    };

    body.path = path;
    let mut rendered = body.into_response();
    rendered.extensions_mut().remove::<ErrorBody>();
    if let Some(headers) = headers {
        // Keep headers such as `Allow` on a 405.
        for (name, value) in &headers {
            if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
                rendered.headers_mut().insert(name.clone(), value.clone());
            }
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::access_denied().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::Internal(anyhow::anyhow!("secret table name"));
        assert_eq!(err.to_string(), "Unexpected error");
    }

    #[test]
    fn test_bare_error_detection() {
        assert!(is_bare_error(&StatusCode::METHOD_NOT_ALLOWED.into_response()));
        assert!(!is_bare_error(&ApiError::not_found("x").into_response()));
        assert!(!is_bare_error(&StatusCode::NO_CONTENT.into_response()));
    }

    #[test]
    fn test_response_carries_body_extension() {
        let response = ApiError::field("value", "must be between 1 and 10").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.extensions().get::<ErrorBody>().unwrap();
        assert_eq!(body.message, "Validation failed");
        assert_eq!(
            body.field_errors.as_ref().unwrap().get("value").unwrap(),
            "must be between 1 and 10"
        );
    }
}
