use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::db::Role;
use crate::error::ApiError;

use super::token::{Claims, TokenService};

/// Verified caller identity attached to the request by [`authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn from_claims(claims: Claims) -> Option<Self> {
        Some(Self {
            user_id: claims.sub.parse().ok()?,
            role: Role::parse(&claims.role)?,
            username: claims.username,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Attach an [`Identity`] when the request carries a valid bearer token.
///
/// Never rejects: a missing or unverifiable token leaves the request
/// anonymous and the access policy decides what anonymous callers may do.
pub async fn authenticate(
    State(tokens): State<TokenService>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    parts.extensions.remove::<Identity>();

    if let Some(token) = bearer_token(&parts) {
        match tokens.verify(token) {
            Ok(claims) => match Identity::from_claims(claims) {
                Some(identity) => {
                    parts.extensions.insert(identity);
                }
                None => debug!("Token claims do not describe a user, continuing anonymously"),
            },
            Err(e) => debug!(error = %e, "Bearer token rejected, continuing anonymously"),
        }
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Caller identity, if any.
/// Use this extractor when authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}

/// Caller identity (required).
/// Returns 401 if the request is anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeIdentity(identity) = MaybeIdentity::from_request_parts(parts, state).await?;
        identity.map(Self).ok_or(ApiError::Unauthorized)
    }
}
