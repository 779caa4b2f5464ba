//! Route access policy.
//!
//! One ordered table decides who may call every route. The first rule whose
//! method and path pattern match wins. Unmatched `/api/**` paths require an
//! authenticated caller; anything outside `/api` is public.
//!
//! Patterns are `/`-separated: `*` matches exactly one non-empty segment and
//! a trailing `**` matches the remaining segments, including none.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::db::Role;
use crate::error::ApiError;

use super::middleware::Identity;

const ANY_ROLE: &[Role] = &[Role::User, Role::Publisher, Role::Admin];
const PUBLISHERS: &[Role] = &[Role::Publisher, Role::Admin];
const ADMINS: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Any,
    Get,
    Post,
    Delete,
}

impl Verb {
    fn matches(self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            // axum answers HEAD with the GET handler.
            Self::Get => *method == Method::GET || *method == Method::HEAD,
            Self::Post => *method == Method::POST,
            Self::Delete => *method == Method::DELETE,
        }
    }
}

struct Rule {
    verb: Verb,
    pattern: &'static str,
    access: Access,
}

const fn rule(verb: Verb, pattern: &'static str, access: Access) -> Rule {
    Rule {
        verb,
        pattern,
        access,
    }
}

static RULES: &[Rule] = &[
    rule(Verb::Any, "/api/auth/**", Access::Public),
    rule(Verb::Get, "/api/me", Access::Public),
    rule(Verb::Get, "/api/games/**", Access::Public),
    rule(Verb::Post, "/api/games/*/comments", Access::Roles(ANY_ROLE)),
    // Owner-or-admin is checked against the comment itself.
    rule(Verb::Delete, "/api/games/*/comments/*", Access::Roles(ANY_ROLE)),
    rule(Verb::Post, "/api/games/*/rating", Access::Roles(ANY_ROLE)),
    rule(Verb::Delete, "/api/publisher/games/*", Access::Roles(ADMINS)),
    rule(Verb::Any, "/api/publisher/**", Access::Roles(PUBLISHERS)),
    rule(Verb::Get, "/api/forum/**", Access::Public),
    rule(Verb::Delete, "/api/forum/messages/*", Access::Roles(ADMINS)),
    rule(Verb::Delete, "/api/forum/topics/*", Access::Roles(ADMINS)),
    rule(Verb::Any, "/api/forum/**", Access::Roles(ANY_ROLE)),
    rule(Verb::Any, "/api/admin/**", Access::Roles(ADMINS)),
    rule(Verb::Any, "/api/me/**", Access::Authenticated),
];

fn segments_match(pattern: &[&str], path: &[&str]) -> bool {
    match (pattern.split_first(), path.split_first()) {
        (Some((&"**", _)), _) => true,
        (None, None) => true,
        (Some((&expected, rest_pattern)), Some((&actual, rest_path))) => {
            let segment_ok = if expected == "*" {
                !actual.is_empty()
            } else {
                expected == actual
            };
            segment_ok && segments_match(rest_pattern, rest_path)
        }
        _ => false,
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').collect();
    let path: Vec<&str> = path.split('/').collect();
    segments_match(&pattern, &path)
}

/// Access required for `method path`.
#[must_use]
pub fn required_access(method: &Method, path: &str) -> Access {
    RULES
        .iter()
        .find(|r| r.verb.matches(method) && pattern_matches(r.pattern, path))
        .map_or_else(
            || {
                if pattern_matches("/api/**", path) {
                    Access::Authenticated
                } else {
                    Access::Public
                }
            },
            |r| r.access,
        )
}

/// Decide whether `identity` satisfies `access`.
pub fn check(access: Access, identity: Option<&Identity>) -> Result<(), ApiError> {
    match (access, identity) {
        (Access::Public, _) => Ok(()),
        (_, None) => Err(ApiError::Unauthorized),
        (Access::Authenticated, Some(_)) => Ok(()),
        (Access::Roles(roles), Some(identity)) => {
            if roles.contains(&identity.role) {
                Ok(())
            } else {
                Err(ApiError::access_denied())
            }
        }
    }
}

/// Enforce the access table. Must run inside [`super::authenticate`].
pub async fn authorize(request: Request, next: Next) -> Response {
    let access = required_access(request.method(), request.uri().path());

    if let Err(err) = check(access, request.extensions().get::<Identity>()) {
        debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "Access denied"
        );
        return err.into_response();
    }

    next.run(request).await
}
