mod admin;
mod auth;
mod comments;
pub mod extract;
mod forum;
mod games;
mod pagination;
mod profile;
mod reviews;
mod uploads;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{authenticate, authorize, TokenService};
use crate::config::Config;
use crate::db::Database;
use crate::error::{fill_error_path, ApiError};

pub use pagination::{Page, PageParams};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub tokens: TokenService,
}

impl AppState {
    /// Build state from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token signer rejects the configured secret.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let tokens = TokenService::new(&config.jwt_secret, &config.jwt_issuer, config.jwt_ttl)
            .context("Failed to initialize token service")?;
        Ok(Self {
            db,
            config: Arc::new(config),
            tokens,
        })
    }
}

/// Start the web server and run it until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve<F>(config: Config, db: Database, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port)
        .parse()
        .context("Invalid web server address")?;

    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create uploads directory: {}",
                config.uploads_dir.display()
            )
        })?;

    let state = AppState::new(config, db)?;
    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server error")?;

    info!("HTTP web server stopped");
    Ok(())
}

/// Create the main application router.
///
/// Layers run outside-in: tracing, error path stamping, bearer token
/// verification, then the access policy, so every route (uploads included)
/// is authorized with the caller's identity already attached.
pub fn create_app(state: AppState) -> Router {
    let uploads_dir = state.config.uploads_dir.clone();
    info!(uploads_dir = ?uploads_dir, "Serving uploaded files");

    let cors = cors_layer(state.config.cors_allow_origin.as_deref());

    let app = Router::new()
        .merge(auth::router())
        .merge(games::router())
        .merge(comments::router())
        .merge(reviews::router())
        .merge(forum::router())
        .merge(profile::router())
        .merge(admin::router())
        .route("/healthz", get(health))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .fallback(not_found)
        .layer(middleware::from_fn(authorize))
        .layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            authenticate,
        ))
        .layer(middleware::from_fn(fill_error_path))
        .layer(TraceLayer::new_for_http());

    let app = match cors {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.with_state(state)
}

fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    match origin.parse::<HeaderValue>() {
        Ok(value) => Some(
            CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Err(e) => {
            warn!(origin, error = %e, "Ignoring invalid CORS_ALLOW_ORIGIN");
            None
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
