//! REST API server module.
//!
//! Provides the HTTP control plane for the local credential vault.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

use crate::audit::AuditEvent;
use crate::backup::{Envelope, ImportSummary};
use crate::entries::{Entry, EntryCreate, EntrySummary};
use crate::settings::SettingsModel;
use crate::vault::VaultStatus;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::vault::status,
        handlers::vault::setup,
        handlers::vault::unlock,
        handlers::vault::lock,
        handlers::entries::list,
        handlers::entries::create,
        handlers::entries::get,
        handlers::entries::update,
        handlers::entries::delete,
        handlers::settings::get,
        handlers::settings::put,
        handlers::audit::list,
        handlers::backup::export,
        handlers::backup::preview,
        handlers::backup::apply,
    ),
    components(schemas(
        VaultStatus,
        Entry,
        EntryCreate,
        EntrySummary,
        SettingsModel,
        AuditEvent,
        Envelope,
        ImportSummary,
    )),
    tags(
        (name = "vault", description = "Vault lifecycle"),
        (name = "entries", description = "Credential entries"),
        (name = "settings", description = "Client settings"),
        (name = "audit", description = "Audit log"),
        (name = "backup", description = "Backup export/import"),
    )
)]
struct ApiDoc;

/// Assembles the full router: documentation mounts, the resource routes
/// from spec.md §6, the `/_internal` CSRF-probe route, the CSRF gate, and
/// the security-header layer, in that order (outermost layer runs first on
/// the request, last on the response).
pub fn create_router(state: AppState) -> Router {
    let allowed_origin = state
        .config
        .app_cors_allowed_origin
        .parse::<axum::http::HeaderValue>()
        .unwrap_or_else(|_| axum::http::HeaderValue::from_static("http://localhost:5173"));

    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::HeaderName::from_static("x-csrf-token")]);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/vault/status", get(handlers::vault::status))
        .route("/vault/setup", post(handlers::vault::setup))
        .route("/vault/unlock", post(handlers::vault::unlock))
        .route("/vault/lock", post(handlers::vault::lock))
        .route("/entries", get(handlers::entries::list).post(handlers::entries::create))
        .route(
            "/entries/:id",
            get(handlers::entries::get).put(handlers::entries::update).delete(handlers::entries::delete),
        )
        .route("/settings", get(handlers::settings::get).put(handlers::settings::put))
        .route("/audit", get(handlers::audit::list))
        .route("/backup/export", post(handlers::backup::export))
        .route("/backup/import/preview", post(handlers::backup::preview))
        .route("/backup/import/apply", post(handlers::backup::apply))
        .route("/_internal/csrf-probe", post(handlers::internal::csrf_probe))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), crate::security::request_gate))
        .with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(cors)
}

/// Starts the API server on `addr`.
pub async fn start_server(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);

    tracing::info!(%addr, "local vault API server starting");
    tracing::info!(%addr, "swagger UI available at /swagger-ui");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
