// Library exports for inkpost
// This allows integration tests and the binary to share the modules

pub mod auth;
pub mod backend;
pub mod config;
pub mod content;
pub mod db;
pub mod engagement;
pub mod error;
pub mod extractors;
pub mod profile;
pub mod routes;
pub mod state;
pub mod sweep;
pub mod tags;
pub mod uploads;
pub mod username;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP application: every route behind the session layer, plus
/// the stored objects under `/storage`.
pub fn app(state: AppState) -> Router {
    let objects = ServeDir::new(state.config.objects_path());
    let body_limit = state.config.storage.max_upload_bytes;

    routes::router()
        .nest_service("/storage", objects)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::session_layer,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
