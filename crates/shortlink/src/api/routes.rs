//! API route definitions.

use axum::{Router, middleware, routing::get};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::{oauth_callback, require_session};

use super::handlers;
use super::state::AppState;

/// Create the application router. The OAuth callback is mounted at `callback_path`.
pub fn create_router(state: AppState, callback_path: &str) -> Router {
    // Tracing layer with request IDs and timing
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Management routes (require a session)
    let protected_routes = Router::new()
        .route(
            "/admin/edit",
            get(handlers::get_edit_link).post(handlers::post_edit_link),
        )
        .route("/admin/list", get(handlers::list_links))
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::post_users),
        )
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_session,
        ))
        .with_state(state.clone());

    // Public routes (no session)
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route(callback_path, get(oauth_callback))
        .route("/", get(handlers::resolve_root))
        .route("/{*key}", get(handlers::resolve_link))
        .with_state(state);

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(trace_layer)
}
