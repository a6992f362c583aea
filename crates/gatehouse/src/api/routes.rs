//! API route definitions.

use axum::http::{HeaderValue, header};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::access_gate;

use super::handlers;
use super::state::AppState;

/// Create the application router.
///
/// Every request passes the access gate; `/api/auth/*` and `/health` are on
/// its bypass list. Paths without a handler fall through to the page layer.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let auth_state = state.auth.clone();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/csrf", get(handlers::csrf))
        .route("/api/auth/signin", post(handlers::signin))
        .route("/api/auth/signout", post(handlers::signout))
        .route(
            "/api/auth/session",
            get(handlers::get_session).post(handlers::update_session),
        )
        .fallback(handlers::page)
        .layer(middleware::from_fn_with_state(auth_state, access_gate))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("origin-when-cross-origin"),
        ))
        .layer(trace_layer)
        .with_state(state)
}
