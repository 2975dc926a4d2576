use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the health probe and the login/logout entry
/// points. Every path here must match an entry of the public prefix list, otherwise the
/// gatekeeper will demand a session before the handler ever runs.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        .route("/api/health", get(handlers::health))
        // POST /api/auth/login
        // JSON login for machine clients; sets the session cookie.
        .route("/api/auth/login", post(handlers::api_login))
        // POST /api/auth/logout
        // Idempotent: a second call with a dead token still answers 204.
        .route("/api/auth/logout", post(handlers::api_logout))
        // POST /auth/login, POST /auth/logout
        // Form-based variants for browsers; both answer with redirects.
        .route("/auth/login", post(handlers::form_login))
        .route("/auth/logout", post(handlers::form_logout))
}
