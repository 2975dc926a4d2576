use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any logged-in account whose status is still active. Handlers here receive the
/// `CurrentIdentity` the gatekeeper attached.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        // The caller's own identity, as re-read from the directory on this request.
        .route("/api/auth/me", get(handlers::me))
}
