use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Routes restricted to `Role::Admin`. Their paths sit under the admin API prefixes, so the
/// gatekeeper rejects other roles with `insufficient_role` (403) before the handler runs;
/// the handlers repeat the role check as a second line.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/accounts/all
        .route("/api/accounts/all", get(handlers::list_accounts))
        // POST /api/accounts/deactivate
        // Flips the active flag and revokes the account's sessions immediately.
        .route("/api/accounts/deactivate", post(handlers::deactivate_account))
}
