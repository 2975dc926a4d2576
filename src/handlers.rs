use crate::{
    AppState,
    auth::{CurrentIdentity, clear_session_cookie, session_cookie, session_token_from_headers},
    errors::AuthError,
    gatekeeper::{DASHBOARD_PAGE, LOGIN_PAGE},
    models::{ApiError, DeactivateAccountRequest, IdentityView, LoginForm, LoginRequest},
    session::Session,
};
use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};

// --- Helpers ---

fn login_cookie(state: &AppState, session: &Session) -> String {
    session_cookie(&session.token, state.config.env.is_production())
}

/// Prefixes a page path with the configured context root.
fn page(state: &AppState, path: &str) -> String {
    format!("{}{}", state.config.context_root.trim_end_matches('/'), path)
}

fn login_page_error(state: &AppState, message: &str) -> Response {
    let location = format!(
        "{}?error={}",
        page(state, LOGIN_PAGE),
        urlencoding::encode(message)
    );
    Redirect::to(&location).into_response()
}

// --- Handlers ---

/// health
///
/// [Public Route] Liveness probe for monitoring and load balancers.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// api_login
///
/// [Public Route] JSON login for machine clients. On success the session token is set as an
/// HTTP-only cookie and the resolved identity is returned.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = IdentityView),
        (status = 401, description = "Invalid credentials or inactive account", body = ApiError),
        (status = 503, description = "Account directory unavailable", body = ApiError)
    )
)]
pub async fn api_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let session = state
        .authenticator
        .login(&payload.username, &payload.password)
        .await?;

    let cookie = login_cookie(&state, &session);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(IdentityView::from(&session.identity)),
    )
        .into_response())
}

/// form_login
///
/// [Public Route] Form login for browsers. Always answers with a redirect: to the dashboard
/// on success, back to the login page with a readable `error` otherwise.
pub async fn form_login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let Some((username, password)) = form.credentials() else {
        return login_page_error(&state, "Username and password are required");
    };

    match state.authenticator.login(username, password).await {
        Ok(session) => {
            let cookie = login_cookie(&state, &session);
            (
                [(header::SET_COOKIE, cookie)],
                Redirect::to(&page(&state, DASHBOARD_PAGE)),
            )
                .into_response()
        }
        Err(e) => {
            if let AuthError::DirectoryUnavailable(source) = &e {
                tracing::error!(error = %source, "form login failed");
            }
            login_page_error(&state, e.browser_message())
        }
    }
}

/// api_logout
///
/// [Public Route] Destroys the caller's session, if any, and clears the cookie. Safe to call
/// any number of times.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn api_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token_from_headers(&headers) {
        state.authenticator.logout(&token);
    }
    let cookie = clear_session_cookie(state.config.env.is_production());
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response()
}

/// form_logout
///
/// [Public Route] Browser logout; lands on the login page with a confirmation message.
pub async fn form_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token_from_headers(&headers) {
        state.authenticator.logout(&token);
    }
    let cookie = clear_session_cookie(state.config.env.is_production());
    let location = format!(
        "{}?message={}",
        page(&state, LOGIN_PAGE),
        urlencoding::encode("You have been logged out successfully")
    );
    ([(header::SET_COOKIE, cookie)], Redirect::to(&location)).into_response()
}

/// me
///
/// [Authenticated Route] The identity the gatekeeper attached to this request.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current identity", body = IdentityView),
        (status = 401, description = "No valid session", body = ApiError)
    )
)]
pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<IdentityView> {
    Json(IdentityView::from(&identity))
}

/// list_accounts
///
/// [Admin Route] Every account in the directory.
///
/// *Authorization*: the gatekeeper already refused non-admins; the role is checked again
/// here so the handler stays safe if it is ever mounted under a different path.
#[utoipa::path(
    get,
    path = "/api/accounts/all",
    responses(
        (status = 200, description = "All accounts", body = [IdentityView]),
        (status = 403, description = "Admin required", body = ApiError)
    )
)]
pub async fn list_accounts(
    CurrentIdentity(identity): CurrentIdentity,
    State(state): State<AppState>,
) -> Result<Json<Vec<IdentityView>>, AuthError> {
    if !identity.role.is_admin() {
        return Err(AuthError::InsufficientRole);
    }
    let accounts = state.directory.list_accounts().await?;
    Ok(Json(accounts.iter().map(IdentityView::from).collect()))
}

/// deactivate_account
///
/// [Admin Route] Marks an account inactive and revokes all of its live sessions at once.
/// Any request already past the session lookup is still caught by the gatekeeper's
/// per-request status re-check.
#[utoipa::path(
    post,
    path = "/api/accounts/deactivate",
    request_body = DeactivateAccountRequest,
    responses(
        (status = 204, description = "Deactivated"),
        (status = 403, description = "Admin required", body = ApiError),
        (status = 404, description = "No such account")
    )
)]
pub async fn deactivate_account(
    CurrentIdentity(identity): CurrentIdentity,
    State(state): State<AppState>,
    Json(payload): Json<DeactivateAccountRequest>,
) -> Result<StatusCode, AuthError> {
    if !identity.role.is_admin() {
        return Err(AuthError::InsufficientRole);
    }

    if !state
        .directory
        .set_active(payload.account_id, false)
        .await?
    {
        return Ok(StatusCode::NOT_FOUND);
    }

    let revoked = state.sessions.invalidate_identity(payload.account_id);
    tracing::info!(
        account_id = payload.account_id,
        by = %identity.username,
        revoked_sessions = revoked,
        "account deactivated"
    );
    Ok(StatusCode::NO_CONTENT)
}
