use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    auth::{CurrentIdentity, clear_session_cookie, session_token_from_headers},
    classifier::{ClientKind, RouteCategory, RoutePolicy, normalize_path},
    directory::{DirectoryError, DirectoryState},
    errors::AuthError,
    models::Identity,
    session::{SessionStore, SessionToken},
};

pub const LOGIN_PAGE: &str = "/login.html";
pub const DASHBOARD_PAGE: &str = "/dashboard.html";

/// RejectReason
///
/// Why a request did not get through. Each reason maps to one `AuthError` for machine
/// clients and to one redirect target for browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoSession,
    InactiveAccount,
    InsufficientRole,
    /// The account directory failed. Never redirected, never retried.
    DirectoryUnavailable,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::NoSession => "no_session",
            RejectReason::InactiveAccount => "inactive_account",
            RejectReason::InsufficientRole => "insufficient_role",
            RejectReason::DirectoryUnavailable => "directory_unavailable",
        }
    }

    fn into_error(self) -> AuthError {
        match self {
            RejectReason::NoSession => AuthError::SessionExpiredOrUnknown,
            RejectReason::InactiveAccount => AuthError::AccountInactive,
            RejectReason::InsufficientRole => AuthError::InsufficientRole,
            RejectReason::DirectoryUnavailable => AuthError::DirectoryUnavailable(
                DirectoryError::Unavailable("status re-check failed".to_string()),
            ),
        }
    }

    /// Where a browser is sent for this reason: back to the login page when it has no usable
    /// session, to the dashboard when it is merely lacking privileges.
    fn redirect_location(&self) -> String {
        let page = match self {
            RejectReason::InsufficientRole => DASHBOARD_PAGE,
            _ => LOGIN_PAGE,
        };
        let message = self.into_error().browser_message();
        format!("{page}?error={}", urlencoding::encode(message))
    }
}

/// Decision
///
/// The terminal state of one authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Proceed. `identity` is `None` exactly when the path is public.
    Allowed { identity: Option<Identity> },
    /// Browser client turned away; send it to `location`.
    Redirect { location: String, reason: RejectReason },
    /// Machine client (or infrastructure failure) turned away.
    Rejected { reason: RejectReason },
}

/// Gatekeeper
///
/// Decides, for every inbound request, whether it may proceed and as whom.
pub struct Gatekeeper {
    policy: RoutePolicy,
    sessions: Arc<SessionStore>,
    directory: DirectoryState,
    context_root: String,
    secure_cookies: bool,
}

impl Gatekeeper {
    pub fn new(
        policy: RoutePolicy,
        sessions: Arc<SessionStore>,
        directory: DirectoryState,
        context_root: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            sessions,
            directory,
            context_root: context_root.into(),
            secure_cookies: false,
        }
    }

    /// Marks the cookies the gatekeeper clears as `Secure` (production).
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn context_root(&self) -> &str {
        &self.context_root
    }

    pub async fn authorize(&self, path: &str, token: Option<&SessionToken>) -> Decision {
        self.authorize_at(path, token, Utc::now()).await
    }

    /// authorize_at
    ///
    /// `path` must already be normalized. Steps, each terminal on failure:
    ///
    /// 1. Classify. Public paths are allowed straight away; no session lookup happens.
    /// 2. Resolve the session (sliding its idle clock).
    /// 3. Re-read the account from the directory. The snapshot's active flag is not trusted.
    ///    An inactive or deleted account has its session destroyed *before* the rejection
    ///    is produced. A directory failure rejects the request outright.
    /// 4. Admin-only paths require the account's current role to be `Admin`.
    /// 5. Allow, carrying the freshly read identity.
    pub async fn authorize_at(
        &self,
        path: &str,
        token: Option<&SessionToken>,
        now: DateTime<Utc>,
    ) -> Decision {
        // 1. Classification
        let category = self.policy.classify(path);
        if category == RouteCategory::Public {
            return Decision::Allowed { identity: None };
        }
        let client = ClientKind::for_path(path);

        // 2. Session resolution
        let Some(session) = token.and_then(|token| self.sessions.resolve_at(token, now)) else {
            tracing::warn!(path, "request without a valid session");
            return self.deny(client, RejectReason::NoSession);
        };

        // 3. Account status re-check
        let identity = match self.directory.find_by_id(session.identity.id).await {
            Ok(Some(record)) if record.identity.active => record.identity,
            Ok(_) => {
                self.sessions.invalidate(&session.token);
                tracing::warn!(
                    path,
                    account_id = session.identity.id,
                    "session revoked: account deactivated or removed"
                );
                return self.deny(client, RejectReason::InactiveAccount);
            }
            Err(e) => {
                tracing::error!(
                    path,
                    account_id = session.identity.id,
                    error = %e,
                    "account status re-check failed"
                );
                return Decision::Rejected {
                    reason: RejectReason::DirectoryUnavailable,
                };
            }
        };

        // 4. Role enforcement
        if category == RouteCategory::AdminOnly && !identity.role.is_admin() {
            tracing::warn!(
                path,
                username = %identity.username,
                role = %identity.role,
                "admin path refused"
            );
            return self.deny(client, RejectReason::InsufficientRole);
        }

        // 5. Allowed
        Decision::Allowed {
            identity: Some(identity),
        }
    }

    fn deny(&self, client: ClientKind, reason: RejectReason) -> Decision {
        match client {
            ClientKind::Api => Decision::Rejected { reason },
            ClientKind::Browser => Decision::Redirect {
                location: format!(
                    "{}{}",
                    self.context_root.trim_end_matches('/'),
                    reason.redirect_location()
                ),
                reason,
            },
        }
    }
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("policy", &self.policy)
            .field("context_root", &self.context_root)
            .finish_non_exhaustive()
    }
}

/// gatekeeper_middleware
///
/// Runs [`Gatekeeper::authorize`] in front of every route and turns the decision into HTTP:
/// the request continues with a [`CurrentIdentity`] attached, or gets a JSON error, or a
/// `303 See Other` redirect. When the session turned out to be unusable the cookie is
/// cleared as well.
pub async fn gatekeeper_middleware(
    State(gatekeeper): State<Arc<Gatekeeper>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = normalize_path(request.uri().path(), gatekeeper.context_root());
    let token = session_token_from_headers(request.headers());

    match gatekeeper.authorize(&path, token.as_ref()).await {
        Decision::Allowed { identity } => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(CurrentIdentity(identity));
            }
            next.run(request).await
        }
        Decision::Redirect { location, reason } => {
            let redirect = Redirect::to(&location);
            if token.is_some() && reason != RejectReason::InsufficientRole {
                let cookie = clear_session_cookie(gatekeeper.secure_cookies);
                ([(header::SET_COOKIE, cookie)], redirect).into_response()
            } else {
                redirect.into_response()
            }
        }
        Decision::Rejected { reason } => reason.into_error().into_response(),
    }
}
