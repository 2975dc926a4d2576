use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use std::sync::Arc;

use crate::{
    credentials::CredentialVerifier,
    directory::DirectoryState,
    errors::AuthError,
    models::{Identity, Username},
    session::{Session, SessionStore, SessionToken},
};

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE: &str = "PAWNSHOP_SESSION";

/// CurrentIdentity
///
/// The identity the gatekeeper resolved for this request. The gatekeeper middleware puts
/// it into the request extensions after every check has passed; handlers take it as an
/// argument, which makes "this handler runs only after authorization" visible in its
/// signature.
///
/// Rejection: `AuthError::SessionExpiredOrUnknown` (401) if no identity was attached, which
/// only happens when a handler behind a public path asks for one.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .cloned()
            .ok_or(AuthError::SessionExpiredOrUnknown)
    }
}

/// Authenticator
///
/// Login and logout. Login is the only place a session is born: it checks the password
/// against the directory's stored hash and, on success, asks the session store for a token.
#[derive(Clone)]
pub struct Authenticator {
    directory: DirectoryState,
    verifier: CredentialVerifier,
    sessions: Arc<SessionStore>,
}

impl Authenticator {
    pub fn new(
        directory: DirectoryState,
        verifier: CredentialVerifier,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            directory,
            verifier,
            sessions,
        }
    }

    /// login
    ///
    /// 1. Input validation: blank fields or a username outside 3–50 characters fail as
    ///    `InvalidCredentials` without touching the directory.
    /// 2. Directory lookup (case-insensitive). A directory failure surfaces as
    ///    `DirectoryUnavailable`, never as bad credentials.
    /// 3. Password check on the blocking pool. An unknown username still runs a dummy
    ///    verification so timing does not reveal which usernames exist.
    /// 4. Active check, only after the password matched, so the account status is never
    ///    disclosed to someone who does not know the password.
    /// 5. Session creation.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        // 1. Input validation
        let username = match Username::parse(username) {
            Ok(username) if !password.is_empty() => username,
            _ => return Err(AuthError::InvalidCredentials),
        };

        // 2. Directory lookup
        let record = self.directory.find_by_username(&username).await?;

        // 3. Password verification
        let verifier = self.verifier.clone();
        let plaintext = password.to_string();
        let (record, verified) = tokio::task::spawn_blocking(move || match record {
            Some(record) => {
                let verified = verifier.verify(&plaintext, &record.credential_hash);
                (Some(record), verified)
            }
            None => {
                verifier.verify_dummy(&plaintext);
                (None, false)
            }
        })
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;

        let record = match record {
            Some(record) if verified => record,
            _ => {
                tracing::warn!(username = %username, "login failed: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // 4. Active check
        if !record.identity.active {
            tracing::warn!(username = %username, "login refused: account inactive");
            return Err(AuthError::AccountInactive);
        }

        // 5. Session creation
        let session = self.sessions.create(record.identity);
        tracing::info!(
            username = %session.identity.username,
            account_id = session.identity.id,
            role = %session.identity.role,
            expires_at = %session.expires_at(),
            "user logged in"
        );
        Ok(session)
    }

    /// logout
    ///
    /// Destroys the session. Calling it for an unknown or already-destroyed token is a no-op.
    pub fn logout(&self, token: &SessionToken) {
        if self.sessions.invalidate(token) {
            tracing::info!("user logged out");
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("verifier", &self.verifier)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

// --- Session Cookie Helpers ---

/// session_token_from_headers
///
/// Finds the session cookie among all `Cookie` headers. A malformed value counts as no
/// token at all.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionToken::parse(value.trim()))
}

/// The `Set-Cookie` value issued on login.
///
/// A browser-session cookie with no `Max-Age`: idle expiry is enforced server-side and
/// slides with every request, so the client must not drop the token on a fixed schedule.
pub fn session_cookie(token: &SessionToken, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        token.as_str()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// The `Set-Cookie` value that makes the browser forget the session.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
