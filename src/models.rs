use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Primary key of the `account` table (`SERIAL`, i.e. Postgres `INT4`).
pub type AccountId = i32;

/// ModelError
///
/// Construction failures for the identity types. These are hard errors: a record carrying an
/// unknown role or an out-of-range username is rejected, never coerced into a default.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("username must be between {min} and {max} characters", min = Username::MIN_LEN, max = Username::MAX_LEN)]
    InvalidUsername,
}

// --- Identity Schemas ---

/// Role
///
/// The closed set of privilege levels. The wire form is the lowercase name
/// (`customer`, `employee`, `admin`); anything else fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Customer,
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    /// Case-insensitive, but otherwise exact: `"Admin"` parses, `"administrator"` does not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            _ => Err(ModelError::UnknownRole(s.to_string())),
        }
    }
}

/// Username
///
/// A validated login name (3–50 characters after trimming). Uniqueness and lookups are
/// case-insensitive, so every directory keys accounts on [`Username::lookup_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 50;

    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(ModelError::InvalidUsername);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The case-folded form used for uniqueness and lookup.
    pub fn lookup_key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl TryFrom<String> for Username {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Username::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity
///
/// The authenticated representation of an account. Sessions hold a copy of this taken at
/// login time; the gatekeeper re-reads the live one from the directory on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: AccountId,
    pub username: Username,
    pub role: Role,
    pub active: bool,
}

/// AccountRecord
///
/// What the account directory hands back: the identity plus the stored credential hash.
/// The hash only ever travels between the directory and the credential verifier.
#[derive(Clone)]
pub struct AccountRecord {
    pub identity: Identity,
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("identity", &self.identity)
            .field("credential_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials submitted to `POST /api/auth/login` (JSON) and `POST /auth/login` (form).
#[derive(Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// LoginForm
///
/// The browser form posted to `POST /auth/login`. Both fields are optional so that a
/// half-filled form still gets a redirect back to the login page instead of a 422.
#[derive(Clone, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    /// Both fields present, username non-blank, password non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password))
                if !username.trim().is_empty() && !password.is_empty() =>
            {
                Some((username, password))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// DeactivateAccountRequest
///
/// Input payload for the admin deactivation endpoint (`POST /api/accounts/deactivate`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeactivateAccountRequest {
    pub account_id: AccountId,
}

// --- Output Schemas ---

/// IdentityView
///
/// The public projection of an [`Identity`], returned by login, `/api/auth/me` and the
/// account listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IdentityView {
    pub id: AccountId,
    pub username: String,
    pub role: Role,
    pub active: bool,
}

impl From<&Identity> for IdentityView {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username.as_str().to_string(),
            role: identity.role,
            active: identity.active,
        }
    }
}

/// ApiError
///
/// The structured body machine clients receive for every rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: String,
}
