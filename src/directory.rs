use crate::models::{AccountId, AccountRecord, Identity, Role, Username};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI32, Ordering},
};
use thiserror::Error;

/// DirectoryError
///
/// Infrastructure-level failures of the account store. "Not found" is *not* an error here:
/// lookups return `Ok(None)` for that, so callers can never confuse an unreachable database
/// with a missing or inactive account.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("account directory unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt account record {id}: {reason}")]
    CorruptRecord { id: AccountId, reason: String },
    #[error("username already exists: {0}")]
    DuplicateUsername(String),
}

/// AccountDirectory Trait
///
/// Read access to persisted accounts, as consumed by login and by the per-request status
/// re-check. Account CRUD lives elsewhere; the only write exposed here is the active flag,
/// which the deactivation endpoint needs.
///
/// **Send + Sync + async_trait** make `Arc<dyn AccountDirectory>` shareable across Axum's
/// task boundaries.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, DirectoryError>;

    /// Case-insensitive lookup.
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<AccountRecord>, DirectoryError>;

    /// All accounts, newest first.
    async fn list_accounts(&self) -> Result<Vec<Identity>, DirectoryError>;

    /// Returns `false` if no such account exists.
    async fn set_active(&self, id: AccountId, active: bool) -> Result<bool, DirectoryError>;
}

/// DirectoryState
///
/// The concrete type used to share the account directory across the application state.
pub type DirectoryState = Arc<dyn AccountDirectory>;

// --- Postgres Implementation ---

/// AccountRow
///
/// Raw row of the `account` table. Converted into an [`AccountRecord`] through a fallible
/// conversion so an unknown role string surfaces as a corrupt record instead of a default.
#[derive(Debug, FromRow)]
struct AccountRow {
    account_id: AccountId,
    username: String,
    password_hash: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for AccountRecord {
    type Error = DirectoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| DirectoryError::CorruptRecord {
            id: row.account_id,
            reason,
        };
        let role = row.role.parse::<Role>().map_err(|e| corrupt(e.to_string()))?;
        let username = Username::parse(&row.username).map_err(|e| corrupt(e.to_string()))?;

        Ok(AccountRecord {
            identity: Identity {
                id: row.account_id,
                username,
                role,
                active: row.is_active,
            },
            credential_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str =
    "account_id, username, password_hash, role, is_active, created_at, updated_at";

/// PostgresAccountDirectory
///
/// The production directory, backed by the `account` table.
pub struct PostgresAccountDirectory {
    pool: PgPool,
}

impl PostgresAccountDirectory {
    /// Creates a new directory using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(op: &str, e: sqlx::Error) -> DirectoryError {
    tracing::error!("{op} error: {:?}", e);
    DirectoryError::Unavailable(e.to_string())
}

#[async_trait]
impl AccountDirectory for PostgresAccountDirectory {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, DirectoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE account_id = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable("find_by_id", e))?
            .map(AccountRecord::try_from)
            .transpose()
    }

    /// find_by_username
    ///
    /// Compares on `LOWER(username)` so `Admin` and `admin` resolve to the same account.
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<AccountRecord>, DirectoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE LOWER(username) = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(username.lookup_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable("find_by_username", e))?
            .map(AccountRecord::try_from)
            .transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<Identity>, DirectoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, AccountRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable("list_accounts", e))?;

        rows.into_iter()
            .map(|row| AccountRecord::try_from(row).map(|record| record.identity))
            .collect()
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<bool, DirectoryError> {
        let result = sqlx::query(
            "UPDATE account SET is_active = $1, updated_at = NOW() WHERE account_id = $2",
        )
        .bind(active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("set_active", e))?;

        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

/// InMemoryAccountDirectory
///
/// A process-local directory used by the test suites and for running the service without a
/// database. [`InMemoryAccountDirectory::set_available`] simulates the backing store going
/// away, which every lookup then reports as [`DirectoryError::Unavailable`].
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<AccountId, AccountRecord>>,
    next_id: AtomicI32,
    available: AtomicBool,
}

impl Default for InMemoryAccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicI32::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// insert_account
    ///
    /// Stores a new active account and returns its identity. Usernames are unique
    /// case-insensitively.
    pub fn insert_account(
        &self,
        username: Username,
        credential_hash: String,
        role: Role,
    ) -> Result<Identity, DirectoryError> {
        let mut accounts = self.accounts.write();
        let key = username.lookup_key();
        if accounts
            .values()
            .any(|record| record.identity.username.lookup_key() == key)
        {
            return Err(DirectoryError::DuplicateUsername(username.to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let identity = Identity {
            id,
            username,
            role,
            active: true,
        };
        accounts.insert(
            id,
            AccountRecord {
                identity: identity.clone(),
                credential_hash,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(identity)
    }

    /// Changes the role of an existing account. Returns `false` if it does not exist.
    pub fn set_role(&self, id: AccountId, role: Role) -> bool {
        match self.accounts.write().get_mut(&id) {
            Some(record) => {
                record.identity.role = role;
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Deletes an account outright. Returns `false` if it did not exist.
    pub fn remove_account(&self, id: AccountId) -> bool {
        self.accounts.write().remove(&id).is_some()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), DirectoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DirectoryError::Unavailable(
                "in-memory directory switched off".to_string(),
            ))
        }
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, DirectoryError> {
        self.ensure_available()?;
        Ok(self.accounts.read().get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<AccountRecord>, DirectoryError> {
        self.ensure_available()?;
        let key = username.lookup_key();
        Ok(self
            .accounts
            .read()
            .values()
            .find(|record| record.identity.username.lookup_key() == key)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Identity>, DirectoryError> {
        self.ensure_available()?;
        let accounts = self.accounts.read();
        let mut records: Vec<&AccountRecord> = accounts.values().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.identity.id.cmp(&a.identity.id))
        });
        Ok(records.into_iter().map(|r| r.identity.clone()).collect())
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<bool, DirectoryError> {
        self.ensure_available()?;
        match self.accounts.write().get_mut(&id) {
            Some(record) => {
                record.identity.active = active;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(account_id: AccountId, role: &str) -> AccountRow {
        let now = Utc::now();
        AccountRow {
            account_id,
            username: "clerk".to_string(),
            password_hash: "$2a$12$hash".to_string(),
            role: role.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_decodes_serial_primary_key() {
        // `account_id` is an INT4 column; sqlx only decodes it into an `i32`.
        let id: i32 = 2_147_483_647;
        let record = AccountRecord::try_from(row(id, "ADMIN")).unwrap();
        assert_eq!(record.identity.id, id);
        assert_eq!(record.identity.role, Role::Admin);
    }

    #[test]
    fn test_row_with_unknown_role_is_corrupt() {
        let err = AccountRecord::try_from(row(7, "manager")).unwrap_err();
        assert!(matches!(err, DirectoryError::CorruptRecord { id: 7, .. }));
    }
}
