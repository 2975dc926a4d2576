use crate::models::{AccountId, Identity};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use rand::{RngCore, rngs::OsRng};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// Idle timeout applied to every session unless configured otherwise.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

const TOKEN_BYTES: usize = 32;

/// SessionToken
///
/// 256 bits from the OS CSPRNG, hex-encoded. The `Debug` form never prints the value, so
/// tokens cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accepts a token as presented by a client. Anything that is not the exact shape of a
    /// generated token is refused up front.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed =
            raw.len() == TOKEN_BYTES * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit());
        well_formed.then(|| Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Session
///
/// A server-held record tying a token to the identity snapshot taken at login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
    pub idle_timeout: TimeDelta,
}

impl Session {
    /// Idle time strictly greater than the timeout expires the session.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.last_touched_at > self.idle_timeout
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.last_touched_at
            .checked_add_signed(self.idle_timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// SessionStore
///
/// The process-scoped owner of all live sessions. Built once in `main`, shared through
/// `AppState`, cleared on shutdown.
///
/// Locking: the outer map lock is only held to find, insert or remove an entry. Each entry
/// has its own mutex, and every read-check-touch of a session happens under it, so updates
/// to one token are serialized while different tokens resolve in parallel. Lock order is
/// always map then entry, never the reverse.
pub struct SessionStore {
    entries: RwLock<HashMap<SessionToken, Arc<Mutex<Session>>>>,
    idle_timeout: TimeDelta,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        let idle_timeout = i64::try_from(idle_timeout.as_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            entries: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn create(&self, identity: Identity) -> Session {
        self.create_at(identity, Utc::now())
    }

    /// create_at
    ///
    /// Stores a fresh session with `created_at = last_touched_at = now`. A token is never
    /// handed out twice.
    pub fn create_at(&self, identity: Identity, now: DateTime<Utc>) -> Session {
        let mut entries = self.entries.write();
        let token = loop {
            let candidate = SessionToken::generate();
            if !entries.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Session {
            token: token.clone(),
            identity,
            created_at: now,
            last_touched_at: now,
            idle_timeout: self.idle_timeout,
        };
        entries.insert(token, Arc::new(Mutex::new(session.clone())));
        session
    }

    pub fn resolve(&self, token: &SessionToken) -> Option<Session> {
        self.resolve_at(token, Utc::now())
    }

    /// resolve_at
    ///
    /// Returns the session if it exists and has not been idle past the timeout, sliding its
    /// `last_touched_at` forward to `now`. An expired entry is removed on the spot.
    pub fn resolve_at(&self, token: &SessionToken, now: DateTime<Utc>) -> Option<Session> {
        let entry = self.entries.read().get(token).cloned()?;

        let mut session = entry.lock();
        if session.is_expired_at(now) {
            drop(session);
            self.entries.write().remove(token);
            return None;
        }
        // Never move the clock backwards if a slower request arrives with an older `now`.
        if now > session.last_touched_at {
            session.last_touched_at = now;
        }
        Some(session.clone())
    }

    /// invalidate
    ///
    /// Removes the session. Idempotent: returns whether an entry was actually removed.
    pub fn invalidate(&self, token: &SessionToken) -> bool {
        self.entries.write().remove(token).is_some()
    }

    /// invalidate_identity
    ///
    /// Drops every session belonging to one account, e.g. right after it is deactivated.
    pub fn invalidate_identity(&self, id: AccountId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.lock().identity.id != id);
        before - entries.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.lock().is_expired_at(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// spawn_sweeper
///
/// Periodically evicts expired sessions. Expiry is already enforced at resolve time; the
/// sweep only reclaims memory held by sessions nobody comes back for.
pub fn spawn_sweeper(store: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = store.len(), "expired sessions swept");
            }
        }
    })
}
