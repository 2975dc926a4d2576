use chrono::{TimeDelta, Utc};
use pawnshop_backoffice::{
    SessionStore, SessionToken,
    models::{Identity, Role, Username},
    session::DEFAULT_IDLE_TIMEOUT,
};
use std::{sync::Arc, thread};

fn identity(id: i32, name: &str, role: Role) -> Identity {
    Identity {
        id,
        username: Username::parse(name).unwrap(),
        role,
        active: true,
    }
}

fn store() -> SessionStore {
    SessionStore::new(DEFAULT_IDLE_TIMEOUT)
}

#[test]
fn test_create_then_resolve() {
    let store = store();
    let session = store.create(identity(1, "alice", Role::Employee));

    assert_eq!(session.created_at, session.last_touched_at);
    assert_eq!(session.idle_timeout, TimeDelta::seconds(3600));

    let resolved = store.resolve(&session.token).expect("fresh session resolves");
    assert_eq!(resolved.identity.username.as_str(), "alice");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_tokens_are_unique_and_well_formed() {
    let store = store();
    let a = store.create(identity(1, "alice", Role::Employee));
    let b = store.create(identity(1, "alice", Role::Employee));

    assert_ne!(a.token, b.token);
    assert_eq!(a.token.as_str().len(), 64);
    assert!(a.token.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_token_debug_is_redacted() {
    let store = store();
    let session = store.create(identity(1, "alice", Role::Employee));
    let printed = format!("{:?}", session.token);
    assert!(!printed.contains(session.token.as_str()));
}

#[test]
fn test_token_parse_rejects_malformed_values() {
    assert!(SessionToken::parse("").is_none());
    assert!(SessionToken::parse("abc").is_none());
    assert!(SessionToken::parse(&"z".repeat(64)).is_none());
    assert!(SessionToken::parse(&"a".repeat(65)).is_none());
    assert!(SessionToken::parse(&"a".repeat(64)).is_some());
}

#[test]
fn test_unknown_token_is_absent() {
    let store = store();
    let token = SessionToken::parse(&"0".repeat(64)).unwrap();
    assert!(store.resolve(&token).is_none());
}

#[test]
fn test_sliding_window_resets_idle_clock() {
    let store = store();
    let t0 = Utc::now();
    let session = store.create_at(identity(1, "alice", Role::Employee), t0);

    // 3599s idle: still valid, and the clock slides.
    let t1 = t0 + TimeDelta::seconds(3599);
    let resolved = store.resolve_at(&session.token, t1).expect("3599s idle is valid");
    assert_eq!(resolved.last_touched_at, t1);

    // Immediately again: idle time counts from t1, not t0.
    let t2 = t1 + TimeDelta::seconds(3599);
    assert!(store.resolve_at(&session.token, t2).is_some());
}

#[test]
fn test_idle_exactly_at_timeout_is_valid() {
    let store = store();
    let t0 = Utc::now();
    let session = store.create_at(identity(1, "alice", Role::Employee), t0);

    assert!(
        store
            .resolve_at(&session.token, t0 + TimeDelta::seconds(3600))
            .is_some()
    );
}

#[test]
fn test_idle_past_timeout_is_absent_and_removed() {
    let store = store();
    let t0 = Utc::now();
    let session = store.create_at(identity(1, "alice", Role::Employee), t0);

    assert!(
        store
            .resolve_at(&session.token, t0 + TimeDelta::seconds(3601))
            .is_none()
    );
    assert!(store.is_empty(), "expired entry is dropped on resolve");

    // Never revived, even with an earlier clock.
    assert!(store.resolve_at(&session.token, t0).is_none());
}

#[test]
fn test_older_timestamp_does_not_move_clock_backwards() {
    let store = store();
    let t0 = Utc::now();
    let session = store.create_at(identity(1, "alice", Role::Employee), t0);

    let later = t0 + TimeDelta::seconds(100);
    store.resolve_at(&session.token, later).unwrap();
    let resolved = store.resolve_at(&session.token, t0).unwrap();
    assert_eq!(resolved.last_touched_at, later);
}

#[test]
fn test_invalidate_is_idempotent() {
    let store = store();
    let session = store.create(identity(1, "alice", Role::Employee));

    assert!(store.invalidate(&session.token));
    assert!(store.resolve(&session.token).is_none());

    assert!(!store.invalidate(&session.token));
    assert!(store.resolve(&session.token).is_none());
}

#[test]
fn test_invalidate_identity_drops_only_that_account() {
    let store = store();
    let a1 = store.create(identity(1, "alice", Role::Employee));
    let a2 = store.create(identity(1, "alice", Role::Employee));
    let b = store.create(identity(2, "bob", Role::Admin));

    assert_eq!(store.invalidate_identity(1), 2);
    assert!(store.resolve(&a1.token).is_none());
    assert!(store.resolve(&a2.token).is_none());
    assert!(store.resolve(&b.token).is_some());
    assert_eq!(store.invalidate_identity(1), 0);
}

#[test]
fn test_purge_expired_keeps_live_sessions() {
    let store = store();
    let t0 = Utc::now();
    let stale = store.create_at(identity(1, "alice", Role::Employee), t0);
    let live = store.create_at(
        identity(2, "bob", Role::Employee),
        t0 + TimeDelta::seconds(3000),
    );

    let purged = store.purge_expired_at(t0 + TimeDelta::seconds(3700));
    assert_eq!(purged, 1);
    assert_eq!(store.len(), 1);
    assert!(
        store
            .resolve_at(&live.token, t0 + TimeDelta::seconds(3700))
            .is_some()
    );
    assert!(
        store
            .resolve_at(&stale.token, t0 + TimeDelta::seconds(3700))
            .is_none()
    );
}

#[test]
fn test_clear_drops_everything() {
    let store = store();
    store.create(identity(1, "alice", Role::Employee));
    store.create(identity(2, "bob", Role::Admin));
    store.clear();
    assert!(store.is_empty());
}

#[test]
fn test_concurrent_resolves_on_one_token() {
    let store = Arc::new(store());
    let t0 = Utc::now();
    let session = store.create_at(identity(1, "alice", Role::Employee), t0);

    let handles: Vec<_> = (1..=16)
        .map(|i| {
            let store = store.clone();
            let token = session.token.clone();
            thread::spawn(move || store.resolve_at(&token, t0 + TimeDelta::seconds(i)))
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_some());
    }

    // Whatever the interleaving, the newest touch wins.
    let resolved = store.resolve_at(&session.token, t0).unwrap();
    assert_eq!(resolved.last_touched_at, t0 + TimeDelta::seconds(16));
}

#[tokio::test]
async fn test_sweeper_purges_in_background() {
    let store = Arc::new(SessionStore::new(std::time::Duration::from_secs(0)));
    let session = store.create_at(
        identity(1, "alice", Role::Employee),
        Utc::now() - TimeDelta::seconds(5),
    );

    let sweeper =
        pawnshop_backoffice::session::spawn_sweeper(store.clone(), std::time::Duration::from_secs(1));
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    sweeper.abort();

    assert!(store.is_empty());
    assert!(store.resolve(&session.token).is_none());
}
