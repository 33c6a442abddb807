//! PgIdentityStore against a real Postgres (connection from `configuration.yaml`
//! / `APP_DATABASE__*`). Each test gets its own freshly migrated database.

use authkeeper::auth::{hash_token, ManualClock, RefreshTokenStore};
use authkeeper::configuration::{get_configuration, DatabaseSettings};
use authkeeper::error::{AppError, AuthError, DatabaseError};
use authkeeper::identity::{Identity, IdentityStore, PgIdentityStore, RefreshTokenRecord, Role};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_store() -> Arc<PgIdentityStore> {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let pool = configure_database(&configuration.database).await;
    Arc::new(PgIdentityStore::new(pool))
}

/// Postgres keeps microseconds; use whole milliseconds so values round-trip exactly
fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

fn identity(email: &str, role: Role) -> Identity {
    Identity::new(email.to_string(), "alice".to_string(), "$2b$04$hash".to_string(), role)
}

fn record(digest: &str) -> RefreshTokenRecord {
    RefreshTokenRecord {
        digest: digest.to_string(),
        expires_at: now_millis() + Duration::days(7),
    }
}

// --- Identity rows ---

#[tokio::test]
async fn insert_then_find_maps_every_column() {
    let store = spawn_store().await;
    let admin = identity("root@example.com", Role::Admin);
    store.insert(&admin).await.expect("Failed to insert identity");

    let by_id = store.find_by_id(admin.id).await.unwrap().expect("missing by id");
    assert_eq!(by_id.id, admin.id);
    assert_eq!(by_id.email, "root@example.com");
    assert_eq!(by_id.name, "alice");
    assert_eq!(by_id.password_hash, "$2b$04$hash");
    assert_eq!(by_id.role, Role::Admin);
    assert!(by_id.refresh_token.is_none());

    let by_email = store.find_by_email("root@example.com").await.unwrap();
    assert_eq!(by_email.map(|i| i.id), Some(admin.id));

    assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_a_unique_violation() {
    let store = spawn_store().await;
    store.insert(&identity("alice@example.com", Role::User)).await.unwrap();

    let duplicate = store.insert(&identity("alice@example.com", Role::User)).await;
    assert!(matches!(
        duplicate,
        Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
    ));
}

// --- Refresh slot ---

#[tokio::test]
async fn set_and_find_by_refresh_token() {
    let store = spawn_store().await;
    let alice = identity("alice@example.com", Role::User);
    store.insert(&alice).await.unwrap();

    let bound = record("digest-one");
    assert!(store.set_refresh_token(alice.id, Some(bound.clone())).await.unwrap());

    let found = store.find_by_refresh_token("digest-one").await.unwrap().expect("missing");
    assert_eq!(found.id, alice.id);
    assert_eq!(found.refresh_token, Some(bound));
    assert!(store.find_by_refresh_token("digest-two").await.unwrap().is_none());

    assert!(store.set_refresh_token(alice.id, None).await.unwrap());
    assert!(store.find_by_refresh_token("digest-one").await.unwrap().is_none());

    assert!(!store.set_refresh_token(Uuid::new_v4(), None).await.unwrap());
}

#[tokio::test]
async fn swap_only_replaces_the_expected_digest() {
    let store = spawn_store().await;
    let alice = identity("alice@example.com", Role::User);
    store.insert(&alice).await.unwrap();
    store.set_refresh_token(alice.id, Some(record("first"))).await.unwrap();

    assert!(!store
        .swap_refresh_token(alice.id, "stale", Some(record("never")))
        .await
        .unwrap());
    assert!(store
        .swap_refresh_token(alice.id, "first", Some(record("second")))
        .await
        .unwrap());
    assert!(!store
        .swap_refresh_token(alice.id, "first", Some(record("third")))
        .await
        .unwrap());
    assert!(!store
        .swap_refresh_token(Uuid::new_v4(), "second", None)
        .await
        .unwrap());

    let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.map(|r| r.digest), Some("second".to_string()));

    assert!(store.swap_refresh_token(alice.id, "second", None).await.unwrap());
    let cleared = store.find_by_id(alice.id).await.unwrap().unwrap();
    assert!(cleared.refresh_token.is_none());
}

// --- Rotation through the refresh token store ---

#[tokio::test]
async fn rotation_stores_only_the_digest() {
    let store = spawn_store().await;
    let alice = identity("alice@example.com", Role::User);
    store.insert(&alice).await.unwrap();

    let clock = Arc::new(ManualClock::new(now_millis()));
    let tokens = RefreshTokenStore::new(store.clone(), Duration::days(7), clock);

    let raw = tokens.issue(alice.id).await.unwrap();
    let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.map(|r| r.digest), Some(hash_token(&raw)));

    let rotated = tokens.validate_and_rotate(&raw).await.unwrap();
    assert_eq!(rotated.identity_id, alice.id);

    let replay = tokens.validate_and_rotate(&raw).await;
    assert_eq!(
        replay.err().and_then(|e| e.auth_kind()),
        Some(AuthError::InvalidRefreshToken)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotation_has_single_winner() {
    let store = spawn_store().await;
    let alice = identity("alice@example.com", Role::User);
    store.insert(&alice).await.unwrap();

    let clock = Arc::new(ManualClock::new(now_millis()));
    let tokens = RefreshTokenStore::new(store.clone(), Duration::days(7), clock);
    let raw = tokens.issue(alice.id).await.unwrap();

    let attempts = (0..16).map(|_| {
        let tokens = tokens.clone();
        let raw = raw.clone();
        tokio::spawn(async move { tokens.validate_and_rotate(&raw).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("rotation task panicked"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for loser in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(loser.auth_kind(), Some(AuthError::InvalidRefreshToken));
    }

    let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(
        stored.refresh_token.map(|r| r.digest),
        Some(hash_token(&winners[0].refresh_token))
    );
}
