//! User-record store facade used by the credgate service.
//!
//! Provides:
//! - The `UserRecord` entity read from the credential table
//! - The `UserStore` capability trait consumed by request handlers
//! - `RestStore`, the client for the hosted store's REST dialect
//! - `MemoryStore`, an in-process implementation for tests

pub mod rest;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use rest::RestStore;

// ============================================================================
// User Record
// ============================================================================

/// A row in the credential store representing one account.
///
/// Ids are carried as raw JSON values so both string and integer keys
/// round-trip unchanged. Unknown columns returned by the store are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Value,
    pub email: String,
    /// Opaque pre-hashed credential. Read for the equality match, never
    /// serialized back to callers.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Build a record with the fields the handlers care about.
    #[must_use]
    pub fn new(id: Value, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            password_hash: Some(password_hash.into()),
            last_login: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced while talking to the user-record store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("store endpoint is invalid: {0}")]
    Endpoint(String),
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ============================================================================
// UserStore Trait
// ============================================================================

/// Capability interface over the persisted user-record collection.
///
/// Implement this for production stores and test doubles. Both operations
/// return a result rather than panicking so handlers stay a pure mapping
/// from outcome to response.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Exact-match lookup on `(email, password_hash)`. Returns every
    /// matching row; callers decide what more than one match means.
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Vec<UserRecord>, StoreError>;

    /// Set `last_login` on the record addressed by `id`. Matching zero rows
    /// is not an error; the write is idempotent and last-writer-wins.
    async fn touch_last_login(&self, id: &Value, at: DateTime<Utc>) -> Result<(), StoreError>;
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store used by handler tests. Records call counts and can be
/// told to fail reads or writes to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<Vec<UserRecord>>,
    find_calls: AtomicUsize,
    touch_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: RwLock::new(users),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn touch_calls(&self) -> usize {
        self.touch_calls.load(Ordering::SeqCst)
    }

    /// Current `last_login` of the record addressed by `id`, if any.
    pub fn last_login_of(&self, id: &Value) -> Option<DateTime<Utc>> {
        let users = self.users.read().unwrap();
        users.iter().find(|u| u.id == *id).and_then(|u| u.last_login)
    }

    fn injected_failure() -> StoreError {
        StoreError::Status {
            status: 503,
            message: "injected store failure".to_owned(),
        }
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Vec<UserRecord>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }

        let users = self.users.read().unwrap();
        Ok(users
            .iter()
            .filter(|u| u.email == email && u.password_hash.as_deref() == Some(password_hash))
            .cloned()
            .collect())
    }

    async fn touch_last_login(&self, id: &Value, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.touch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }

        let mut users = self.users.write().unwrap();
        for user in users.iter_mut().filter(|u| u.id == *id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_user() -> UserRecord {
        UserRecord::new(json!(1), "a@x.com", "h1")
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let value = serde_json::to_value(sample_user()).expect("serialize");
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["id"], json!(1));
        assert_eq!(value["email"], json!("a@x.com"));
    }

    #[test]
    fn record_decodes_store_row_with_extra_columns() {
        let row = json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "email": "b@x.com",
            "password_hash": "h2",
            "last_login": "2024-05-01T12:00:00+00:00",
            "created_at": "2023-01-01T00:00:00+00:00",
            "display_name": "B"
        });
        let user: UserRecord = serde_json::from_value(row).expect("decode");
        assert_eq!(user.email, "b@x.com");
        assert_eq!(user.password_hash.as_deref(), Some("h2"));
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn memory_store_matches_exact_credentials_only() {
        let store = MemoryStore::with_users(vec![sample_user()]);

        let hit = store
            .find_user_by_credentials("a@x.com", "h1")
            .await
            .expect("find");
        assert_eq!(hit.len(), 1);

        let miss = store
            .find_user_by_credentials("a@x.com", "wrong")
            .await
            .expect("find");
        assert!(miss.is_empty());
        assert_eq!(store.find_calls(), 2);
    }

    #[tokio::test]
    async fn memory_store_touch_sets_timestamp() {
        let store = MemoryStore::with_users(vec![sample_user()]);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        store.touch_last_login(&json!(1), at).await.expect("touch");
        assert_eq!(store.last_login_of(&json!(1)), Some(at));

        // Unknown ids match nothing and still succeed.
        store.touch_last_login(&json!(99), at).await.expect("touch");
        assert_eq!(store.touch_calls(), 2);
    }

    #[tokio::test]
    async fn memory_store_injected_failures_surface_as_errors() {
        let store = MemoryStore::with_users(vec![sample_user()]);
        store.fail_reads(true);
        assert!(store
            .find_user_by_credentials("a@x.com", "h1")
            .await
            .is_err());

        store.fail_writes(true);
        assert!(store
            .touch_last_login(&json!(1), Utc::now())
            .await
            .is_err());
    }
}
