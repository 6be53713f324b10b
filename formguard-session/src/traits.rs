//! Session store trait definition.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Session data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Session data as key-value pairs
    pub data: HashMap<String, Value>,
    /// Session creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last access timestamp
    pub last_accessed_at: DateTime<Utc>,
    /// Session expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Bumped by the store on every data write; a [`SessionStore::save`]
    /// of an older revision is refused.
    #[serde(default)]
    pub revision: u64,
}

impl Session {
    /// Create a new session with the given ID and TTL.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            revision: 0,
        }
    }

    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Get a value from the session data.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session data.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.data.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Remove a value from the session data.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Update the last accessed timestamp.
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Push the expiration out to `ttl` from now.
    pub fn extend(&mut self, ttl: Duration) {
        self.expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
    }
}

/// Session storage capability.
///
/// The CSRF guard receives a store by injection, so the same guard runs
/// against process memory, a shared cache or any other backend that can
/// implement these operations. Expired sessions behave as missing.
///
/// ```
/// use formguard_session::{MemorySessionStore, SessionConfig, SessionStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> formguard_session::SessionResult<()> {
/// let store = MemorySessionStore::new(SessionConfig::default())?;
/// let session = store.create(None).await?;
///
/// store.set_value(&session.id, "user_id", 42).await?;
/// let user_id: Option<i32> = store.get_value(&session.id, "user_id").await?;
/// assert_eq!(user_id, Some(42));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a new session. `ttl` falls back to the configured
    /// default and is capped at the configured maximum.
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session>;

    /// Returns `Ok(None)` if the session is missing or expired.
    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>>;

    /// Save/update a whole session.
    ///
    /// Fails with `SessionError::Conflict` when the stored session has been
    /// written since `session` was read; re-read and retry. Single keys are
    /// better written with [`set_value`](Self::set_value), which cannot
    /// conflict.
    async fn save(&self, session: &Session) -> SessionResult<()>;

    /// Delete a session. Deleting a missing session is not an error.
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.get(session_id).await?.is_some())
    }

    /// Extend a session's TTL (capped at the configured maximum).
    async fn extend(&self, session_id: &str, ttl: Duration) -> SessionResult<()>;

    /// Touch a session (update last accessed time).
    async fn touch(&self, session_id: &str) -> SessionResult<()>;

    /// Atomically replace `key` with `new` if its current value equals
    /// `expected`. `None` on either side means "absent" (a `None` for `new`
    /// removes the key).
    ///
    /// Returns `Ok(false)` when the current value differs and
    /// `SessionError::NotFound` when the session is missing or expired.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        key: &str,
        expected: Option<&Value>,
        new: Option<Value>,
    ) -> SessionResult<bool>;

    /// Clear all sessions.
    async fn clear_all(&self) -> SessionResult<()>;

    /// Get the number of live sessions.
    async fn count(&self) -> SessionResult<usize>;

    /// Remove expired sessions and return how many were dropped.
    async fn cleanup_expired(&self) -> SessionResult<usize>;

    // ========== Convenience Methods ==========

    /// Get a session value by key.
    async fn get_value<T: for<'de> Deserialize<'de>>(
        &self,
        session_id: &str,
        key: &str,
    ) -> SessionResult<Option<T>> {
        Ok(self
            .get(session_id)
            .await?
            .and_then(|session| session.get(key)))
    }

    /// Set one key in place, leaving the rest of the session untouched.
    /// `SessionError::NotFound` when the session is missing or expired.
    async fn set_value<T: Serialize + Send>(
        &self,
        session_id: &str,
        key: &str,
        value: T,
    ) -> SessionResult<()>;

    /// Remove one key in place. A missing session is not an error.
    async fn remove_value(&self, session_id: &str, key: &str) -> SessionResult<()>;
}

/// Generate a new unique session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_data_roundtrip() {
        let mut session = Session::new("s1", Duration::from_secs(60));
        session.set("user_id", 7).unwrap();
        session.set("name", "alice").unwrap();

        assert_eq!(session.get::<i32>("user_id"), Some(7));
        assert_eq!(session.get::<String>("name").as_deref(), Some("alice"));
        assert_eq!(session.get::<i32>("name"), None);
        assert!(session.contains("name"));

        session.remove("name");
        assert!(!session.contains("name"));
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("s1", Duration::from_secs(60));
        assert!(!session.is_expired());

        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(session.is_expired());

        session.extend(Duration::from_secs(60));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
    }
}
