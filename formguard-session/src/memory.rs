//! In-process session storage.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::{Session, SessionStore, generate_session_id};
use async_trait::async_trait;
use formguard_log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Session store backed by a `HashMap` behind an async `RwLock`.
///
/// Sessions live as long as the process. Every mutation, including
/// [`compare_and_swap`](SessionStore::compare_and_swap), happens under a
/// single write lock, so concurrent requests for one session never
/// interleave a read-modify-write.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: SessionConfig,
}

impl MemorySessionStore {
    /// Fails with `SessionError::Config` if `config` does not validate.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Periodically drop expired sessions until the handle is aborted.
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Ok(removed) = store.cleanup_expired().await
                    && removed > 0
                {
                    debug!("Reaped {} expired sessions", removed);
                }
            }
        })
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_config(SessionConfig::default())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session> {
        let session = Session::new(generate_session_id(), self.config.effective_ttl(ttl));
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        debug!("Created session {}", session.id);
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .filter(|session| !session.is_expired())
            .cloned())
    }

    async fn save(&self, session: &Session) -> SessionResult<()> {
        if session.id.is_empty() {
            return Err(SessionError::InvalidSessionId("empty session id".into()));
        }
        let mut sessions = self.sessions.write().await;
        let revision = match sessions.get(&session.id) {
            Some(current) if current.revision != session.revision => {
                return Err(SessionError::Conflict(session.id.clone()));
            }
            Some(current) => current.revision + 1,
            None => session.revision,
        };

        let mut stored = session.clone();
        stored.revision = revision;
        sessions.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        if self.sessions.write().await.remove(session_id).is_some() {
            debug!("Deleted session {}", session_id);
        }
        Ok(())
    }

    async fn extend(&self, session_id: &str, ttl: Duration) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) if !session.is_expired() => {
                session.extend(ttl.min(self.config.max_ttl));
                Ok(())
            }
            _ => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    async fn touch(&self, session_id: &str) -> SessionResult<()> {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.touch();
        }
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        key: &str,
        expected: Option<&Value>,
        new: Option<Value>,
    ) -> SessionResult<bool> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .filter(|session| !session.is_expired())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.data.get(key) != expected {
            return Ok(false);
        }

        match new {
            Some(value) => {
                session.data.insert(key.to_string(), value);
            }
            None => {
                session.data.remove(key);
            }
        }
        session.revision += 1;
        session.touch();
        Ok(true)
    }

    async fn set_value<T: Serialize + Send>(
        &self,
        session_id: &str,
        key: &str,
        value: T,
    ) -> SessionResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .filter(|session| !session.is_expired())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        session.data.insert(key.to_string(), value);
        session.revision += 1;
        session.touch();
        Ok(())
    }

    async fn remove_value(&self, session_id: &str, key: &str) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions
            .get_mut(session_id)
            .filter(|session| !session.is_expired())
            && session.data.remove(key).is_some()
        {
            session.revision += 1;
            session.touch();
        }
        Ok(())
    }

    async fn clear_all(&self) -> SessionResult<()> {
        self.sessions.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> SessionResult<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().filter(|s| !s.is_expired()).count())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(SessionConfig::default()).unwrap()
    }

    async fn expire(store: &MemorySessionStore, id: &str) {
        let mut session = store.get(id).await.unwrap().unwrap();
        session.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        store.save(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = store();
        let session = store.create(None).await.unwrap();

        assert!(store.exists(&session.id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_none());
        // Deleting twice is fine.
        store.delete(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_invisible() {
        let store = store();
        let session = store.create(None).await.unwrap();
        expire(&store, &session.id).await;

        assert!(store.get(&session.id).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_caps_ttl() {
        let store = MemorySessionStore::new(
            SessionConfig::new()
                .with_default_ttl(Duration::from_secs(10))
                .with_max_ttl(Duration::from_secs(20)),
        )
        .unwrap();
        let session = store
            .create(Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        let ttl = session.expires_at - session.created_at;
        assert_eq!(ttl.num_seconds(), 20);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = store();
        let session = store.create(None).await.unwrap();

        // Absent -> value
        assert!(
            store
                .compare_and_swap(&session.id, "k", None, Some(json!("a")))
                .await
                .unwrap()
        );
        // Wrong expectation leaves the value alone
        assert!(
            !store
                .compare_and_swap(&session.id, "k", Some(&json!("b")), Some(json!("c")))
                .await
                .unwrap()
        );
        assert_eq!(
            store.get_value::<String>(&session.id, "k").await.unwrap().as_deref(),
            Some("a")
        );
        // Value -> removed
        assert!(
            store
                .compare_and_swap(&session.id, "k", Some(&json!("a")), None)
                .await
                .unwrap()
        );
        assert!(!store.get(&session.id).await.unwrap().unwrap().contains("k"));
    }

    #[tokio::test]
    async fn test_compare_and_swap_missing_session() {
        let store = store();
        let result = store
            .compare_and_swap("nope", "k", None, Some(json!(1)))
            .await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_swaps_have_one_winner() {
        let store = store();
        let session = store.create(None).await.unwrap();
        store.set_value(&session.id, "token", "t0").await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let id = session.id.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .compare_and_swap(&id, "token", Some(&json!("t0")), Some(json!(format!("t{}", i + 1))))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_set_value_on_missing_session_fails() {
        let store = store();
        let result = store.set_value("ghost", "k", 1).await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = MemorySessionStore::new(SessionConfig::new().with_default_ttl(Duration::ZERO));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[tokio::test]
    async fn test_stale_save_is_refused() {
        let store = store();
        let session = store.create(None).await.unwrap();
        store.set_value(&session.id, "token", "t0").await.unwrap();

        let mut stale = store.get(&session.id).await.unwrap().unwrap();
        assert!(
            store
                .compare_and_swap(&session.id, "token", Some(&json!("t0")), Some(json!("t1")))
                .await
                .unwrap()
        );

        stale.set("flash", "saved").unwrap();
        let result = store.save(&stale).await;
        assert!(matches!(result, Err(SessionError::Conflict(_))));
        assert_eq!(
            store.get_value::<String>(&session.id, "token").await.unwrap().as_deref(),
            Some("t1")
        );
    }

    #[tokio::test]
    async fn test_fresh_save_bumps_revision() {
        let store = store();
        let session = store.create(None).await.unwrap();

        let mut current = store.get(&session.id).await.unwrap().unwrap();
        current.set("user_id", 1).unwrap();
        store.save(&current).await.unwrap();

        let saved = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(saved.revision, current.revision + 1);
        // The same snapshot is now stale.
        assert!(matches!(store.save(&current).await, Err(SessionError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_set_value_keeps_other_keys() {
        let store = store();
        let session = store.create(None).await.unwrap();
        store.set_value(&session.id, "token", "t0").await.unwrap();

        assert!(
            store
                .compare_and_swap(&session.id, "token", Some(&json!("t0")), Some(json!("t1")))
                .await
                .unwrap()
        );
        store.set_value(&session.id, "flash", "saved").await.unwrap();
        store.remove_value(&session.id, "flash").await.unwrap();

        assert_eq!(
            store.get_value::<String>(&session.id, "token").await.unwrap().as_deref(),
            Some("t1")
        );
    }

    #[tokio::test]
    async fn test_remove_value_on_missing_session_is_ok() {
        let store = store();
        store.remove_value("ghost", "k").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_removes_expired_sessions() {
        let store = store();
        let session = store.create(None).await.unwrap();
        expire(&store, &session.id).await;

        let handle = store.spawn_reaper(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        handle.abort();

        assert!(store.sessions.read().await.is_empty());
    }
}
