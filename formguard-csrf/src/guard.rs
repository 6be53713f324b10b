use crate::config::{CsrfConfig, RotationPolicy};
use crate::error::{CsrfError, Result};
use crate::field::{HiddenField, MetaTags};
use crate::token::CsrfToken;
use formguard_log::debug;
use formguard_session::{SessionError, SessionStore};
use serde_json::Value;
use std::sync::Arc;

/// Attempts at publishing a freshly generated token before giving up.
const ISSUE_ATTEMPTS: usize = 3;

/// Successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The session keeps the token that was just verified.
    Stable(CsrfToken),
    /// The verified token was replaced; forms rendered from here on must
    /// carry the new one.
    Rotated(CsrfToken),
}

impl Verification {
    /// Token to embed in the next rendered form.
    pub fn token(&self) -> &CsrfToken {
        match self {
            Verification::Stable(token) | Verification::Rotated(token) => token,
        }
    }

    pub fn is_rotated(&self) -> bool {
        matches!(self, Verification::Rotated(_))
    }
}

/// Issues, embeds and verifies per-session authenticity tokens.
///
/// The guard owns no session state: it reads and writes the token through
/// the injected [`SessionStore`], under [`CsrfConfig::session_key`].
///
/// ```
/// use formguard_csrf::{CsrfConfig, CsrfGuard, CsrfError};
/// use formguard_session::{MemorySessionStore, SessionStore};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), CsrfError> {
/// let store = Arc::new(MemorySessionStore::default());
/// let guard = CsrfGuard::new(CsrfConfig::default(), store.clone())?;
/// let session = store.create(None).await?;
///
/// let token = guard.issue(&session.id).await?;
/// let field = guard.embed(&token);
/// assert_eq!(field.name, "authenticity_token");
///
/// assert!(guard.verify(&session.id, Some(token.as_str())).await.is_ok());
/// assert!(matches!(
///     guard.verify(&session.id, Some("forged")).await,
///     Err(CsrfError::TokenMismatch)
/// ));
/// # Ok(())
/// # }
/// ```
pub struct CsrfGuard<S> {
    config: Arc<CsrfConfig>,
    store: Arc<S>,
}

impl<S> Clone for CsrfGuard<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }
}

impl<S: SessionStore> CsrfGuard<S> {
    /// Validate `config` and bind it to `store`.
    pub fn new(config: CsrfConfig, store: Arc<S>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            store,
        })
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a session with its token already in place.
    pub async fn create_session(&self) -> Result<(String, CsrfToken)> {
        let mut session = self.store.create(None).await?;
        let token = CsrfToken::generate(self.config.token_bytes);
        session.set(&self.config.session_key, token.as_str())?;
        self.store.save(&session).await?;
        debug!("Created session {} with authenticity token", session.id);
        Ok((session.id, token))
    }

    /// The session's token, if one was issued.
    pub async fn current(&self, session_id: &str) -> Result<Option<CsrfToken>> {
        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or(CsrfError::ExpiredSession)?;
        Ok(session
            .get::<String>(&self.config.session_key)
            .map(CsrfToken::new))
    }

    /// Return the session's token, generating and storing one first if the
    /// session has none. Repeated calls return the same token until it is
    /// rotated or reset.
    pub async fn issue(&self, session_id: &str) -> Result<CsrfToken> {
        for _ in 0..ISSUE_ATTEMPTS {
            if let Some(existing) = self.current(session_id).await? {
                return Ok(existing);
            }

            let token = CsrfToken::generate(self.config.token_bytes);
            let published = self
                .store
                .compare_and_swap(
                    session_id,
                    &self.config.session_key,
                    None,
                    Some(Value::String(token.as_str().to_string())),
                )
                .await
                .map_err(session_gone)?;

            if published {
                debug!("Issued authenticity token for session {}", session_id);
                return Ok(token);
            }
            // A concurrent request stored its token first; use that one.
        }

        Err(CsrfError::Session(SessionError::Backend(format!(
            "could not publish a token for session {}",
            session_id
        ))))
    }

    /// Hidden form field carrying `token`.
    pub fn embed(&self, token: &CsrfToken) -> HiddenField {
        HiddenField::new(self.config.field_name.clone(), token)
    }

    pub fn meta_tags(&self, token: &CsrfToken) -> MetaTags {
        MetaTags::new(self.config.field_name.clone(), token)
    }

    /// Check `submitted` against the session's token.
    ///
    /// Fails with `MissingToken` when nothing (or an empty value) was
    /// submitted, `ExpiredSession` when the session is gone, and
    /// `TokenMismatch` otherwise. Under
    /// [`RotationPolicy::PerVerification`] the stored token is swapped
    /// atomically, so of two concurrent submissions of one token only one
    /// succeeds.
    pub async fn verify(&self, session_id: &str, submitted: Option<&str>) -> Result<Verification> {
        let submitted = match submitted {
            Some(value) if !value.is_empty() => value,
            _ => return Err(CsrfError::MissingToken),
        };

        let stored = self
            .current(session_id)
            .await?
            .ok_or(CsrfError::TokenMismatch)?;

        if !stored.matches(submitted) {
            return Err(CsrfError::TokenMismatch);
        }

        match self.config.rotation {
            RotationPolicy::Never => Ok(Verification::Stable(stored)),
            RotationPolicy::PerVerification => {
                let next = CsrfToken::generate(self.config.token_bytes);
                let swapped = self
                    .store
                    .compare_and_swap(
                        session_id,
                        &self.config.session_key,
                        Some(&Value::String(stored.into_string())),
                        Some(Value::String(next.as_str().to_string())),
                    )
                    .await
                    .map_err(session_gone)?;

                if swapped {
                    debug!("Rotated authenticity token for session {}", session_id);
                    Ok(Verification::Rotated(next))
                } else {
                    Err(CsrfError::TokenMismatch)
                }
            }
        }
    }

    /// Drop the session's token, e.g. after login or logout. The next
    /// [`issue`](Self::issue) generates a new one.
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        self.store
            .remove_value(session_id, &self.config.session_key)
            .await?;
        Ok(())
    }
}

fn session_gone(error: SessionError) -> CsrfError {
    if error.is_gone() {
        CsrfError::ExpiredSession
    } else {
        CsrfError::Session(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formguard_session::{MemorySessionStore, SessionConfig};

    async fn setup(rotation: RotationPolicy) -> (CsrfGuard<MemorySessionStore>, String) {
        let store = Arc::new(MemorySessionStore::new(SessionConfig::default()).unwrap());
        let guard = CsrfGuard::new(CsrfConfig::new().with_rotation(rotation), store.clone()).unwrap();
        let session = store.create(None).await.unwrap();
        (guard, session.id)
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let (guard, id) = setup(RotationPolicy::Never).await;
        let token = guard.issue(&id).await.unwrap();

        let verification = guard.verify(&id, Some(token.as_str())).await.unwrap();
        assert_eq!(verification, Verification::Stable(token));
    }

    #[tokio::test]
    async fn test_issue_is_idempotent() {
        let (guard, id) = setup(RotationPolicy::Never).await;
        let first = guard.issue(&id).await.unwrap();
        let second = guard.issue(&id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_and_empty_tokens() {
        let (guard, id) = setup(RotationPolicy::Never).await;
        guard.issue(&id).await.unwrap();

        assert!(matches!(guard.verify(&id, None).await, Err(CsrfError::MissingToken)));
        assert!(matches!(guard.verify(&id, Some("")).await, Err(CsrfError::MissingToken)));
    }

    #[tokio::test]
    async fn test_suffix_is_mismatch() {
        let (guard, id) = setup(RotationPolicy::Never).await;
        let token = guard.issue(&id).await.unwrap();
        let tampered = format!("{}x", token.as_str());

        assert!(matches!(
            guard.verify(&id, Some(&tampered)).await,
            Err(CsrfError::TokenMismatch)
        ));
    }

    #[tokio::test]
    async fn test_no_token_issued_is_mismatch() {
        let (guard, id) = setup(RotationPolicy::Never).await;
        assert!(matches!(
            guard.verify(&id, Some("anything")).await,
            Err(CsrfError::TokenMismatch)
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_is_expired() {
        let (guard, _) = setup(RotationPolicy::Never).await;
        assert!(matches!(guard.issue("ghost").await, Err(CsrfError::ExpiredSession)));
        assert!(matches!(
            guard.verify("ghost", Some("t")).await,
            Err(CsrfError::ExpiredSession)
        ));
    }

    #[tokio::test]
    async fn test_rotation_prevents_replay() {
        let (guard, id) = setup(RotationPolicy::PerVerification).await;
        let token = guard.issue(&id).await.unwrap();

        let verification = guard.verify(&id, Some(token.as_str())).await.unwrap();
        assert!(verification.is_rotated());
        assert_ne!(verification.token(), &token);

        assert!(matches!(
            guard.verify(&id, Some(token.as_str())).await,
            Err(CsrfError::TokenMismatch)
        ));
        assert!(
            guard
                .verify(&id, Some(verification.token().as_str()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_concurrent_replay_has_one_winner() {
        let (guard, id) = setup(RotationPolicy::PerVerification).await;
        let token = guard.issue(&id).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            let id = id.clone();
            let submitted = token.as_str().to_string();
            tasks.push(tokio::spawn(async move {
                guard.verify(&id, Some(&submitted)).await.is_ok()
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_rotation_survives_other_session_writes() {
        let (guard, id) = setup(RotationPolicy::PerVerification).await;
        let token = guard.issue(&id).await.unwrap();
        let mut snapshot = guard.store().get(&id).await.unwrap().unwrap();

        let verification = guard.verify(&id, Some(token.as_str())).await.unwrap();
        assert!(verification.is_rotated());

        // A handler writing its own keys while the token rotates.
        guard.store().set_value(&id, "flash", "Post created").await.unwrap();
        snapshot.set("flash", "Post created").unwrap();
        assert!(matches!(
            guard.store().save(&snapshot).await,
            Err(SessionError::Conflict(_))
        ));

        assert!(matches!(
            guard.verify(&id, Some(token.as_str())).await,
            Err(CsrfError::TokenMismatch)
        ));
        assert_eq!(guard.current(&id).await.unwrap().as_ref(), Some(verification.token()));
    }

    #[tokio::test]
    async fn test_concurrent_writes_during_rotation() {
        let (guard, id) = setup(RotationPolicy::PerVerification).await;
        let token = guard.issue(&id).await.unwrap();

        let verifier = {
            let guard = guard.clone();
            let id = id.clone();
            let submitted = token.as_str().to_string();
            tokio::spawn(async move { guard.verify(&id, Some(&submitted)).await })
        };
        let mut writers = Vec::new();
        for i in 0..8 {
            let store = guard.store().clone();
            let id = id.clone();
            writers.push(tokio::spawn(async move {
                store.set_value(&id, "visits", i).await.unwrap();
            }));
        }

        let rotated = verifier.await.unwrap().unwrap();
        for writer in writers {
            writer.await.unwrap();
        }

        assert_eq!(guard.current(&id).await.unwrap().as_ref(), Some(rotated.token()));
        assert!(guard.verify(&id, Some(token.as_str())).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_forces_new_token() {
        let (guard, id) = setup(RotationPolicy::Never).await;
        let old = guard.issue(&id).await.unwrap();
        guard.reset(&id).await.unwrap();

        assert_eq!(guard.current(&id).await.unwrap(), None);
        let new = guard.issue(&id).await.unwrap();
        assert_ne!(old, new);
        assert!(guard.verify(&id, Some(old.as_str())).await.is_err());
    }

    #[tokio::test]
    async fn test_create_session_has_token() {
        let store = Arc::new(MemorySessionStore::default());
        let guard = CsrfGuard::new(CsrfConfig::default(), store).unwrap();
        let (id, token) = guard.create_session().await.unwrap();

        assert_eq!(guard.current(&id).await.unwrap(), Some(token.clone()));
        assert_eq!(guard.issue(&id).await.unwrap(), token);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(MemorySessionStore::default());
        let result = CsrfGuard::new(CsrfConfig::new().with_token_bytes(1), store);
        assert!(matches!(result, Err(CsrfError::Config(_))));
    }
}
