//! Session configuration.

use crate::error::{SessionError, SessionResult};
use serde::Deserialize;
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Default session TTL
    #[serde(with = "seconds")]
    pub default_ttl: Duration,
    /// Maximum session TTL (for security)
    #[serde(with = "seconds")]
    pub max_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),    // 1 hour
            max_ttl: Duration::from_secs(86400 * 7), // 7 days
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default session TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum session TTL.
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    /// Check the settings for consistency.
    pub fn validate(&self) -> SessionResult<()> {
        if self.default_ttl.is_zero() {
            return Err(SessionError::Config("default_ttl must be positive".into()));
        }
        if self.default_ttl > self.max_ttl {
            return Err(SessionError::Config(
                "default_ttl must not exceed max_ttl".into(),
            ));
        }
        Ok(())
    }

    /// Resolve a requested TTL against the default and the maximum.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_ttl).min(self.max_ttl)
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
